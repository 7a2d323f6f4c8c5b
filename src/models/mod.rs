//! Data models for the lending server

pub mod book;
pub mod borrowing;
pub mod enums;
pub mod payment;
pub mod telegram;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort, Cover};
pub use borrowing::{Borrowing, BorrowingDetails, BorrowingShort};
pub use enums::{PaymentStatus, PaymentType, Role};
pub use payment::Payment;
pub use user::{User, UserClaims};

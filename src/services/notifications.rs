//! Fire-and-forget user notifications
//!
//! Producers call [`NotificationDispatcher::enqueue`] after their transaction
//! committed. A single worker drains the queue, resolves the recipient's chat
//! and delivers the text. Nothing here can fail the producer.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::{models::telegram::OutgoingMessage, services::redis::RecipientDirectory};

use super::telegram::ChatSender;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BorrowingCreated {
        email: String,
        book_title: String,
        borrow_date: NaiveDate,
        expected_return_date: NaiveDate,
    },
    PaymentNeeded {
        email: String,
        book_title: String,
        amount: Decimal,
        session_url: String,
    },
    BookReturned {
        email: String,
        book_title: String,
        returned_on: NaiveDate,
    },
    PaymentReceived {
        email: String,
        book_title: String,
        amount: Decimal,
    },
}

impl Notification {
    /// Identity of the user to notify
    pub fn recipient(&self) -> &str {
        match self {
            Notification::BorrowingCreated { email, .. }
            | Notification::PaymentNeeded { email, .. }
            | Notification::BookReturned { email, .. }
            | Notification::PaymentReceived { email, .. } => email,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Notification::BorrowingCreated {
                book_title,
                borrow_date,
                expected_return_date,
                ..
            } => format!(
                "📚 You have successfully booked the book: {}\n\
                 Booking date: {}\n\
                 Expected return date: {}.\n\
                 Enjoy reading!",
                book_title, borrow_date, expected_return_date
            ),
            Notification::PaymentNeeded {
                book_title,
                amount,
                session_url,
                ..
            } => format!(
                "💳 Pay {} for the book reservation: {}.\n\
                 To pay, follow the link: {}\n\
                 Thank you for using our library!",
                amount, book_title, session_url
            ),
            Notification::BookReturned {
                book_title,
                returned_on,
                ..
            } => format!("📗 {} was returned on {}. Thank you!", book_title, returned_on),
            Notification::PaymentReceived {
                book_title, amount, ..
            } => format!("✅ We received your payment of {} for {}.", amount, book_title),
        }
    }
}

/// Producer side of the notification queue
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Create the dispatcher and the receiver to hand to [`run_worker`]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a notification. Never blocks; a closed queue is only logged.
    pub fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            tracing::warn!("Notification queue closed, dropping message for {}", e.0.recipient());
        }
    }
}

/// Deliver queued notifications until every dispatcher is dropped
pub async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    directory: Arc<dyn RecipientDirectory>,
    sender: Arc<dyn ChatSender>,
) {
    tracing::info!("Notification worker started");
    while let Some(notification) = receiver.recv().await {
        deliver(&notification, directory.as_ref(), sender.as_ref()).await;
    }
    tracing::info!("Notification worker stopped");
}

async fn deliver(notification: &Notification, directory: &dyn RecipientDirectory, sender: &dyn ChatSender) {
    let email = notification.recipient();

    let chat_id = match directory.chat_id_for(email).await {
        Ok(Some(chat_id)) => chat_id,
        Ok(None) => {
            tracing::debug!("No chat linked to {}, notification skipped", email);
            return;
        }
        Err(e) => {
            tracing::warn!("Chat lookup for {} failed: {}", email, e);
            return;
        }
    };

    let message = OutgoingMessage::text(chat_id, notification.render());
    if let Err(e) = sender.send(&message).await {
        tracing::warn!("Error sending message to user {}: {}", email, e);
    }
}

//! Borrowing lifecycle: reserve a copy, bill it, take it back
//!
//! Inventory changes, borrowing rows and payment rows are written in one
//! transaction with the book row locked, so two reservations of the last copy
//! serialize and the second one sees an empty shelf. Checkout sessions and
//! notifications happen after commit and never undo it.

use chrono::{NaiveDate, Utc};

use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        borrowing::{check_return_window, BorrowingDetails, BorrowingQuery, BorrowingShort, CreateBorrowing},
        payment::{check_payment_amount, fine_amount, NewPayment, PaymentType},
        user::UserClaims,
    },
    policy::{Access, AccessPolicy},
    repository::{borrowings::BorrowingFilter, Repository},
};
use rust_decimal::Decimal;

use super::{
    notifications::{Notification, NotificationDispatcher},
    payments::PaymentsService,
};

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    payments: PaymentsService,
    notifications: NotificationDispatcher,
    fine_multiplier: Decimal,
    max_loan_days: i64,
}

impl BorrowingsService {
    pub fn new(
        repository: Repository,
        payments: PaymentsService,
        notifications: NotificationDispatcher,
        config: &PaymentsConfig,
    ) -> Self {
        Self {
            repository,
            payments,
            notifications,
            fine_multiplier: config.fine_multiplier,
            max_loan_days: config.max_loan_days,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Borrow one copy of a book for `actor` until `expected_return_date`
    pub async fn create_borrowing(
        &self,
        actor: &UserClaims,
        request: CreateBorrowing,
    ) -> AppResult<BorrowingDetails> {
        let borrow_date = Self::today();
        check_return_window(borrow_date, request.expected_return_date, self.max_loan_days)?;

        let mut tx = self.repository.begin().await?;

        let book = self.repository.books.lock_by_id(&mut *tx, request.book_id).await?;
        if book.inventory <= 0
            || !self
                .repository
                .books
                .decrement_inventory(&mut *tx, book.id)
                .await?
        {
            return Err(AppError::OutOfStock(book.title));
        }

        let borrowing = self
            .repository
            .borrowings
            .insert(&mut *tx, book.id, actor.user_id, borrow_date, request.expected_return_date)
            .await?;

        let money_to_pay = borrowing.money_to_pay(book.daily_fee);
        check_payment_amount(money_to_pay)?;

        let payment = self
            .repository
            .payments
            .insert(
                &mut *tx,
                &NewPayment {
                    borrowing_id: borrowing.id,
                    payment_type: PaymentType::Payment,
                    money_to_pay,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            borrowing_id = borrowing.id,
            book_id = book.id,
            user_id = actor.user_id,
            "Book borrowed until {}",
            borrowing.expected_return_date
        );

        let payment = self.payments.attach_session(payment, &book.title).await;

        self.notifications.enqueue(Notification::BorrowingCreated {
            email: actor.sub.clone(),
            book_title: book.title.clone(),
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
        });
        self.payments.notify_payment_needed(&actor.sub, &book.title, &payment);

        let short = BookShort {
            id: book.id,
            title: book.title,
            author: book.author,
        };
        Ok(BorrowingDetails::new(borrowing, short, vec![payment]))
    }

    /// Return a borrowed copy. Only the borrower or an administrator may do it, once.
    pub async fn return_borrowing(&self, borrowing_id: i32, actor: &UserClaims) -> AppResult<String> {
        let mut tx = self.repository.begin().await?;

        let borrowing = self.repository.borrowings.lock_by_id(&mut *tx, borrowing_id).await?;
        AccessPolicy::OwnerOrAdmin {
            owner_id: borrowing.user_id,
        }
        .authorize(Some(actor), Access::Write)?;

        let book = self.repository.books.lock_by_id(&mut *tx, borrowing.book_id).await?;
        if borrowing.is_returned() {
            return Err(AppError::AlreadyReturned(book.title));
        }

        let returned_on = Self::today();
        self.repository.books.increment_inventory(&mut *tx, book.id).await?;
        let returned = self
            .repository
            .borrowings
            .mark_returned(&mut *tx, borrowing.id, returned_on)
            .await?;

        let overdue_days = returned.overdue_days(returned_on);
        let fine = if overdue_days > 0 {
            let payment = self
                .repository
                .payments
                .insert(
                    &mut *tx,
                    &NewPayment {
                        borrowing_id: returned.id,
                        payment_type: PaymentType::Fine,
                        money_to_pay: fine_amount(book.daily_fee, overdue_days, self.fine_multiplier),
                    },
                )
                .await?;
            Some(payment)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            borrowing_id = returned.id,
            book_id = book.id,
            overdue_days,
            "Book returned"
        );

        match self.repository.users.get_by_id(returned.user_id).await {
            Ok(owner) => {
                self.notifications.enqueue(Notification::BookReturned {
                    email: owner.email.clone(),
                    book_title: book.title.clone(),
                    returned_on,
                });
                if let Some(fine) = fine {
                    let fine = self.payments.attach_session(fine, &book.title).await;
                    self.payments.notify_payment_needed(&owner.email, &book.title, &fine);
                }
            }
            Err(e) => tracing::warn!("Return notifications skipped: {}", e),
        }

        Ok(format!("{} successfully returned!", book.title))
    }

    /// Get one borrowing with its payments (owner or admin)
    pub async fn get_borrowing(&self, id: i32, actor: &UserClaims) -> AppResult<BorrowingDetails> {
        let borrowing = self.repository.borrowings.get_by_id(id).await?;
        AccessPolicy::OwnerOrAdmin {
            owner_id: borrowing.user_id,
        }
        .authorize(Some(actor), Access::Read)?;

        let book = self.repository.books.get_by_id(borrowing.book_id).await?;
        let payments = self.repository.payments.for_borrowing(borrowing.id).await?;
        let short = BookShort {
            id: book.id,
            title: book.title,
            author: book.author,
        };
        Ok(BorrowingDetails::new(borrowing, short, payments))
    }

    /// List borrowings. Administrators may filter by user; everyone else sees their own.
    pub async fn list_borrowings(
        &self,
        actor: &UserClaims,
        query: &BorrowingQuery,
    ) -> AppResult<(Vec<BorrowingShort>, i64)> {
        let user_id = if actor.is_admin() {
            query.user_id
        } else {
            Some(actor.user_id)
        };

        self.repository
            .borrowings
            .search(&BorrowingFilter {
                user_id,
                is_active: query.is_active,
                page: query.page,
                per_page: query.per_page,
            })
            .await
    }

    /// Books a user currently holds
    pub async fn active_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowingShort>> {
        self.repository.borrowings.active_for_user(user_id).await
    }
}

//! Payment service: checkout sessions and PENDING -> PAID reconciliation

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        payment::{Payment, PaymentQuery, PaymentType},
        user::UserClaims,
    },
    policy::{Access, AccessPolicy},
    repository::Repository,
};

use super::{
    checkout::{CheckoutRequest, PaymentProvider},
    notifications::{Notification, NotificationDispatcher},
};

/// Result of the provider's success redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfirmation {
    Paid,
    AlreadyPaid,
    Incomplete,
}

#[derive(Clone)]
pub struct PaymentsService {
    repository: Repository,
    provider: Arc<dyn PaymentProvider>,
    notifications: NotificationDispatcher,
    public_url: String,
}

impl PaymentsService {
    pub fn new(
        repository: Repository,
        provider: Arc<dyn PaymentProvider>,
        notifications: NotificationDispatcher,
        public_url: String,
    ) -> Self {
        Self {
            repository,
            provider,
            notifications,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn checkout_request(&self, payment: &Payment, book_title: &str) -> CheckoutRequest {
        let description = match payment.payment_type {
            PaymentType::Payment => book_title.to_string(),
            PaymentType::Fine => format!("Late return fine: {}", book_title),
        };
        CheckoutRequest {
            amount: payment.money_to_pay,
            description,
            success_url: format!("{}/api/v1/payments/{}/success", self.public_url, payment.id),
            cancel_url: format!("{}/api/v1/payments/{}/cancel", self.public_url, payment.id),
        }
    }

    /// Ask the provider for a checkout session and store it on the payment
    async fn open_session(&self, payment: &Payment, book_title: &str) -> AppResult<Payment> {
        let request = self.checkout_request(payment, book_title);
        let session = self.provider.create_checkout_session(&request).await?;
        self.repository
            .payments
            .set_session(payment.id, &session.id, &session.url)
            .await
    }

    /// Best-effort session creation after the payment row is committed.
    /// On failure the payment is returned unchanged (still PENDING, no session).
    pub async fn attach_session(&self, payment: Payment, book_title: &str) -> Payment {
        match self.open_session(&payment, book_title).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(
                    payment_id = payment.id,
                    "Could not create checkout session, payment left without session: {}",
                    e
                );
                payment
            }
        }
    }

    /// Tell the user where to pay, when a session exists
    pub fn notify_payment_needed(&self, email: &str, book_title: &str, payment: &Payment) {
        if let Some(ref url) = payment.session_url {
            self.notifications.enqueue(Notification::PaymentNeeded {
                email: email.to_string(),
                book_title: book_title.to_string(),
                amount: payment.money_to_pay,
                session_url: url.clone(),
            });
        }
    }

    /// List payments; non-admins only see their own
    pub async fn list_payments(&self, actor: &UserClaims, query: &PaymentQuery) -> AppResult<(Vec<Payment>, i64)> {
        let owner = if actor.is_admin() { None } else { Some(actor.user_id) };
        self.repository
            .payments
            .search(owner, query.status, query.page, query.per_page)
            .await
    }

    /// Get a payment (owner or admin)
    pub async fn get_payment(&self, id: i32, actor: &UserClaims) -> AppResult<Payment> {
        let context = self.repository.payments.get_context(id).await?;
        AccessPolicy::OwnerOrAdmin { owner_id: context.user_id }.authorize(Some(actor), Access::Read)?;
        Ok(context.payment)
    }

    /// Check the provider session and mark the payment PAID when it is
    pub async fn confirm_payment(&self, id: i32) -> AppResult<PaymentConfirmation> {
        let context = self.repository.payments.get_context(id).await?;
        if context.payment.is_paid() {
            return Ok(PaymentConfirmation::AlreadyPaid);
        }

        let session_id = context
            .payment
            .session_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Payment has no checkout session".to_string()))?;

        if !self.provider.is_session_paid(session_id).await? {
            return Ok(PaymentConfirmation::Incomplete);
        }

        if !self.repository.payments.mark_paid(id).await? {
            return Ok(PaymentConfirmation::AlreadyPaid);
        }

        tracing::info!(payment_id = id, "Payment marked as paid");
        self.notifications.enqueue(Notification::PaymentReceived {
            email: context.user_email,
            book_title: context.book_title,
            amount: context.payment.money_to_pay,
        });
        Ok(PaymentConfirmation::Paid)
    }

    /// Cancel redirect: the payment stays PENDING and can be paid later
    pub async fn cancel_payment(&self, id: i32) -> AppResult<Payment> {
        let context = self.repository.payments.get_context(id).await?;
        tracing::info!(payment_id = id, "Checkout cancelled by user");
        Ok(context.payment)
    }

    /// Create a fresh checkout session for an unpaid payment
    pub async fn renew_session(&self, id: i32, actor: &UserClaims) -> AppResult<Payment> {
        let context = self.repository.payments.get_context(id).await?;
        AccessPolicy::OwnerOrAdmin { owner_id: context.user_id }.authorize(Some(actor), Access::Write)?;

        if context.payment.is_paid() {
            return Err(AppError::Conflict("Payment is already paid".to_string()));
        }

        let payment = self.open_session(&context.payment, &context.book_title).await?;
        self.notify_payment_needed(&context.user_email, &context.book_title, &payment);
        Ok(payment)
    }
}

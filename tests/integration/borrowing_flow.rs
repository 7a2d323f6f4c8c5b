//! Borrowing transaction scenarios against a real database.
//!
//! Each test gets a fresh migrated database from `#[sqlx::test]`.
//! Run with: DATABASE_URL=postgres://... cargo test --test borrowing_flow -- --ignored

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use lending_server::{
    config::{AppConfig, PaymentsConfig},
    error::{AppError, AppResult},
    models::{
        book::{Book, BookInput, Cover},
        borrowing::CreateBorrowing,
        payment::{PaymentStatus, PaymentType},
        telegram::{OutgoingMessage, Update},
        user::{Role, UserClaims},
    },
    repository::{users::NewUser, Repository},
    services::{
        borrowings::BorrowingsService,
        bot::BotService,
        catalog::CatalogService,
        checkout::{CheckoutRequest, CheckoutSession, PaymentProvider},
        notifications::NotificationDispatcher,
        payments::{PaymentConfirmation, PaymentsService},
        redis::ChatStore,
        telegram::ChatSender,
        users::UsersService,
    },
};

/// Hands out fake sessions, or fails every call
struct FakeProvider {
    fail: bool,
    paid: bool,
    created: AtomicUsize,
}

impl FakeProvider {
    fn working() -> Self {
        Self {
            fail: false,
            paid: true,
            created: AtomicUsize::new(0),
        }
    }

    /// Sessions are created but never paid
    fn unpaid() -> Self {
        Self {
            fail: false,
            paid: false,
            created: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            fail: true,
            paid: false,
            created: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_checkout_session(&self, _request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        if self.fail {
            return Err(AppError::ExternalService("provider down".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: format!("https://checkout.test/{}", n),
        })
    }

    async fn is_session_paid(&self, _session_id: &str) -> AppResult<bool> {
        if self.fail {
            return Err(AppError::ExternalService("provider down".to_string()));
        }
        Ok(self.paid)
    }
}

fn services_with(
    pool: &PgPool,
    provider: FakeProvider,
    config: &PaymentsConfig,
) -> (BorrowingsService, PaymentsService, Repository) {
    let repository = Repository::new(pool.clone());
    let (dispatcher, _receiver) = NotificationDispatcher::channel();
    let payments = PaymentsService::new(
        repository.clone(),
        Arc::new(provider),
        dispatcher.clone(),
        "http://localhost:8080".to_string(),
    );
    let borrowings = BorrowingsService::new(repository.clone(), payments.clone(), dispatcher, config);
    (borrowings, payments, repository)
}

fn service(pool: &PgPool, provider: FakeProvider) -> (BorrowingsService, Repository) {
    let (borrowings, _, repository) = services_with(pool, provider, &PaymentsConfig::default());
    (borrowings, repository)
}

async fn reader(repository: &Repository, email: &str) -> UserClaims {
    let user = repository
        .users
        .create(&NewUser {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::Reader,
        })
        .await
        .unwrap();
    UserClaims::new(&user, 1)
}

async fn book(repository: &Repository, inventory: i32) -> Book {
    book_with_fee(repository, inventory, Decimal::new(50, 2)).await
}

async fn book_with_fee(repository: &Repository, inventory: i32, daily_fee: Decimal) -> Book {
    repository
        .books
        .create(&BookInput {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            cover: Cover::Hard,
            inventory,
            daily_fee,
        })
        .await
        .unwrap()
}

async fn inventory(repository: &Repository, book_id: i32) -> i32 {
    repository.books.get_by_id(book_id).await.unwrap().inventory
}

async fn borrowing_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM borrowings")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn in_days(days: i64) -> chrono::NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_borrow_then_return_restores_inventory(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 2).await;

    let details = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(3),
            },
        )
        .await
        .unwrap();

    assert_eq!(inventory(&repository, book.id).await, 1);
    assert_eq!(details.payments.len(), 1);
    let payment = &details.payments[0];
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.payment_type, PaymentType::Payment);
    assert_eq!(payment.money_to_pay, Decimal::new(150, 2));
    assert!(payment.session_url.is_some());

    let message = service.return_borrowing(details.id, &actor).await.unwrap();
    assert_eq!(message, "Dune successfully returned!");
    assert_eq!(inventory(&repository, book.id).await, 2);

    let returned = repository.borrowings.get_by_id(details.id).await.unwrap();
    assert_eq!(returned.actual_return_date, Some(Utc::now().date_naive()));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_second_return_is_rejected(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 1).await;

    let details = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(1),
            },
        )
        .await
        .unwrap();
    service.return_borrowing(details.id, &actor).await.unwrap();

    let result = service.return_borrowing(details.id, &actor).await;
    assert!(matches!(result, Err(AppError::AlreadyReturned(ref title)) if title == "Dune"));
    assert_eq!(inventory(&repository, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_out_of_stock_leaves_inventory_untouched(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 0).await;

    let result = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(2),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::OutOfStock(_))));
    assert_eq!(inventory(&repository, book.id).await, 0);
    assert_eq!(borrowing_count(&pool).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_past_return_date_writes_nothing(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 1).await;

    let result = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(-1),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidDateRange)));
    assert_eq!(inventory(&repository, book.id).await, 1);
    assert_eq!(borrowing_count(&pool).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_last_copy_goes_to_exactly_one_borrower(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let ada = reader(&repository, "ada@example.com").await;
    let alan = reader(&repository, "alan@example.com").await;
    let book = book(&repository, 1).await;

    let request = || CreateBorrowing {
        book_id: book.id,
        expected_return_date: in_days(5),
    };
    let (first, second) = tokio::join!(
        service.create_borrowing(&ada, request()),
        service.create_borrowing(&alan, request()),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::OutOfStock(_))))
            .count(),
        1
    );
    assert_eq!(inventory(&repository, book.id).await, 0);
    assert_eq!(borrowing_count(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_only_the_borrower_may_return(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let ada = reader(&repository, "ada@example.com").await;
    let alan = reader(&repository, "alan@example.com").await;
    let book = book(&repository, 1).await;

    let details = service
        .create_borrowing(
            &ada,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(1),
            },
        )
        .await
        .unwrap();

    let result = service.return_borrowing(details.id, &alan).await;
    assert!(matches!(result, Err(AppError::Authorization(_))));
    assert_eq!(inventory(&repository, book.id).await, 0);

    let mut admin = alan.clone();
    admin.role = Role::Admin;
    service.return_borrowing(details.id, &admin).await.unwrap();
    assert_eq!(inventory(&repository, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_provider_failure_keeps_the_borrowing(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::broken());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 1).await;

    let details = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(2),
            },
        )
        .await
        .unwrap();

    let payment = &details.payments[0];
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.session_id.is_none());
    assert_eq!(inventory(&repository, book.id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_late_return_adds_a_fine(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 0).await;

    // Borrowed ten days ago, due five days ago
    let borrowing_id: i32 = sqlx::query_scalar(
        "INSERT INTO borrowings (book_id, user_id, borrow_date, expected_return_date) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(book.id)
    .bind(actor.user_id)
    .bind(in_days(-10))
    .bind(in_days(-5))
    .fetch_one(&pool)
    .await
    .unwrap();

    service.return_borrowing(borrowing_id, &actor).await.unwrap();

    let payments = repository.payments.for_borrowing(borrowing_id).await.unwrap();
    let fine = payments
        .iter()
        .find(|p| p.payment_type == PaymentType::Fine)
        .expect("fine payment");
    // 0.50 per day, 5 days late, doubled
    assert_eq!(fine.money_to_pay, Decimal::new(500, 2));
    assert_eq!(fine.status, PaymentStatus::Pending);
    assert_eq!(inventory(&repository, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_loan_longer_than_allowed_is_rejected(pool: PgPool) {
    let (service, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 1).await;

    let result = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(366),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(inventory(&repository, book.id).await, 1);
    assert_eq!(borrowing_count(&pool).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unstorable_amount_is_a_validation_error(pool: PgPool) {
    let config = PaymentsConfig {
        max_loan_days: 365 * 40,
        ..PaymentsConfig::default()
    };
    let (service, _, repository) = services_with(&pool, FakeProvider::working(), &config);
    let actor = reader(&repository, "ada@example.com").await;
    let book = book_with_fee(&repository, 1, Decimal::new(999_999, 2)).await;

    // 9999.99 a day for thirty years does not fit a payment amount
    let result = service
        .create_borrowing(
            &actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(365 * 30),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(inventory(&repository, book.id).await, 1);
    assert_eq!(borrowing_count(&pool).await, 0);
}

async fn borrow_one(service: &BorrowingsService, repository: &Repository, actor: &UserClaims) -> i32 {
    let book = book(repository, 1).await;
    let details = service
        .create_borrowing(
            actor,
            CreateBorrowing {
                book_id: book.id,
                expected_return_date: in_days(2),
            },
        )
        .await
        .unwrap();
    details.payments[0].id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_confirmed_payment_becomes_paid_once(pool: PgPool) {
    let (service, payments, repository) =
        services_with(&pool, FakeProvider::working(), &PaymentsConfig::default());
    let actor = reader(&repository, "ada@example.com").await;
    let payment_id = borrow_one(&service, &repository, &actor).await;

    assert_eq!(payments.confirm_payment(payment_id).await.unwrap(), PaymentConfirmation::Paid);
    assert_eq!(
        payments.get_payment(payment_id, &actor).await.unwrap().status,
        PaymentStatus::Paid
    );
    assert_eq!(
        payments.confirm_payment(payment_id).await.unwrap(),
        PaymentConfirmation::AlreadyPaid
    );

    let result = payments.renew_session(payment_id, &actor).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unpaid_session_stays_pending(pool: PgPool) {
    let (service, payments, repository) =
        services_with(&pool, FakeProvider::unpaid(), &PaymentsConfig::default());
    let actor = reader(&repository, "ada@example.com").await;
    let payment_id = borrow_one(&service, &repository, &actor).await;

    assert_eq!(
        payments.confirm_payment(payment_id).await.unwrap(),
        PaymentConfirmation::Incomplete
    );
    let cancelled = payments.cancel_payment(payment_id).await.unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Pending);
    assert_eq!(
        payments.get_payment(payment_id, &actor).await.unwrap().status,
        PaymentStatus::Pending
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_payment_without_session_cannot_be_confirmed(pool: PgPool) {
    let (service, payments, repository) =
        services_with(&pool, FakeProvider::broken(), &PaymentsConfig::default());
    let actor = reader(&repository, "ada@example.com").await;
    let payment_id = borrow_one(&service, &repository, &actor).await;

    let result = payments.confirm_payment(payment_id).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(
        payments.get_payment(payment_id, &actor).await.unwrap().status,
        PaymentStatus::Pending
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_only_the_payer_may_renew_a_session(pool: PgPool) {
    let (service, payments, repository) =
        services_with(&pool, FakeProvider::working(), &PaymentsConfig::default());
    let ada = reader(&repository, "ada@example.com").await;
    let alan = reader(&repository, "alan@example.com").await;
    let payment_id = borrow_one(&service, &repository, &ada).await;

    let result = payments.renew_session(payment_id, &alan).await;
    assert!(matches!(result, Err(AppError::Authorization(_))));

    let renewed = payments.renew_session(payment_id, &ada).await.unwrap();
    assert_eq!(renewed.status, PaymentStatus::Pending);
    assert_eq!(renewed.session_id.as_deref(), Some("cs_test_1"));
}

/// Chat data kept in memory
#[derive(Default)]
struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn put(&self, key: String, value: &str) -> AppResult<()> {
        self.values.lock().unwrap().insert(key, value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().remove(key)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn save_chat_id(&self, email: &str, chat_id: &str) -> AppResult<()> {
        self.put(format!("chat:{}", email), chat_id)
    }

    async fn delete_chat_id(&self, email: &str) -> AppResult<()> {
        self.remove(&format!("chat:{}", email));
        Ok(())
    }

    async fn save_session_token(&self, chat_id: &str, token: &str) -> AppResult<()> {
        self.put(format!("session:{}", chat_id), token)
    }

    async fn get_session_token(&self, chat_id: &str) -> AppResult<Option<String>> {
        Ok(self.get(&format!("session:{}", chat_id)))
    }

    async fn delete_session_token(&self, chat_id: &str) -> AppResult<()> {
        self.remove(&format!("session:{}", chat_id));
        Ok(())
    }

    async fn save_bot_state(&self, chat_id: &str, state: &str) -> AppResult<()> {
        self.put(format!("state:{}", chat_id), state)
    }

    async fn take_bot_state(&self, chat_id: &str) -> AppResult<Option<String>> {
        Ok(self.remove(&format!("state:{}", chat_id)))
    }
}

/// Keeps every message the bot sends
#[derive(Default)]
struct RecordingChat {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingChat {
    fn last(&self) -> OutgoingMessage {
        self.sent.lock().unwrap().last().cloned().expect("a reply")
    }
}

#[async_trait]
impl ChatSender for RecordingChat {
    async fn send(&self, message: &OutgoingMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str) -> AppResult<()> {
        Ok(())
    }
}

fn button(data: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "callback_query": {
            "id": "cb",
            "data": data,
            "message": {"message_id": 1, "chat": {"id": 42}}
        }
    }))
    .unwrap()
}

fn text(body: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "message": {"message_id": 2, "chat": {"id": 42}, "text": body}
    }))
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_chat_search_then_book_then_date(pool: PgPool) {
    let config = AppConfig::default();
    let (borrowings, repository) = service(&pool, FakeProvider::working());
    let actor = reader(&repository, "ada@example.com").await;
    let book = book(&repository, 2).await;

    let store = Arc::new(MemoryStore::default());
    let chat = Arc::new(RecordingChat::default());
    let token = actor.create_token(&config.auth.jwt_secret).unwrap();
    store.save_session_token("42", &token).await.unwrap();

    let bot = BotService::new(
        store.clone(),
        UsersService::new(repository.clone(), config.auth.clone()),
        CatalogService::new(repository.clone()),
        borrowings,
        chat.clone(),
    );

    bot.handle_update(button("search")).await.unwrap();
    assert_eq!(chat.last().text, "Enter the title of the book:");

    bot.handle_update(text("dune")).await.unwrap();
    let found = chat.last();
    assert!(found.text.contains("Frank Herbert"));
    let keyboard = found.reply_markup.expect("booking buttons").inline_keyboard;
    assert_eq!(keyboard[0][0].callback_data, format!("book_{}", book.id));

    bot.handle_update(button(&format!("book_{}", book.id))).await.unwrap();
    assert!(chat.last().text.starts_with("Enter the expected return date"));

    bot.handle_update(text("in three days")).await.unwrap();
    assert!(chat.last().text.starts_with("Invalid date format."));
    assert_eq!(borrowing_count(&pool).await, 0);

    let due = in_days(3);
    bot.handle_update(text(&due.format("%Y-%m-%d").to_string())).await.unwrap();
    assert_eq!(
        chat.last().text,
        format!("✅ Dune is reserved for you until {}.", due)
    );
    assert_eq!(borrowing_count(&pool).await, 1);
    assert_eq!(inventory(&repository, book.id).await, 1);
}

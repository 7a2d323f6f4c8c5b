//! Account scenarios against a real database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test accounts -- --ignored

use sqlx::PgPool;

use lending_server::{
    config::AuthConfig,
    error::AppError,
    models::user::{RegisterUser, Role},
    repository::{users::NewUser, Repository},
    services::users::UsersService,
};

fn registration(email: &str) -> RegisterUser {
    RegisterUser {
        email: email.to_string(),
        password: "secret1".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_insert_is_a_conflict(pool: PgPool) {
    let repository = Repository::new(pool);
    let user = NewUser {
        email: "ada@example.com".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role: Role::Reader,
    };
    repository.users.create(&user).await.unwrap();

    let shouted = NewUser {
        email: "ADA@example.com".to_string(),
        ..user
    };
    let result = repository.users.create(&shouted).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_registrations_keep_one_account(pool: PgPool) {
    let users = UsersService::new(Repository::new(pool.clone()), AuthConfig::default());

    let (first, second) = tokio::join!(
        users.register(registration("ada@example.com")),
        users.register(registration("Ada@Example.com")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count(),
        1
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

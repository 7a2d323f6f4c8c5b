//! Business logic services

pub mod borrowings;
pub mod bot;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod payments;
pub mod redis;
pub mod telegram;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

use self::{checkout::PaymentProvider, notifications::NotificationDispatcher, telegram::ChatSender};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub borrowings: borrowings::BorrowingsService,
    pub payments: payments::PaymentsService,
    pub bot: bot::BotService,
    pub redis: redis::RedisService,
    pub repository: Repository,
}

impl Services {
    /// Wire all services around one repository and the external collaborators
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        redis_service: redis::RedisService,
        provider: Arc<dyn PaymentProvider>,
        chat: Arc<dyn ChatSender>,
        notifications: NotificationDispatcher,
    ) -> Self {
        let catalog = catalog::CatalogService::new(repository.clone());
        let users = users::UsersService::new(repository.clone(), config.auth.clone());
        let payments = payments::PaymentsService::new(
            repository.clone(),
            provider,
            notifications.clone(),
            config.server.public_url.clone(),
        );
        let borrowings = borrowings::BorrowingsService::new(
            repository.clone(),
            payments.clone(),
            notifications,
            &config.payments,
        );
        let bot = bot::BotService::new(
            Arc::new(redis_service.clone()),
            users.clone(),
            catalog.clone(),
            borrowings.clone(),
            chat,
        );

        Self {
            catalog,
            users,
            borrowings,
            payments,
            bot,
            redis: redis_service,
            repository,
        }
    }
}

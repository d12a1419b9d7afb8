use std::sync::Arc;

use qcm_core::model::PaymentSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::account_service::AccountService;
use crate::catalog_service::CatalogService;
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::payment_service::PaymentService;
use crate::quiz_service::QuizService;

/// Assembles app-facing services over one storage medium.
#[derive(Clone)]
pub struct AppServices {
    quiz: Arc<QuizService>,
    catalog: Arc<CatalogService>,
    accounts: Arc<AccountService>,
    payments: Arc<PaymentService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::from_storage(&storage, config.payment.clone(), clock))
    }

    /// Build `SQLite`-backed services configured from `QCM_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for an invalid variable, or
    /// `AppServicesError::Sqlite` if storage initialization fails.
    pub async fn from_env(clock: Clock) -> Result<Self, AppServicesError> {
        Self::from_lookup(|var| std::env::var(var).ok(), clock).await
    }

    /// Like [`AppServices::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for an invalid variable, or
    /// `AppServicesError::Sqlite` if storage initialization fails.
    pub async fn from_lookup<F>(lookup: F, clock: Clock) -> Result<Self, AppServicesError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig::from_lookup(lookup)?;
        Self::new_sqlite(&config, clock).await
    }

    /// Build services backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory(payment: PaymentSettings, clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), payment, clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, payment: PaymentSettings, clock: Clock) -> Self {
        let catalog = CatalogService::new(storage.chapters.clone());
        let quiz = Arc::new(QuizService::new(
            clock,
            storage.users.clone(),
            storage.answers.clone(),
            catalog.clone(),
        ));
        let accounts = Arc::new(AccountService::new(
            clock,
            storage.users.clone(),
            storage.auth.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            clock,
            Arc::new(payment),
            storage.users.clone(),
        ));

        Self {
            quiz,
            catalog: Arc::new(catalog),
            accounts,
            payments,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn accounts(&self) -> Arc<AccountService> {
        Arc::clone(&self.accounts)
    }

    #[must_use]
    pub fn payments(&self) -> Arc<PaymentService> {
        Arc::clone(&self.payments)
    }
}

#![forbid(unsafe_code)]

pub mod account_service;
pub mod app_services;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod payment_service;
pub mod quiz_service;

pub use qcm_core::Clock;

pub use account_service::AccountService;
pub use app_services::AppServices;
pub use catalog_service::{CatalogService, ChapterListing};
pub use config::AppConfig;
pub use error::{
    AccountError, AppServicesError, CatalogError, ConfigError, PaymentError, QuizError,
};
pub use payment_service::{PaymentInstructions, PaymentService, PendingActivation};
pub use quiz_service::{ChapterSheet, QuizService, SubmittedAnswer};

//! Business logic services for the Meadery inventory system

pub mod access;
pub mod audit;
pub mod auth;
pub mod batch;
pub mod client;
pub mod material;
pub mod notification;
pub mod order;
pub mod product;
pub mod recipe;
pub mod reporting;
pub mod user;

pub use access::Session;
pub use audit::AuditService;
pub use auth::AuthService;
pub use batch::BatchService;
pub use client::ClientService;
pub use material::MaterialService;
pub use notification::NotificationService;
pub use order::OrderService;
pub use product::ProductService;
pub use recipe::RecipeService;
pub use reporting::ReportingService;
pub use user::UserService;

use crate::error::{AppError, AppResult};

/// Turn a failed shared validation rule into a field error
pub(crate) fn ensure(field: &str, rule: Result<(), &'static str>, message_ru: &str) -> AppResult<()> {
    rule.map_err(|message| AppError::validation(field, message, message_ru))
}

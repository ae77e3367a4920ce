//! Error handling for the Meadery inventory system
//!
//! Provides consistent error details in Russian and English for the
//! presentation layer.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::UnknownVariant;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_ru: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_ru: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule violations
    #[error("Insufficient stock of {material}: required {required}, available {available}")]
    InsufficientStock {
        material: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient product {product_id}: requested {requested}, available {available}")]
    InsufficientProduct {
        product_id: i64,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Delete blocked by referencing records
    #[error("Client is referenced by existing orders")]
    ClientInUse,

    #[error("Recipe is referenced by existing batches")]
    RecipeInUse,

    #[error("Raw material is referenced by batches or recipes")]
    MaterialInUse,

    #[error("User owns existing batches or orders")]
    UserInUse,

    // Store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing error description
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ru: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: impl Into<String>, message_ru: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_ru: message_ru.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl AppError {
    /// Build a validation error for a single field
    pub fn validation(field: &str, message: &str, message_ru: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_ru: message_ru.to_string(),
        }
    }

    /// Build a uniqueness conflict
    pub fn conflict(resource: &str, message: &str, message_ru: &str) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.to_string(),
            message_ru: message_ru.to_string(),
        }
    }

    /// Delete blocked because other records still reference the target
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            AppError::ClientInUse
                | AppError::RecipeInUse
                | AppError::MaterialInUse
                | AppError::UserInUse
        )
    }

    /// Failure of the persistent store itself, as opposed to a rejected request
    pub fn is_store_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Migration(_))
    }

    /// Map the error to the message shown to the user
    pub fn detail(&self) -> ErrorDetail {
        let detail = match self {
            AppError::InvalidCredentials => ErrorDetail::new(
                "INVALID_CREDENTIALS",
                "Invalid login or password",
                "Неверный логин или пароль",
            ),
            AppError::Forbidden => ErrorDetail::new(
                "FORBIDDEN",
                "You do not have permission to perform this action",
                "Недостаточно прав для выполнения операции",
            ),
            AppError::Validation {
                field,
                message,
                message_ru,
            } => ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_ru.clone())
                .with_field(field),
            AppError::Conflict {
                resource,
                message,
                message_ru,
            } => ErrorDetail::new("CONFLICT", message.clone(), message_ru.clone())
                .with_field(resource),
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("Не найдено: {}", resource),
            ),
            AppError::InsufficientStock {
                material,
                required,
                available,
            } => ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                format!(
                    "Not enough {} (required {}, available {})",
                    material, required, available
                ),
                format!(
                    "Недостаточно сырья «{}» (нужно {}, есть {})",
                    material, required, available
                ),
            ),
            AppError::InsufficientProduct {
                product_id,
                requested,
                available,
            } => ErrorDetail::new(
                "INSUFFICIENT_PRODUCT",
                format!(
                    "Not enough product {} (requested {} l, available {} l)",
                    product_id, requested, available
                ),
                format!(
                    "Недостаточно продукции {} (нужно {} л, есть {} л)",
                    product_id, requested, available
                ),
            ),
            AppError::InvalidStateTransition(msg) => ErrorDetail::new(
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Недопустимая смена состояния: {}", msg),
            ),
            AppError::ClientInUse => ErrorDetail::new(
                "CLIENT_IN_USE",
                "The client has orders and cannot be deleted",
                "Нельзя удалить клиента, у которого есть заказы",
            ),
            AppError::RecipeInUse => ErrorDetail::new(
                "RECIPE_IN_USE",
                "The recipe is used by batches and cannot be deleted",
                "Нельзя удалить рецепт, по которому есть партии",
            ),
            AppError::MaterialInUse => ErrorDetail::new(
                "MATERIAL_IN_USE",
                "The raw material is used by batches or recipes and cannot be deleted",
                "Нельзя удалить сырьё, которое используется в партиях или рецептах",
            ),
            AppError::UserInUse => ErrorDetail::new(
                "USER_IN_USE",
                "The user owns batches or orders and cannot be deleted",
                "Нельзя удалить пользователя, за которым числятся партии или заказы",
            ),
            AppError::Database(_) | AppError::Migration(_) => ErrorDetail::new(
                "STORE_ERROR",
                "A database error occurred",
                "Ошибка базы данных",
            ),
            AppError::Internal(msg) => ErrorDetail::new(
                "INTERNAL_ERROR",
                msg.clone(),
                "Внутренняя ошибка",
            ),
        };

        if self.is_store_error() || matches!(self, AppError::Internal(_)) {
            tracing::error!(error = ?self, "operation failed");
        } else {
            tracing::debug!(code = %detail.code, "operation rejected");
        }

        detail
    }
}

impl From<UnknownVariant> for AppError {
    fn from(err: UnknownVariant) -> Self {
        AppError::Internal(format!("Corrupt stored value: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: errors.to_string(),
            message_ru: format!("Некорректное значение поля «{}»", field),
            field,
        }
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;

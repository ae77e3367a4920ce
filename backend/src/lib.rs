//! Meadery inventory core
//!
//! Raw-material ledger, batch lifecycle, finished-product inventory, order
//! fulfillment and access control for a small honey-drink production
//! business, on top of a SQLite store. A presentation layer calls into the
//! services held by [`AppState`].

pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorDetail};

use sqlx::SqlitePool;
use std::sync::Arc;

use services::{
    AuditService, AuthService, BatchService, ClientService, MaterialService, NotificationService,
    OrderService, ProductService, RecipeService, ReportingService, UserService,
};

/// Application state shared with the presentation layer
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub users: UserService,
    pub materials: MaterialService,
    pub recipes: RecipeService,
    pub batches: BatchService,
    pub products: ProductService,
    pub clients: ClientService,
    pub orders: OrderService,
    pub audit: AuditService,
    pub notifications: NotificationService,
    pub reports: ReportingService,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self {
            auth: AuthService::new(db.clone(), &config.auth),
            users: UserService::new(db.clone(), &config.auth),
            materials: MaterialService::new(db.clone(), &config.inventory),
            recipes: RecipeService::new(db.clone()),
            batches: BatchService::new(db.clone()),
            products: ProductService::new(db.clone()),
            clients: ClientService::new(db.clone()),
            orders: OrderService::new(db.clone()),
            audit: AuditService::new(db.clone()),
            notifications: NotificationService::new(db.clone()),
            reports: ReportingService::new(db.clone()),
            config: Arc::new(config),
            db,
        }
    }
}

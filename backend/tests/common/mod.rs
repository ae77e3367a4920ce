//! Shared setup for store-backed tests: an in-memory database with the schema
//! applied and one session per role.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use meadery_backend::config::{
    AuthConfig, Config, DatabaseConfig, InventoryConfig, LoggingConfig,
};
use meadery_backend::db;
use meadery_backend::services::batch::BatchInput;
use meadery_backend::services::client::ClientInput;
use meadery_backend::services::material::PurchaseMaterialInput;
use meadery_backend::services::recipe::RecipeInput;
use meadery_backend::services::user::CreateUserInput;
use meadery_backend::services::Session;
use meadery_backend::AppState;
use shared::{Batch, Client, ClientType, FinishedProduct, RawMaterial, Recipe, Role, Unit};

pub const PASSWORD: &str = "secret1";

pub struct TestApp {
    pub state: AppState,
    pub admin: Session,
    pub owner: Session,
    pub technologist: Session,
    pub assistant: Session,
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout_secs: 5,
            create_if_missing: true,
        },
        // Minimum bcrypt cost keeps the suite fast
        auth: AuthConfig { bcrypt_cost: 4 },
        inventory: InventoryConfig::default(),
        logging: LoggingConfig { json: false },
    }
}

pub async fn setup() -> TestApp {
    let pool = db::memory_pool().await.unwrap();
    let state = AppState::new(pool, test_config());

    let admin = Session::new(
        state
            .users
            .bootstrap_admin("admin", "admin-pass")
            .await
            .unwrap(),
    );

    let mut sessions = Vec::new();
    for (login, role) in [
        ("owner", Role::Entrepreneur),
        ("tech", Role::Technologist),
        ("helper", Role::Assistant),
    ] {
        let user = state
            .users
            .create_user(
                &admin,
                CreateUserInput {
                    login: login.to_string(),
                    password: PASSWORD.to_string(),
                    role,
                },
            )
            .await
            .unwrap();
        sessions.push(Session::new(user));
    }
    let assistant = sessions.pop().unwrap();
    let technologist = sessions.pop().unwrap();
    let owner = sessions.pop().unwrap();

    TestApp {
        state,
        admin,
        owner,
        technologist,
        assistant,
    }
}

impl TestApp {
    pub async fn purchase(&self, name: &str, quantity: &str, unit: Unit) -> RawMaterial {
        self.state
            .materials
            .purchase_material(
                &self.owner,
                PurchaseMaterialInput {
                    name: name.to_string(),
                    quantity: dec(quantity),
                    unit,
                    cost_per_unit: dec("500"),
                    purchase_date: date(2024, 3, 1),
                    min_quantity: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn honey(&self, quantity: &str) -> RawMaterial {
        self.purchase("Мед", quantity, Unit::Kg).await
    }

    pub async fn recipe(&self, name: &str, base_material: Option<&str>) -> Recipe {
        self.state
            .recipes
            .create_recipe(
                &self.owner,
                RecipeInput {
                    name: name.to_string(),
                    description: String::new(),
                    base_material: base_material.map(str::to_string),
                },
            )
            .await
            .unwrap()
    }

    pub async fn batch(&self, recipe_id: i64, volume: &str, price: &str) -> Batch {
        self.state
            .batches
            .create_batch(
                &self.owner,
                BatchInput {
                    recipe_id,
                    volume: dec(volume),
                    start_date: date(2024, 3, 1),
                    price_per_liter: dec(price),
                },
            )
            .await
            .unwrap()
    }

    /// Start a batch and move it straight to ready
    pub async fn product(&self, recipe_id: i64, volume: &str, price: &str) -> FinishedProduct {
        let batch = self.batch(recipe_id, volume, price).await;
        self.state
            .batches
            .transition_to_ready(&self.owner, batch.id)
            .await
            .unwrap()
    }

    pub async fn client(&self, name: &str) -> Client {
        self.state
            .clients
            .create_client(
                &self.owner,
                ClientInput {
                    name: name.to_string(),
                    client_type: ClientType::Individual,
                    contact: "+7 900 123-45-67".to_string(),
                    tax_id: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn material(&self, id: i64) -> RawMaterial {
        self.state
            .materials
            .get_material(&self.owner, id)
            .await
            .unwrap()
    }

    pub async fn available(&self, product_id: i64) -> Decimal {
        self.state
            .products
            .get_product(&self.owner, product_id)
            .await
            .unwrap()
            .available_volume
    }
}

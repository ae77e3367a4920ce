//! Client management service

use serde::Deserialize;
use shared::{validate_tax_id, validate_tax_id_format, Capability, Client, ClientType};
use sqlx::{FromRow, SqlitePool};
use validator::{Validate, ValidationError};

use crate::db::matches_search;
use crate::error::{AppError, AppResult};
use crate::services::ensure;
use crate::services::access::Session;

/// Client service
#[derive(Clone)]
pub struct ClientService {
    db: SqlitePool,
}

/// Input for creating or editing a client
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientInput {
    #[validate(length(min = 1, message = "Client name is required"))]
    pub name: String,
    pub client_type: ClientType,
    #[validate(length(min = 1, message = "Contact is required"))]
    pub contact: String,
    #[validate(custom = "tax_id_format_rule")]
    pub tax_id: Option<String>,
}

fn tax_id_format_rule(tax_id: &str) -> Result<(), ValidationError> {
    validate_tax_id_format(tax_id).map_err(|message| {
        let mut error = ValidationError::new("tax_id");
        error.message = Some(message.into());
        error
    })
}

#[derive(Debug, FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    client_type: String,
    contact: String,
    tax_id: Option<String>,
}

impl ClientRow {
    fn into_client(self) -> AppResult<Client> {
        Ok(Client {
            id: self.id,
            name: self.name,
            client_type: self.client_type.parse()?,
            contact: self.contact,
            tax_id: self.tax_id,
        })
    }
}

impl ClientInput {
    /// Trim text fields and treat a blank tax id as absent
    fn normalized(self) -> AppResult<Self> {
        let input = ClientInput {
            name: self.name.trim().to_string(),
            client_type: self.client_type,
            contact: self.contact.trim().to_string(),
            tax_id: self
                .tax_id
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        };
        input.validate()?;
        Ok(input)
    }
}

impl ClientService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a client. A new tax id must carry valid check digits; edits
    /// only check its shape so older records stay editable.
    pub async fn create_client(&self, session: &Session, input: ClientInput) -> AppResult<Client> {
        session.require(Capability::ManageClients)?;
        let input = input.normalized()?;
        if let Some(tax_id) = &input.tax_id {
            ensure(
                "tax_id",
                validate_tax_id(tax_id),
                "Некорректная контрольная сумма ИНН",
            )?;
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO clients (name, client_type, contact, tax_id) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&input.name)
        .bind(input.client_type.as_str())
        .bind(&input.contact)
        .bind(&input.tax_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(client_id = id, by = %session.login(), "client created");
        Ok(Client {
            id,
            name: input.name,
            client_type: input.client_type,
            contact: input.contact,
            tax_id: input.tax_id,
        })
    }

    pub async fn update_client(
        &self,
        session: &Session,
        id: i64,
        input: ClientInput,
    ) -> AppResult<Client> {
        session.require(Capability::ManageClients)?;
        let input = input.normalized()?;

        let result = sqlx::query(
            "UPDATE clients SET name = ?, client_type = ?, contact = ?, tax_id = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(input.client_type.as_str())
        .bind(&input.contact)
        .bind(&input.tax_id)
        .bind(id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Client".to_string()));
        }

        tracing::info!(client_id = id, by = %session.login(), "client updated");
        Ok(Client {
            id,
            name: input.name,
            client_type: input.client_type,
            contact: input.contact,
            tax_id: input.tax_id,
        })
    }

    /// Delete a client without orders
    pub async fn delete_client(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Capability::ManageClients)?;
        self.get_client(session, id).await?;

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE client_id = ?")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if orders > 0 {
            tracing::warn!(client_id = id, orders, "delete blocked: client in use");
            return Err(AppError::ClientInUse);
        }

        sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(client_id = id, by = %session.login(), "client deleted");
        Ok(())
    }

    /// Clients whose name or contact contains the search text
    pub async fn list_clients(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> AppResult<Vec<Client>> {
        session.require(Capability::ManageClients)?;
        let rows = sqlx::query_as::<_, ClientRow>(
            "SELECT id, name, client_type, contact, tax_id FROM clients ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .filter(|row| matches_search(&row.name, search) || matches_search(&row.contact, search))
            .map(ClientRow::into_client)
            .collect()
    }

    pub async fn get_client(&self, session: &Session, id: i64) -> AppResult<Client> {
        session.require(Capability::ManageClients)?;
        sqlx::query_as::<_, ClientRow>(
            "SELECT id, name, client_type, contact, tax_id FROM clients WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))?
        .into_client()
    }
}

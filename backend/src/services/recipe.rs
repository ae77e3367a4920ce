//! Recipe management service

use serde::Deserialize;
use shared::{validate_not_blank, Capability, Recipe, DEFAULT_BASE_MATERIAL};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::matches_search;
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::ensure;

/// Recipe service
#[derive(Clone)]
pub struct RecipeService {
    db: SqlitePool,
}

/// Input for creating or editing a recipe
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ingredient consumed by batches, honey when not given
    pub base_material: Option<String>,
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: i64,
    name: String,
    description: String,
    base_material: String,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: row.id,
            name: row.name,
            description: row.description,
            base_material: row.base_material,
        }
    }
}

/// Load a recipe within an open transaction
pub(crate) async fn fetch_recipe(conn: &mut SqliteConnection, id: i64) -> AppResult<Recipe> {
    sqlx::query_as::<_, RecipeRow>(
        "SELECT id, name, description, base_material FROM recipes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .map(Recipe::from)
    .ok_or_else(|| AppError::NotFound("Recipe".to_string()))
}

impl RecipeInput {
    fn normalized(&self) -> AppResult<(String, String, String)> {
        let name = self.name.trim();
        ensure("name", validate_not_blank(name), "Укажите название рецепта")?;
        let base_material = self
            .base_material
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BASE_MATERIAL);
        Ok((
            name.to_string(),
            self.description.trim().to_string(),
            base_material.to_string(),
        ))
    }
}

impl RecipeService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_recipe(&self, session: &Session, input: RecipeInput) -> AppResult<Recipe> {
        session.require(Capability::ManageRecipes)?;
        let (name, description, base_material) = input.normalized()?;
        self.ensure_name_free(&name, None).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO recipes (name, description, base_material) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&name)
        .bind(&description)
        .bind(&base_material)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(recipe = %name, by = %session.login(), "recipe created");
        Ok(Recipe {
            id,
            name,
            description,
            base_material,
        })
    }

    pub async fn update_recipe(
        &self,
        session: &Session,
        id: i64,
        input: RecipeInput,
    ) -> AppResult<Recipe> {
        session.require(Capability::ManageRecipes)?;
        let (name, description, base_material) = input.normalized()?;
        self.ensure_name_free(&name, Some(id)).await?;

        let result = sqlx::query(
            "UPDATE recipes SET name = ?, description = ?, base_material = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&description)
        .bind(&base_material)
        .bind(id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Recipe".to_string()));
        }

        tracing::info!(recipe_id = id, by = %session.login(), "recipe updated");
        Ok(Recipe {
            id,
            name,
            description,
            base_material,
        })
    }

    /// Delete a recipe no batch refers to
    pub async fn delete_recipe(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Capability::ManageRecipes)?;
        self.get_recipe(session, id).await?;

        let batches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batches WHERE recipe_id = ?")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if batches > 0 {
            tracing::warn!(recipe_id = id, batches, "delete blocked: recipe in use");
            return Err(AppError::RecipeInUse);
        }

        sqlx::query("DELETE FROM recipes WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(recipe_id = id, by = %session.login(), "recipe deleted");
        Ok(())
    }

    pub async fn list_recipes(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> AppResult<Vec<Recipe>> {
        session.require(Capability::ManageRecipes)?;
        let rows = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, name, description, base_material FROM recipes ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| matches_search(&row.name, search))
            .map(Recipe::from)
            .collect())
    }

    pub async fn get_recipe(&self, session: &Session, id: i64) -> AppResult<Recipe> {
        session.require(Capability::ManageRecipes)?;
        let mut conn = self.db.acquire().await?;
        fetch_recipe(&mut *conn, id).await
    }

    async fn ensure_name_free(&self, name: &str, except_id: Option<i64>) -> AppResult<()> {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE name = ? AND id != ?")
            .bind(name)
            .bind(except_id.unwrap_or(0))
            .fetch_one(&self.db)
            .await?;
        if taken > 0 {
            return Err(AppError::conflict(
                "name",
                "A recipe with this name already exists",
                "Рецепт с таким названием уже существует",
            ));
        }
        Ok(())
    }
}

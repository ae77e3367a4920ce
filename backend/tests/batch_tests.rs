//! Raw-material ledger and batch lifecycle tests
//!
//! Covers:
//! - Batch creation consumes exactly the batch volume, or nothing at all
//! - Ready transition materializes a single finished product
//! - Editing and deleting fermenting batches reconciles the ledger

mod common;

use common::{date, dec, setup};
use meadery_backend::services::batch::{BatchFilter, BatchInput};
use meadery_backend::services::material::{PurchaseMaterialInput, UpdateMaterialInput};
use meadery_backend::services::recipe::RecipeInput;
use meadery_backend::AppError;
use proptest::prelude::*;
use shared::{AuditedTable, BatchStatus, DateRange, Unit};

// ============================================================================
// Batch creation
// ============================================================================

#[tokio::test]
async fn test_batch_consumes_honey() {
    let app = setup().await;
    let honey = app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;

    let batch = app.batch(recipe.id, "100", "600").await;

    assert_eq!(batch.status, BatchStatus::Fermenting);
    assert_eq!(batch.end_date, date(2024, 3, 15));
    assert_eq!(batch.user_id, app.owner.user_id());
    assert_eq!(app.material(honey.id).await.quantity, dec("150"));
}

#[tokio::test]
async fn test_batch_rejected_when_honey_short() {
    let app = setup().await;
    let honey = app.honey("50").await;
    let recipe = app.recipe("Классическая", None).await;

    let err = app
        .state
        .batches
        .create_batch(
            &app.owner,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("100"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            material,
            required,
            available,
        } => {
            assert_eq!(material, "Мед");
            assert_eq!(required, dec("100"));
            assert_eq!(available, dec("50"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(app.material(honey.id).await.quantity, dec("50"));
    let batches = app
        .state
        .batches
        .list_batches(&app.owner, &BatchFilter::default())
        .await
        .unwrap();
    assert!(batches.is_empty());
}

#[tokio::test]
async fn test_missing_base_material_counts_as_empty() {
    let app = setup().await;
    let recipe = app.recipe("Сбитень", Some("Патока")).await;

    let err = app
        .state
        .batches
        .create_batch(
            &app.owner,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("10"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("300"),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientStock { ref material, available, .. }
            if material == "Патока" && available.is_zero()
    ));
}

#[tokio::test]
async fn test_batch_input_validation() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;

    let zero_volume = app
        .state
        .batches
        .create_batch(
            &app.owner,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("0"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await;
    assert!(matches!(zero_volume, Err(AppError::Validation { ref field, .. }) if field == "volume"));

    // Below the 0.001 l storage resolution
    let tiny_volume = app
        .state
        .batches
        .create_batch(
            &app.owner,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("0.0001"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await;
    assert!(matches!(tiny_volume, Err(AppError::Validation { ref field, .. }) if field == "volume"));

    let batch = app.batch(recipe.id, "10", "600").await;
    let tiny_update = app
        .state
        .batches
        .update_batch(
            &app.owner,
            batch.id,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("0.0004"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await;
    assert!(matches!(tiny_update, Err(AppError::Validation { ref field, .. }) if field == "volume"));
    let unchanged = app
        .state
        .batches
        .get_batch(&app.owner, batch.id)
        .await
        .unwrap();
    assert_eq!(unchanged.volume, dec("10"));

    let unknown_recipe = app
        .state
        .batches
        .create_batch(
            &app.owner,
            BatchInput {
                recipe_id: 999,
                volume: dec("10"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await;
    assert!(matches!(unknown_recipe, Err(AppError::NotFound(_))));
}

// ============================================================================
// Ready transition
// ============================================================================

#[tokio::test]
async fn test_ready_keeps_product_created_by_another_session() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    // Another process materialized the product but has not flipped the status yet
    let existing_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO finished_products (batch_id, volume, available_volume, production_date, price_per_liter)
        VALUES (?, 100000, 90000, ?, 60000)
        RETURNING id
        "#,
    )
    .bind(batch.id)
    .bind(batch.end_date)
    .fetch_one(&app.state.db)
    .await
    .unwrap();

    let product = app
        .state
        .batches
        .transition_to_ready(&app.owner, batch.id)
        .await
        .unwrap();
    assert_eq!(product.id, existing_id);
    assert_eq!(product.available_volume, dec("90"));

    let ready = app
        .state
        .batches
        .get_batch(&app.owner, batch.id)
        .await
        .unwrap();
    assert_eq!(ready.status, BatchStatus::Ready);
}

#[tokio::test]
async fn test_transition_to_ready_is_idempotent() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    let first = app
        .state
        .batches
        .transition_to_ready(&app.owner, batch.id)
        .await
        .unwrap();
    let second = app
        .state
        .batches
        .transition_to_ready(&app.owner, batch.id)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.volume, dec("100"));
    assert_eq!(first.available_volume, dec("100"));
    assert_eq!(first.production_date, batch.end_date);
    assert_eq!(first.price_per_liter, dec("600"));

    let products = app
        .state
        .products
        .list_products(&app.owner, &Default::default())
        .await
        .unwrap();
    assert_eq!(products.len(), 1);

    let stored = app.state.batches.get_batch(&app.owner, batch.id).await.unwrap();
    assert_eq!(stored.status, BatchStatus::Ready);
}

#[tokio::test]
async fn test_ready_batch_cannot_go_back() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    let ready = app
        .state
        .batches
        .set_status(&app.owner, batch.id, BatchStatus::Ready)
        .await
        .unwrap();
    assert_eq!(ready.status, BatchStatus::Ready);

    let err = app
        .state
        .batches
        .set_status(&app.owner, batch.id, BatchStatus::Fermenting)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let product = app
        .state
        .products
        .product_for_batch(&app.owner, batch.id)
        .await
        .unwrap();
    assert!(product.is_some());
}

// ============================================================================
// Editing and deleting batches
// ============================================================================

#[tokio::test]
async fn test_update_batch_reconciles_ledger_and_audits_price() {
    let app = setup().await;
    let honey = app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    let updated = app
        .state
        .batches
        .update_batch(
            &app.owner,
            batch.id,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("120"),
                start_date: date(2024, 3, 2),
                price_per_liter: dec("650"),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.volume, dec("120"));
    assert_eq!(updated.end_date, date(2024, 3, 16));
    assert_eq!(app.material(honey.id).await.quantity, dec("130"));

    let changes = app
        .state
        .audit
        .list_price_changes(&app.owner, Some(AuditedTable::Batches), Some(batch.id))
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_price, dec("600"));
    assert_eq!(changes[0].new_price, dec("650"));
    assert_eq!(changes[0].changed_by, "owner");
}

#[tokio::test]
async fn test_update_batch_without_price_change_leaves_no_audit() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    app.state
        .batches
        .update_batch(
            &app.owner,
            batch.id,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("100"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600.00"),
            },
        )
        .await
        .unwrap();

    let changes = app
        .state
        .audit
        .list_price_changes(&app.owner, None, None)
        .await
        .unwrap();
    assert!(changes.is_empty());
}

#[tokio::test]
async fn test_update_batch_switching_recipe_moves_consumption() {
    let app = setup().await;
    let honey = app.honey("250").await;
    let water = app.purchase("Вода", "500", Unit::L).await;
    let mead = app.recipe("Классическая", None).await;
    let kvass = app.recipe("Медовый квас", Some("Вода")).await;
    let batch = app.batch(mead.id, "100", "600").await;

    app.state
        .batches
        .update_batch(
            &app.owner,
            batch.id,
            BatchInput {
                recipe_id: kvass.id,
                volume: dec("100"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await
        .unwrap();

    assert_eq!(app.material(honey.id).await.quantity, dec("250"));
    assert_eq!(app.material(water.id).await.quantity, dec("400"));
}

#[tokio::test]
async fn test_failed_update_keeps_original_consumption() {
    let app = setup().await;
    let honey = app.honey("150").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    let err = app
        .state
        .batches
        .update_batch(
            &app.owner,
            batch.id,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("200"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("700"),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(app.material(honey.id).await.quantity, dec("50"));
    let stored = app.state.batches.get_batch(&app.owner, batch.id).await.unwrap();
    assert_eq!(stored.volume, dec("100"));
    assert_eq!(stored.price_per_liter, dec("600"));
}

#[tokio::test]
async fn test_delete_fermenting_batch_credits_material() {
    let app = setup().await;
    let honey = app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let batch = app.batch(recipe.id, "100", "600").await;

    app.state
        .batches
        .delete_batch(&app.owner, batch.id)
        .await
        .unwrap();

    assert_eq!(app.material(honey.id).await.quantity, dec("250"));
    let err = app
        .state
        .batches
        .get_batch(&app.owner, batch.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_batch_with_product_is_locked() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    let product = app.product(recipe.id, "100", "600").await;

    let delete = app
        .state
        .batches
        .delete_batch(&app.owner, product.batch_id)
        .await;
    assert!(matches!(delete, Err(AppError::InvalidStateTransition(_))));

    let update = app
        .state
        .batches
        .update_batch(
            &app.owner,
            product.batch_id,
            BatchInput {
                recipe_id: recipe.id,
                volume: dec("50"),
                start_date: date(2024, 3, 1),
                price_per_liter: dec("600"),
            },
        )
        .await;
    assert!(matches!(update, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn test_list_batches_filters() {
    let app = setup().await;
    app.honey("500").await;
    let recipe = app.recipe("Классическая", None).await;
    let fermenting = app.batch(recipe.id, "100", "600").await;
    let product = app.product(recipe.id, "100", "600").await;

    let ready = app
        .state
        .batches
        .list_batches(
            &app.owner,
            &BatchFilter {
                status: Some(BatchStatus::Ready),
                start_range: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, product.batch_id);

    let in_march = app
        .state
        .batches
        .list_batches(
            &app.owner,
            &BatchFilter {
                status: Some(BatchStatus::Fermenting),
                start_range: Some(DateRange::new(date(2024, 3, 1), date(2024, 3, 31))),
            },
        )
        .await
        .unwrap();
    assert_eq!(in_march.len(), 1);
    assert_eq!(in_march[0].id, fermenting.id);

    let in_april = app
        .state
        .batches
        .list_batches(
            &app.owner,
            &BatchFilter {
                status: None,
                start_range: Some(DateRange::new(date(2024, 4, 1), date(2024, 4, 30))),
            },
        )
        .await
        .unwrap();
    assert!(in_april.is_empty());
}

// ============================================================================
// Material ledger
// ============================================================================

#[tokio::test]
async fn test_repeat_purchase_adds_quantity_and_audits_cost() {
    let app = setup().await;
    let honey = app.honey("100").await;
    assert_eq!(honey.min_quantity, dec("10"));

    let restocked = app
        .state
        .materials
        .purchase_material(
            &app.owner,
            PurchaseMaterialInput {
                name: "Мед".to_string(),
                quantity: dec("40.5"),
                unit: Unit::Kg,
                cost_per_unit: dec("550"),
                purchase_date: date(2024, 3, 10),
                min_quantity: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(restocked.id, honey.id);
    assert_eq!(restocked.quantity, dec("140.5"));
    assert_eq!(restocked.purchase_date, date(2024, 3, 10));

    let changes = app
        .state
        .audit
        .list_price_changes(&app.owner, Some(AuditedTable::RawMaterials), None)
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].record_id, honey.id);
    assert_eq!(changes[0].new_price, dec("550"));
}

#[tokio::test]
async fn test_repeat_purchase_with_other_unit_rejected() {
    let app = setup().await;
    app.honey("100").await;

    let err = app
        .state
        .materials
        .purchase_material(
            &app.owner,
            PurchaseMaterialInput {
                name: "Мед".to_string(),
                quantity: dec("10"),
                unit: Unit::L,
                cost_per_unit: dec("500"),
                purchase_date: date(2024, 3, 10),
                min_quantity: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit"));
}

#[tokio::test]
async fn test_update_material_name_clash_is_conflict() {
    let app = setup().await;
    app.honey("100").await;
    let water = app.purchase("Вода", "100", Unit::L).await;

    let err = app
        .state
        .materials
        .update_material(
            &app.owner,
            water.id,
            UpdateMaterialInput {
                name: "Мед".to_string(),
                quantity: dec("100"),
                unit: Unit::L,
                cost_per_unit: dec("500"),
                purchase_date: date(2024, 3, 1),
                min_quantity: dec("10"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_material_rename_follows_into_recipes() {
    let app = setup().await;
    let honey = app.honey("200").await;
    let recipe = app.recipe("Классическая", None).await;

    app.state
        .materials
        .update_material(
            &app.owner,
            honey.id,
            UpdateMaterialInput {
                name: "Мед липовый".to_string(),
                quantity: dec("200"),
                unit: Unit::Kg,
                cost_per_unit: dec("500"),
                purchase_date: date(2024, 3, 1),
                min_quantity: dec("10"),
            },
        )
        .await
        .unwrap();

    let renamed = app
        .state
        .recipes
        .get_recipe(&app.owner, recipe.id)
        .await
        .unwrap();
    assert_eq!(renamed.base_material, "Мед липовый");

    app.batch(recipe.id, "50", "600").await;
    assert_eq!(app.material(honey.id).await.quantity, dec("150"));
}

#[tokio::test]
async fn test_delete_material_guarded_by_references() {
    let app = setup().await;
    let honey = app.honey("100").await;
    let yeast = app.purchase("Дрожжи", "5", Unit::Kg).await;
    app.recipe("Классическая", None).await;

    let err = app
        .state
        .materials
        .delete_material(&app.owner, honey.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MaterialInUse));
    assert!(err.is_constraint_violation());

    app.state
        .materials
        .delete_material(&app.owner, yeast.id)
        .await
        .unwrap();
    let left = app
        .state
        .materials
        .list_materials(&app.owner, None)
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name, "Мед");
}

#[tokio::test]
async fn test_low_stock_and_search() {
    let app = setup().await;
    app.honey("100").await;
    app.purchase("Дрожжи", "2", Unit::Kg).await;

    let low = app.state.materials.low_stock(&app.owner).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].name, "Дрожжи");

    let found = app
        .state
        .materials
        .list_materials(&app.owner, Some("мед"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Мед");
}

// ============================================================================
// Recipes
// ============================================================================

#[tokio::test]
async fn test_recipe_in_use_cannot_be_deleted() {
    let app = setup().await;
    app.honey("250").await;
    let recipe = app.recipe("Классическая", None).await;
    app.batch(recipe.id, "100", "600").await;

    let err = app
        .state
        .recipes
        .delete_recipe(&app.owner, recipe.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RecipeInUse));

    let kept = app
        .state
        .recipes
        .get_recipe(&app.owner, recipe.id)
        .await
        .unwrap();
    assert_eq!(kept.name, "Классическая");
}

#[tokio::test]
async fn test_update_recipe_changes_base_and_rejects_duplicate_name() {
    let app = setup().await;
    let classic = app.recipe("Классическая", None).await;
    app.recipe("Пряная", None).await;

    let updated = app
        .state
        .recipes
        .update_recipe(
            &app.technologist,
            classic.id,
            RecipeInput {
                name: "Классическая".to_string(),
                description: "На воде".to_string(),
                base_material: Some("Вода".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.base_material, "Вода");
    assert_eq!(updated.description, "На воде");

    let clash = app
        .state
        .recipes
        .update_recipe(
            &app.technologist,
            classic.id,
            RecipeInput {
                name: "Пряная".to_string(),
                description: String::new(),
                base_material: None,
            },
        )
        .await;
    assert!(matches!(clash, Err(AppError::Conflict { .. })));

    let found = app
        .state
        .recipes
        .list_recipes(&app.technologist, Some("пря"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_unused_recipe_is_deleted() {
    let app = setup().await;
    let recipe = app.recipe("Пробная", None).await;
    assert_eq!(recipe.base_material, "Мед");

    app.state
        .recipes
        .delete_recipe(&app.owner, recipe.id)
        .await
        .unwrap();
    let recipes = app
        .state
        .recipes
        .list_recipes(&app.owner, None)
        .await
        .unwrap();
    assert!(recipes.is_empty());
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Batch creation succeeds exactly when stock covers the volume and then
    /// deducts exactly the volume
    #[test]
    fn prop_batch_consumption_is_exact(stock in 1u32..500, volume in 1u32..500) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let app = setup().await;
            let honey = app.honey(&stock.to_string()).await;
            let recipe = app.recipe("Классическая", None).await;

            let result = app
                .state
                .batches
                .create_batch(
                    &app.owner,
                    BatchInput {
                        recipe_id: recipe.id,
                        volume: volume.into(),
                        start_date: date(2024, 3, 1),
                        price_per_liter: dec("600"),
                    },
                )
                .await;

            let left = app.material(honey.id).await.quantity;
            if stock >= volume {
                assert!(result.is_ok());
                assert_eq!(left, rust_decimal::Decimal::from(stock - volume));
            } else {
                assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
                assert_eq!(left, rust_decimal::Decimal::from(stock));
            }
        });
    }
}

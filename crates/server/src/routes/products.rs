//! Catalog read and admin CRUD handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use gilded_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::{NewProduct, Product, ProductUpdate};
use crate::services::notify::{ChangeEvent, FeedAction};
use crate::state::AppState;

/// List the catalog, newest first.
///
/// GET /products
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.store().list_products().await?;
    Ok(Json(products))
}

/// Create a product (admin).
///
/// POST /products
#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("product name is required".to_owned()));
    }
    if input.price.amount() < 0 {
        return Err(AppError::BadRequest("price must not be negative".to_owned()));
    }

    let product = state.store().insert_product(input).await?;
    state
        .feed()
        .publish(ChangeEvent::product(FeedAction::Insert, &product));

    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product (admin).
///
/// PATCH /products/{id}
#[instrument(skip(state, update))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    if let Some(price) = update.price
        && price.amount() < 0
    {
        return Err(AppError::BadRequest("price must not be negative".to_owned()));
    }

    let product = state
        .store()
        .update_product(ProductId::new(id), update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    state
        .feed()
        .publish(ChangeEvent::product(FeedAction::Update, &product));

    Ok(Json(product))
}

/// Delete a product (admin). Historical order lines keep their snapshots and
/// fall back to a generic display name.
///
/// DELETE /products/{id}
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.store().delete_product(ProductId::new(id)).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    state.feed().publish(ChangeEvent::product_deleted(id));

    tracing::info!(product_id = id, "Product deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

//! Per-user cart handlers.
//!
//! The cart itself is pure state ([`crate::cart::Cart`]); these handlers
//! hydrate it from the per-user cache, apply one mutation, and flush it back
//! - the cache is written on every mutation so the cart survives reloads
//! without ever crossing users.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gilded_core::{Money, ProductId, UserId};

use crate::cart::{Cart, CartLine};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query selecting whose cart to operate on.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    /// Owning user.
    pub user_id: i32,
}

/// Input for replacing the whole cart.
#[derive(Debug, Deserialize)]
pub struct ReplaceCartInput {
    /// Owning user.
    pub user_id: i32,
    /// The new cart lines.
    pub lines: Vec<CartLine>,
}

/// Input for adding a product to the cart.
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    /// Owning user.
    pub user_id: i32,
    /// Product to add.
    pub product_id: i32,
    /// Units to add (default 1).
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Input for one-line adjustments and clearing.
#[derive(Debug, Deserialize)]
pub struct AdjustCartInput {
    /// Owning user.
    pub user_id: i32,
    /// Line to adjust.
    pub product_id: i32,
}

/// Input for clearing the cart.
#[derive(Debug, Deserialize)]
pub struct ClearCartInput {
    /// Owning user.
    pub user_id: i32,
}

/// The cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    /// Current lines.
    pub lines: Vec<CartLine>,
    /// Sum of line totals.
    pub total: Money,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        Self {
            lines: cart.into_lines(),
            total,
        }
    }
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<Cart> {
    Ok(Cart::from_lines(state.store().load_cart(user_id).await?))
}

async fn flush_cart(state: &AppState, user_id: UserId, cart: Cart) -> Result<Json<CartResponse>> {
    state.store().save_cart(user_id, cart.lines()).await?;
    Ok(Json(CartResponse::from(cart)))
}

/// Load the cached cart.
///
/// GET /cart?user_id=X
#[instrument(skip(state))]
pub async fn load(
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartResponse>> {
    let cart = load_cart(&state, UserId::new(query.user_id)).await?;
    Ok(Json(CartResponse::from(cart)))
}

/// Replace the whole cart atomically (client-side hydration writeback).
///
/// PUT /cart
#[instrument(skip(state, input))]
pub async fn replace(
    State(state): State<AppState>,
    Json(input): Json<ReplaceCartInput>,
) -> Result<Json<CartResponse>> {
    let user_id = UserId::new(input.user_id);
    let mut cart = load_cart(&state, user_id).await?;
    cart.set_all(input.lines);
    flush_cart(&state, user_id, cart).await
}

/// Add a product, merging into an existing line and capping at stock.
///
/// POST /cart/add
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Json(input): Json<AddToCartInput>,
) -> Result<Json<CartResponse>> {
    let user_id = UserId::new(input.user_id);
    let product = state
        .store()
        .get_product(ProductId::new(input.product_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", input.product_id)))?;

    let mut cart = load_cart(&state, user_id).await?;
    cart.add(&product, input.quantity);
    flush_cart(&state, user_id, cart).await
}

/// Bump a line by one, capped at its stock ceiling.
///
/// POST /cart/increase
#[instrument(skip(state))]
pub async fn increase(
    State(state): State<AppState>,
    Json(input): Json<AdjustCartInput>,
) -> Result<Json<CartResponse>> {
    let user_id = UserId::new(input.user_id);
    let mut cart = load_cart(&state, user_id).await?;
    cart.increase(ProductId::new(input.product_id));
    flush_cart(&state, user_id, cart).await
}

/// Drop a line by one, removing it below one.
///
/// POST /cart/decrease
#[instrument(skip(state))]
pub async fn decrease(
    State(state): State<AppState>,
    Json(input): Json<AdjustCartInput>,
) -> Result<Json<CartResponse>> {
    let user_id = UserId::new(input.user_id);
    let mut cart = load_cart(&state, user_id).await?;
    cart.decrease(ProductId::new(input.product_id));
    flush_cart(&state, user_id, cart).await
}

/// Empty the cart.
///
/// POST /cart/clear
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Json(input): Json<ClearCartInput>,
) -> Result<Json<CartResponse>> {
    let user_id = UserId::new(input.user_id);
    let mut cart = load_cart(&state, user_id).await?;
    cart.clear();
    flush_cart(&state, user_id, cart).await
}

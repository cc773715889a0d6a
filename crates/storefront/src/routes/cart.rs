//! Cart and wishlist route handlers.
//!
//! The working cart lives in the session. Each handler loads it, applies one
//! action through [`CartStore`](crate::services::CartStore), and stores it
//! back only if the action succeeded.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kramnytsia_core::{Cart, CartItem, ProductId};

use super::products::load_product;
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::session::{load_cart, store_cart};
use crate::services::SyncStatus;
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub wishlist: Vec<ProductId>,
    pub item_count: u32,
    /// USD.
    pub subtotal: Decimal,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            wishlist: cart.wishlist().to_vec(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

async fn save(session: &Session, cart: &Cart) -> Result<Json<CartView>> {
    store_cart(session, cart).await?;
    Ok(Json(CartView::from(cart)))
}

/// GET /api/cart
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// POST /api/cart/items
#[instrument(skip(state, session, user))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let product = load_product(&state, request.product_id).await?;
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .add_to_cart(&mut cart, user.map(|u| u.id), &product.snapshot(), request.quantity)
        .await?;
    save(&session, &cart).await
}

/// POST /api/cart/items/{id}/increase
pub async fn increase(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .increase_quantity(&mut cart, user.map(|u| u.id), ProductId::new(id))
        .await?;
    save(&session, &cart).await
}

/// POST /api/cart/items/{id}/decrease
///
/// Decreasing a line at quantity 1 removes it.
pub async fn decrease(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .decrease_quantity(&mut cart, user.map(|u| u.id), ProductId::new(id))
        .await?;
    save(&session, &cart).await
}

/// DELETE /api/cart/items/{id}
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .remove_from_cart(&mut cart, user.map(|u| u.id), ProductId::new(id))
        .await?;
    save(&session, &cart).await
}

/// DELETE /api/cart
///
/// Empties the cart; the wishlist is kept.
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    state.carts().clear_cart(&mut cart, user.map(|u| u.id)).await;
    save(&session, &cart).await
}

/// GET /api/wishlist
pub async fn wishlist(session: Session) -> Result<Json<Vec<ProductId>>> {
    let cart = load_cart(&session).await?;
    Ok(Json(cart.wishlist().to_vec()))
}

/// POST /api/wishlist
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<WishlistRequest>,
) -> Result<Json<CartView>> {
    // Reject unknown products before they reach the remote copy.
    load_product(&state, request.product_id).await?;
    let mut cart = load_cart(&session).await?;
    if state
        .carts()
        .add_to_wishlist(&mut cart, user.map(|u| u.id), request.product_id)
        .await
    {
        store_cart(&session, &cart).await?;
    }
    Ok(Json(CartView::from(&cart)))
}

/// DELETE /api/wishlist/{id}
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .remove_from_wishlist(&mut cart, user.map(|u| u.id), ProductId::new(id))
        .await?;
    save(&session, &cart).await
}

/// POST /api/wishlist/{id}/move-to-cart
pub async fn move_to_cart(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<CartView>> {
    let product = load_product(&state, ProductId::new(id)).await?;
    let mut cart = load_cart(&session).await?;
    state
        .carts()
        .move_to_cart(&mut cart, user.map(|u| u.id), &product.snapshot())
        .await?;
    save(&session, &cart).await
}

/// GET /api/sync-status
pub async fn sync_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Json<SyncStatus> {
    Json(state.carts().sync_status(user.id).await)
}

/// POST /api/sync-status/retry
///
/// Queue a full upload of the session cart to the account, or finish a
/// sign-in merge that is still pending.
pub async fn retry_sync(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<SyncStatus>> {
    let mut cart = load_cart(&session).await?;
    state.carts().resync(&mut cart, user.id).await;
    store_cart(&session, &cart).await?;
    Ok(Json(state.carts().sync_status(user.id).await))
}

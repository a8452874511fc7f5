//! The cart being built on the dashboard.
//!
//! Every mutation answers with the whole cart and its totals, so the
//! dashboard never recomputes money on its side.

use axum::extract::{Path, State};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use comptoir_core::import::ImportEstimate;
use comptoir_core::{Cart, CartTotals, CatalogItem, CoreResult, DiscountDescriptor, ItemKind, Money};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{id}", patch(update_quantity).delete(remove_item))
        .route("/api/cart/items/{id}/discount", put(set_item_discount))
        .route("/api/cart/discount", put(set_global_discount))
        .route("/api/cart/delivery", put(set_delivery_cost))
        .route("/api/cart/import-item", post(add_import_item))
}

/// The cart plus everything derived from it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: Cart,
    pub totals: CartTotals,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        CartResponse {
            cart: cart.clone(),
            totals: cart.totals(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub kind: ItemKind,
    pub catalog_item: CatalogItem,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    #[serde(default)]
    pub discount: Option<DiscountDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub delivery_cost: Money,
}

#[derive(Debug, Deserialize)]
pub struct ImportItemRequest {
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    pub estimate: ImportEstimate,
}

/// Applies `f` to the cart and returns the updated view.
fn mutate<F>(state: &AppState, f: F) -> ApiResult<Json<CartResponse>>
where
    F: FnOnce(&mut Cart) -> CoreResult<()>,
{
    let view = state.cart.with_cart_mut(|cart| {
        f(cart)?;
        Ok::<_, comptoir_core::CoreError>(CartResponse::from(&*cart))
    })?;
    Ok(Json(view))
}

pub async fn get_cart(State(state): State<AppState>) -> Json<CartResponse> {
    Json(state.cart.with_cart(|cart| CartResponse::from(cart)))
}

pub async fn clear_cart(State(state): State<AppState>) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| {
        cart.clear();
        Ok(())
    })
}

pub async fn add_item(State(state): State<AppState>, Json(body): Json<AddItemRequest>) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.add_item(body.kind, &body.catalog_item).map(|_| ()))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateQuantityRequest>,
) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.update_quantity(&id, body.quantity))
}

pub async fn remove_item(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.remove_item(&id))
}

pub async fn set_item_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DiscountRequest>,
) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.set_item_discount(&id, body.discount))
}

pub async fn set_global_discount(
    State(state): State<AppState>,
    Json(body): Json<DiscountRequest>,
) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.set_global_discount(body.discount))
}

pub async fn set_delivery_cost(
    State(state): State<AppState>,
    Json(body): Json<DeliveryRequest>,
) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| cart.set_delivery_cost(body.delivery_cost))
}

/// Adds the line for a confirmed import estimate.
pub async fn add_import_item(
    State(state): State<AppState>,
    Json(body): Json<ImportItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    mutate(&state, |cart| {
        cart.add_import_item(&body.name, &body.estimate, body.weight)
            .map(|_| ())
    })
}

//! Product catalogue endpoints.
//!
//! Every route is wrapped with `with_permissions`, so handlers receive the
//! authorized caller as an `Extension<Principal>`.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{PermissionGate, Principal, with_permissions};
use crate::db::{Database, NewProduct, Product, is_unique_violation};
use crate::permissions::Permission;

const VIEW: &[Permission] = &[Permission::ViewProduct];
const ADD: &[Permission] = &[Permission::AddProduct];
const UPDATE: &[Permission] = &[Permission::UpdateProduct];
const DELETE: &[Permission] = &[Permission::DeleteProduct];

const MAX_PRICE: f64 = 9_999_999.0;

#[derive(Clone)]
pub struct ProductsState {
    pub db: Database,
    pub gate: Arc<PermissionGate<Database>>,
}

pub fn router(state: ProductsState) -> Router {
    let gate = state.gate.clone();

    let by_id = with_permissions(get(get_product), gate.clone(), VIEW)
        .merge(with_permissions(patch(update_product), gate.clone(), UPDATE))
        .merge(with_permissions(delete(delete_product), gate.clone(), DELETE));

    Router::new()
        .route("/products", with_permissions(get(list_products), gate.clone(), VIEW))
        .route("/products/", with_permissions(get(list_products), gate.clone(), VIEW))
        .route("/products/create", with_permissions(post(create_product), gate, ADD))
        .route("/products/{id}", by_id)
        .with_state(state)
}

#[derive(Deserialize)]
struct ProductRequest {
    name: String,
    quantity: i64,
    price: f64,
}

impl ProductRequest {
    fn validate(&self) -> Result<NewProduct<'_>, ApiError> {
        let len = self.name.chars().count();
        if !(3..=100).contains(&len) {
            return Err(ApiError::bad_request(
                "Product name must be between 3 and 100 characters",
            ));
        }
        if self.quantity < 0 {
            return Err(ApiError::bad_request("Product quantity must be >= 0"));
        }
        // NaN fails both comparisons
        if !(self.price > 0.0 && self.price <= MAX_PRICE) {
            return Err(ApiError::bad_request(
                "Product price must be > 0.0 and <= 9999999.0",
            ));
        }

        Ok(NewProduct {
            name: &self.name,
            quantity: self.quantity,
            price: self.price,
        })
    }
}

#[derive(Serialize)]
struct ProductListResponse {
    total_products: usize,
    products: Vec<Product>,
}

async fn list_products(State(state): State<ProductsState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .db
        .products()
        .list()
        .await
        .db_err("Failed to list products")?;

    Ok(Json(ProductListResponse {
        total_products: products.len(),
        products,
    }))
}

async fn get_product(
    State(state): State<ProductsState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .db
        .products()
        .get(id)
        .await
        .db_err("Failed to get product")?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(product))
}

#[derive(Serialize)]
struct CreatedResponse {
    created_product: Product,
    user_who_created: Principal,
}

async fn create_product(
    State(state): State<ProductsState>,
    Extension(user): Extension<Principal>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_product = payload.validate()?;

    let taken = state
        .db
        .products()
        .is_name_taken(new_product.name)
        .await
        .db_err("Failed to check product name")?;

    if taken {
        return Err(ApiError::bad_request("Product already exists"));
    }

    let product = match state.db.products().create(&new_product).await {
        Ok(product) => product,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("Product already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create product", e)),
    };

    info!(
        product_id = product.id,
        username = %user.username,
        "Product created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            created_product: product,
            user_who_created: user,
        }),
    ))
}

#[derive(Serialize)]
struct UpdatedResponse {
    updated_product: Product,
    user_who_updated: Principal,
}

async fn update_product(
    State(state): State<ProductsState>,
    Extension(user): Extension<Principal>,
    Path(id): Path<i64>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = payload.validate()?;

    let product = match state.db.products().update(id, &changes).await {
        Ok(product) => product.ok_or_else(|| ApiError::not_found("Product not found"))?,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("Product already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update product", e)),
    };

    info!(product_id = id, username = %user.username, "Product updated");

    Ok(Json(UpdatedResponse {
        updated_product: product,
        user_who_updated: user,
    }))
}

async fn delete_product(
    State(state): State<ProductsState>,
    Extension(user): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .products()
        .delete(id)
        .await
        .db_err("Failed to delete product")?;

    if !deleted {
        return Err(ApiError::not_found("Product not found"));
    }

    info!(product_id = id, username = %user.username, "Product deleted");

    Ok(Json(json!({
        "message": format!("Product was deleted successfully by {}", user.username)
    })))
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use storefront_storage::{
    Address, Category, CategoryUpdate, MediaItem, NewAddress, NewCategory, NewMediaItem,
    NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product, ProductType,
    Role, Subcategory, User,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;

/// Header carrying the identity-provider user id of the caller.
pub const AUTH_USER_HEADER: &str = "x-auth-user-id";

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready whenever the entity store is; a missing cache only degrades latency.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache_available = state.cache.is_available().await;
    let body = json!({
        "status": "ready",
        "storage": state.storage.backend_name(),
        "cache": {
            "backend": state.cache.backend_name(),
            "available": cache_available,
        },
    });
    (StatusCode::OK, Json(body))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics recorder not installed\n".to_string(),
        ),
    }
}

// ---- Authorization ----

fn caller_id(headers: &HeaderMap) -> ApiResult<&str> {
    headers
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized(format!("missing {AUTH_USER_HEADER} header")))
}

/// Resolves the caller through the user cache and checks its role. Never
/// invalidates anything.
async fn require_role(state: &AppState, headers: &HeaderMap, allowed: &[Role]) -> ApiResult<User> {
    let auth_id = caller_id(headers)?;
    let user = state
        .catalog
        .user(auth_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized(format!("unknown user: {auth_id}")))?;
    if !allowed.contains(&user.role) {
        return Err(ApiError::forbidden(format!(
            "role '{}' may not perform this operation",
            user.role
        )));
    }
    Ok(user)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<User> {
    require_role(state, headers, &[Role::Admin]).await
}

// ---- Categories ----

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.catalog.categories().await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Category>> {
    state
        .catalog
        .category(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("category '{slug}'")))
}

pub async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    require_admin(&state, &headers).await?;
    let created = state.storage.create_category(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<CategoryUpdate>,
) -> ApiResult<Json<Category>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.update_category(&slug, &payload).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> ApiResult<Json<Category>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.remove_category(&slug).await?))
}

// ---- Subcategories ----

pub async fn list_subcategories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Subcategory>>> {
    Ok(Json(state.catalog.subcategories().await?))
}

pub async fn get_subcategory(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Subcategory>> {
    state
        .catalog
        .subcategory(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("subcategory '{slug}'")))
}

pub async fn create_subcategory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewSubcategory>,
) -> ApiResult<(StatusCode, Json<Subcategory>)> {
    require_admin(&state, &headers).await?;
    let created = state.storage.create_subcategory(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_subcategory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> ApiResult<Json<Subcategory>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.remove_subcategory(&slug).await?))
}

// ---- Product types ----

pub async fn list_product_types(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProductType>>> {
    Ok(Json(state.catalog.product_types().await?))
}

pub async fn get_product_type(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductType>> {
    state
        .catalog
        .product_type(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("product type '{slug}'")))
}

pub async fn create_product_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewProductType>,
) -> ApiResult<(StatusCode, Json<ProductType>)> {
    require_admin(&state, &headers).await?;
    let created = state.storage.create_product_type(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_product_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductType>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.remove_product_type(&slug).await?))
}

// ---- Media ----

pub async fn list_media(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<MediaItem>>> {
    Ok(Json(state.catalog.media(&params).await?))
}

/// Registers files already uploaded to the storage provider.
pub async fn create_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Vec<NewMediaItem>>,
) -> ApiResult<(StatusCode, Json<Vec<MediaItem>>)> {
    require_admin(&state, &headers).await?;
    let created = state.storage.create_media(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MediaItem>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.remove_media_item(id).await?))
}

// ---- Users ----

/// User provisioning, called by the identity provider webhook once the
/// payload is verified upstream.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let created = state.storage.create_user(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_id): Path<String>,
) -> ApiResult<Json<User>> {
    let caller = caller_id(&headers)?;
    if caller != auth_id {
        require_admin(&state, &headers).await?;
    }
    state
        .catalog
        .user(&auth_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("user '{auth_id}'")))
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub async fn update_user_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_id): Path<String>,
    Json(payload): Json<RoleUpdate>,
) -> ApiResult<Json<User>> {
    require_admin(&state, &headers).await?;
    Ok(Json(
        state.storage.update_user_role(&auth_id, payload.role).await?,
    ))
}

/// Deprovisioning, the counterpart of [`create_user`].
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_id): Path<String>,
) -> ApiResult<Json<User>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.remove_user(&auth_id).await?))
}

// ---- Products (not cached) ----

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Product>>> {
    Ok(Json(state.storage.paginate_products(&params).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .storage
        .get_product(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("product '{slug}'")))
}

pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_role(&state, &headers, &[Role::Seller, Role::Admin]).await?;
    let created = state.storage.create_product(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> ApiResult<Json<Product>> {
    require_role(&state, &headers, &[Role::Seller, Role::Admin]).await?;
    Ok(Json(state.storage.remove_product(&slug).await?))
}

// ---- Addresses (not cached) ----

/// Only the owner or an admin may touch a user's addresses.
async fn require_owner_or_admin(
    state: &AppState,
    headers: &HeaderMap,
    owner: &str,
) -> ApiResult<User> {
    let caller = require_role(state, headers, &[Role::Customer, Role::Seller, Role::Admin]).await?;
    if caller.auth_id != owner && caller.role != Role::Admin {
        return Err(ApiError::forbidden("not the owner of these addresses"));
    }
    Ok(caller)
}

pub async fn list_addresses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_id): Path<String>,
) -> ApiResult<Json<Vec<Address>>> {
    require_owner_or_admin(&state, &headers, &auth_id).await?;
    Ok(Json(state.storage.list_addresses(&auth_id).await?))
}

pub async fn create_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_id): Path<String>,
    Json(payload): Json<NewAddress>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    require_owner_or_admin(&state, &headers, &auth_id).await?;
    let created = state.storage.create_address(&auth_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Address>> {
    let caller = require_role(&state, &headers, &[Role::Customer, Role::Seller, Role::Admin]).await?;
    if caller.role != Role::Admin {
        let owned = state.storage.list_addresses(&caller.auth_id).await?;
        if !owned.iter().any(|a| a.id == id) {
            return Err(ApiError::not_found(format!("address '{id}'")));
        }
    }
    Ok(Json(state.storage.remove_address(id).await?))
}

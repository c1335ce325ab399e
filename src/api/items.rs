//! Item listing endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        item::{CreateItem, ItemQuery, UpdateItem},
        pagination::ItemPage,
        Item, ItemDetails, Page, Role,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List items with optional filters and full-text search
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "Paginated items, newest first", body = ItemPage),
        (status = 400, description = "Invalid filter or pagination", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<Page<ItemDetails>>> {
    let page = state.services.items.list(&query).await?;
    Ok(Json(page))
}

/// List the caller's own items
#[utoipa::path(
    get,
    path = "/items/mine",
    tag = "items",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Items owned by the caller", body = Vec<Item>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not a donor")
    )
)]
pub async fn list_my_items(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<Item>>> {
    caller.require_role(Role::Donor)?;

    let items = state.services.items.list_mine(&caller).await?;
    Ok(Json(items))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item with donor contact", body = ItemDetails),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ItemDetails>> {
    let item = state.services.items.get(id).await?;
    Ok(Json(item))
}

/// List a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not a donor")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(item): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    caller.require_role(Role::Donor)?;
    item.validate()?;

    let created = state.services.items.create(&caller, item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update one of the caller's items
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not the item's donor"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateItem>,
) -> AppResult<Json<Item>> {
    caller.require_role(Role::Donor)?;
    update.validate()?;

    let updated = state.services.items.update(&caller, id, update).await?;
    Ok(Json(updated))
}

/// Delete one of the caller's items
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Not the item's donor"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    caller.require_role(Role::Donor)?;

    state.services.items.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Donation request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        pagination::RequestPage,
        request::{CreateRequest, RequestQuery, UpdateRequestStatus},
        Page, RequestDetails, RequestStats, Role,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List the caller's requests (received for donors, sent for receivers)
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestQuery),
    responses(
        (status = 200, description = "Paginated requests, newest first", body = RequestPage),
        (status = 400, description = "Invalid filter or pagination", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<RequestQuery>,
) -> AppResult<Json<Page<RequestDetails>>> {
    let page = state.services.requests.list(&caller, &query).await?;
    Ok(Json(page))
}

/// Count the caller's requests by status
#[utoipa::path(
    get,
    path = "/requests/stats",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Request counts", body = RequestStats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn request_stats(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<RequestStats>> {
    let stats = state.services.stats.request_stats(&caller).await?;
    Ok(Json(stats))
}

/// Get a request the caller takes part in
#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request details", body = RequestDetails),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestDetails>> {
    let request = state.services.requests.get(&caller, id).await?;
    Ok(Json(request))
}

/// Request an available item
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created", body = RequestDetails),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a receiver, or owns the item"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "An active request already exists"),
        (status = 422, description = "Item is not available")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateRequest>,
) -> AppResult<(StatusCode, Json<RequestDetails>)> {
    caller.require_role(Role::Receiver)?;

    let created = state.services.requests.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Cancel one of the caller's pending or approved requests
#[utoipa::path(
    put,
    path = "/requests/{id}/cancel",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request cancelled", body = RequestDetails),
        (status = 403, description = "Not the requester"),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Request is already closed")
    )
)]
pub async fn cancel_request(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestDetails>> {
    caller.require_role(Role::Receiver)?;

    let request = state.services.requests.cancel(&caller, id).await?;
    Ok(Json(request))
}

/// Approve, reject or complete a request on one of the caller's items
#[utoipa::path(
    put,
    path = "/requests/{id}/status",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = UpdateRequestStatus,
    responses(
        (status = 200, description = "Request updated", body = RequestDetails),
        (status = 400, description = "Unsupported status", body = crate::error::ErrorResponse),
        (status = 403, description = "Not the item's donor"),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Transition not allowed from the current status")
    )
)]
pub async fn update_request_status(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateRequestStatus>,
) -> AppResult<Json<RequestDetails>> {
    caller.require_role(Role::Donor)?;

    let request = state.services.requests.update_status(&caller, id, update).await?;
    Ok(Json(request))
}

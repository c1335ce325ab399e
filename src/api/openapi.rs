//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, requests};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Donation Exchange API",
        version = "1.0.0",
        description = "Campus donation exchange: item listings and request workflow"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::list_my_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::delete_item,
        // Requests
        requests::list_requests,
        requests::request_stats,
        requests::get_request,
        requests::create_request,
        requests::cancel_request,
        requests::update_request_status,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::ItemDetails,
            crate::models::item::ItemSummary,
            crate::models::item::ItemQuery,
            crate::models::item::CreateItem,
            crate::models::item::UpdateItem,
            crate::models::enums::Category,
            crate::models::enums::Condition,
            crate::models::enums::ItemStatus,
            // Requests
            crate::models::request::DonationRequest,
            crate::models::request::RequestDetails,
            crate::models::request::RequestQuery,
            crate::models::request::CreateRequest,
            crate::models::request::UpdateRequestStatus,
            crate::models::request::RequestStats,
            crate::models::enums::RequestStatus,
            // Users
            crate::models::user::UserContact,
            // Pagination
            crate::models::pagination::ItemPage,
            crate::models::pagination::RequestPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Donated item listings"),
        (name = "requests", description = "Donation requests and their workflow")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/items", "/items/mine", "/items/{id}", "/requests/{id}/status", "/requests/stats"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}

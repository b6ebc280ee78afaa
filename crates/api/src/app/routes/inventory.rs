use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use brewline_core::IngredientId;
use brewline_infra::Services;
use brewline_inventory::{LeftoverSort, NewInventoryItem, PageRequest};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/getLeftOvers", get(leftovers))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<NewInventoryItem>,
) -> axum::response::Response {
    match services.inventory.create(body).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.inventory.list().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: IngredientId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.get(id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<NewInventoryItem>,
) -> axum::response::Response {
    let id: IngredientId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.update(id, body).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: IngredientId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `GET /inventory/getLeftOvers?sortBy=quantity|name&page=1&pageSize=10`
pub async fn leftovers(
    Extension(services): Extension<Arc<Services>>,
    query: Result<Query<dto::LeftoversQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::invalid_query(e.body_text()),
    };

    let sort = match query.sort_by.as_deref().filter(|s| !s.is_empty()) {
        None => LeftoverSort::default(),
        Some(raw) => match raw.parse::<LeftoverSort>() {
            Ok(sort) => sort,
            Err(e) => return errors::invalid_query(e.to_string()),
        },
    };
    let defaults = PageRequest::default();
    let page = match PageRequest::new(
        query.page.unwrap_or(defaults.page()),
        query.page_size.unwrap_or(defaults.page_size()),
    ) {
        Ok(p) => p,
        Err(e) => return errors::invalid_query(e.to_string()),
    };

    match services.inventory.leftovers(sort, page).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

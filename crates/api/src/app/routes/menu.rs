use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use brewline_core::MenuItemId;
use brewline_infra::Services;
use brewline_menu::NewMenuItem;

use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<NewMenuItem>,
) -> axum::response::Response {
    match services.menu.create(body).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.menu.list().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MenuItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.menu.get(id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<NewMenuItem>,
) -> axum::response::Response {
    let id: MenuItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.menu.update(id, body).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MenuItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.menu.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

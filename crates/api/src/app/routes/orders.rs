use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use brewline_core::OrderId;
use brewline_infra::Services;
use brewline_orders::NewOrder;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/numberOfOrderedItems", get(number_of_ordered_items))
        .route("/batch-process", post(process_batch))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/close", post(close_order))
}

pub async fn create_order(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<NewOrder>,
) -> axum::response::Response {
    match services.orders.create(body).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.orders.list().await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.get(id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<NewOrder>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.update(id, body).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Settle the order: `{order, inventory_updates}` on success.
pub async fn close_order(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.close(id).await {
        Ok(settled) => Json(settled).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn process_batch(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::BulkOrderRequest>,
) -> axum::response::Response {
    match services.orders.process_bulk(body.orders).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `GET /orders/numberOfOrderedItems?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD`
pub async fn number_of_ordered_items(
    Extension(services): Extension<Arc<Services>>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::invalid_query(e.body_text()),
    };

    match services
        .orders
        .number_of_ordered_items(query.start_date.as_deref(), query.end_date.as_deref())
        .await
    {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

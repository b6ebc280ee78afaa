use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};

use brewline_infra::Services;
use brewline_infra::reports::{DEFAULT_POPULAR_LIMIT, SearchQuery};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/total-sales", get(total_sales))
        .route("/popular-items", get(popular_items))
        .route("/orderedItemsByPeriod", get(ordered_items_by_period))
        .route("/search", get(search))
}

pub async fn total_sales(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.reports.total_sales().await {
        Ok(total_sales) => Json(dto::TotalSalesResponse { total_sales }).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn popular_items(
    Extension(services): Extension<Arc<Services>>,
    query: Result<Query<dto::PopularItemsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::invalid_query(e.body_text()),
    };

    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    match services.reports.popular_items(limit).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `?period=day&month=october&year=2024` or `?period=month&year=2024`
pub async fn ordered_items_by_period(
    Extension(services): Extension<Arc<Services>>,
    query: Result<Query<dto::PeriodQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::invalid_query(e.body_text()),
    };
    let Some(period) = query.period.filter(|p| !p.trim().is_empty()) else {
        return errors::invalid_query("period is required (day or month)");
    };

    match services
        .reports
        .ordered_items_by_period(&period, query.month.as_deref(), query.year)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `?q=latte&filter=menu,orders&minPrice=0&maxPrice=100`
pub async fn search(
    Extension(services): Extension<Arc<Services>>,
    query: Result<Query<dto::SearchParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match query {
        Ok(q) => q,
        Err(e) => return errors::invalid_query(e.body_text()),
    };

    let query = match SearchQuery::parse(
        params.q.as_deref(),
        params.filter.as_deref(),
        params.min_price,
        params.max_price,
    ) {
        Ok(q) => q,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match services.reports.search(query).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

use std::sync::Arc;

use chrono::Utc;

use crate::error::ServiceError;
use crate::reports::{Period, PeriodReport, PopularItem, SearchQuery, SearchResults};
use crate::store::Storage;

#[derive(Debug, Clone)]
pub struct ReportService {
    store: Arc<dyn Storage>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Revenue of closed orders.
    pub async fn total_sales(&self) -> Result<f64, ServiceError> {
        Ok(self.store.total_sales().await?)
    }

    pub async fn popular_items(&self, limit: u32) -> Result<Vec<PopularItem>, ServiceError> {
        if limit == 0 {
            return Err(ServiceError::Validation("limit must be at least 1".to_string()));
        }
        Ok(self.store.popular_items(limit).await?)
    }

    pub async fn ordered_items_by_period(
        &self,
        period: &str,
        month: Option<&str>,
        year: Option<i32>,
    ) -> Result<PeriodReport, ServiceError> {
        let period = Period::parse(period, month, year, Utc::now().date_naive())?;
        let lines = self.store.ordered_lines(period.range()).await?;
        Ok(period.report(&lines))
    }

    pub async fn search(&self, query: SearchQuery) -> Result<SearchResults, ServiceError> {
        let menu_items = if query.menu {
            self.store.search_menu(&query).await?
        } else {
            Vec::new()
        };
        let orders = if query.orders {
            self.store.search_orders(&query).await?
        } else {
            Vec::new()
        };
        Ok(SearchResults {
            total_matches: menu_items.len() + orders.len(),
            menu_items,
            orders,
        })
    }
}

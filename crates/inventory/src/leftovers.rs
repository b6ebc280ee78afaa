//! Paged "what is left in stock" listing.

use core::str::FromStr;
use serde::Serialize;

use brewline_core::{DomainError, DomainResult};

use crate::item::InventoryItem;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeftoverSort {
    /// Largest stock first.
    #[default]
    Quantity,
    /// Alphabetical.
    Name,
}

impl FromStr for LeftoverSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quantity" => Ok(Self::Quantity),
            "name" => Ok(Self::Name),
            other => Err(DomainError::validation(format!(
                "sortBy must be one of: quantity, name (got {other:?})"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leftover {
    pub name: String,
    pub quantity: f64,
}

impl From<&InventoryItem> for Leftover {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name().to_string(),
            quantity: item.quantity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeftoverPage {
    pub current_page: u32,
    pub has_next_page: bool,
    pub page_size: u32,
    pub total_pages: u64,
    pub data: Vec<Leftover>,
}

impl LeftoverPage {
    /// Wrap one page of rows given the total row count.
    pub fn new(request: PageRequest, total_items: u64, data: Vec<Leftover>) -> Self {
        let page_size = u64::from(request.page_size());
        let total_pages = total_items.div_ceil(page_size);
        Self {
            current_page: request.page(),
            has_next_page: u64::from(request.page()) < total_pages,
            page_size: request.page_size(),
            total_pages,
            data,
        }
    }

    /// Sort and slice a complete listing in memory.
    pub fn from_all(mut rows: Vec<Leftover>, sort: LeftoverSort, request: PageRequest) -> Self {
        sort_leftovers(&mut rows, sort);
        let total = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.page_size() as usize)
            .collect();
        Self::new(request, total, data)
    }
}

pub fn sort_leftovers(rows: &mut [Leftover], sort: LeftoverSort) {
    match sort {
        LeftoverSort::Quantity => rows.sort_by(|a, b| {
            b.quantity
                .total_cmp(&a.quantity)
                .then_with(|| a.name.cmp(&b.name))
        }),
        LeftoverSort::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
    }
}

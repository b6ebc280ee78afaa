//! Report read models and the pure aggregation behind them.
//!
//! Stores return raw ordered lines; bucketing by name, day or month happens
//! here so every backend reports identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use brewline_core::{DomainError, DomainResult, MenuItemId, OrderId};

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 100_000.0;
pub const DEFAULT_POPULAR_LIMIT: u32 = 10;

/// One order line as seen by reports: what was ordered, how many, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedLine {
    pub name: String,
    pub quantity: u64,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularItem {
    pub product_id: MenuItemId,
    pub name: String,
    pub quantity_sold: u64,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn parse_date(field: &str, raw: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("{field} must be formatted as YYYY-MM-DD")))
}

/// Half-open `[start, end)` window over order creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// A missing start means the epoch, a missing end means `now`; an explicit
    /// end date includes that whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> DomainResult<Self> {
        let start = match start.filter(|s| !s.trim().is_empty()) {
            Some(raw) => midnight(parse_date("startDate", raw)?),
            None => DateTime::<Utc>::default(),
        };
        let end = match end.filter(|s| !s.trim().is_empty()) {
            Some(raw) => {
                let day = parse_date("endDate", raw)?;
                let next = day
                    .succ_opt()
                    .ok_or_else(|| DomainError::validation("endDate is out of range"))?;
                midnight(next)
            }
            None => now,
        };
        if start > end {
            return Err(DomainError::validation("startDate must not be after endDate"));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Summed quantity per menu item name.
pub fn count_by_name(lines: &[OrderedLine]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for line in lines {
        *counts.entry(line.name.clone()).or_insert(0) += line.quantity;
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Per day of one month.
    Day { month: u32, year: i32 },
    /// Per month of one year.
    Month { year: i32 },
}

impl Period {
    /// `period=day` needs a month (name or number); the year defaults to `today`'s.
    pub fn parse(
        period: &str,
        month: Option<&str>,
        year: Option<i32>,
        today: NaiveDate,
    ) -> DomainResult<Self> {
        let year = year.unwrap_or_else(|| today.year());
        if !(1970..=9999).contains(&year) {
            return Err(DomainError::validation("year must be between 1970 and 9999"));
        }
        match period.to_ascii_lowercase().as_str() {
            "day" => {
                let month = match month.filter(|m| !m.trim().is_empty()) {
                    Some(raw) => parse_month(raw)?,
                    None => today.month(),
                };
                Ok(Period::Day { month, year })
            }
            "month" => Ok(Period::Month { year }),
            _ => Err(DomainError::validation("period must be one of: day, month")),
        }
    }

    pub fn range(&self) -> DateRange {
        let (first, last_exclusive) = match *self {
            Period::Day { month, year } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
                (first, first + Months::new(1))
            }
            Period::Month { year } => {
                let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default();
                (first, first + Months::new(12))
            }
        };
        DateRange {
            start: midnight(first),
            end: midnight(last_exclusive),
        }
    }

    /// Bucket lines into days or months; buckets without orders are omitted.
    pub fn report(&self, lines: &[OrderedLine]) -> PeriodReport {
        let range = self.range();
        let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
        for line in lines.iter().filter(|l| range.contains(l.ordered_at)) {
            let key = match self {
                Period::Day { .. } => line.ordered_at.day(),
                Period::Month { .. } => line.ordered_at.month(),
            };
            *buckets.entry(key).or_insert(0) += line.quantity;
        }

        let ordered_items = buckets
            .into_iter()
            .map(|(key, quantity)| {
                let label = match self {
                    Period::Day { .. } => key.to_string(),
                    Period::Month { .. } => MONTHS[(key - 1) as usize].to_string(),
                };
                BTreeMap::from([(label, quantity)])
            })
            .collect();

        match *self {
            Period::Day { month, year } => PeriodReport {
                period: "day",
                month: Some(MONTHS[(month - 1) as usize].to_string()),
                year,
                ordered_items,
            },
            Period::Month { year } => PeriodReport {
                period: "month",
                month: None,
                year,
                ordered_items,
            },
        }
    }
}

fn parse_month(raw: &str) -> DomainResult<u32> {
    let raw = raw.trim().to_ascii_lowercase();
    if let Some(idx) = MONTHS.iter().position(|m| *m == raw) {
        return Ok(idx as u32 + 1);
    }
    match raw.parse::<u32>() {
        Ok(n) if (1..=12).contains(&n) => Ok(n),
        _ => Err(DomainError::validation(format!("unknown month {raw:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    pub year: i32,
    #[serde(rename = "orderedItems")]
    pub ordered_items: Vec<BTreeMap<String, u64>>,
}

/// Parsed `/reports/search` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub menu: bool,
    pub orders: bool,
    pub min_price: f64,
    pub max_price: f64,
}

impl SearchQuery {
    pub fn parse(
        q: Option<&str>,
        filter: Option<&str>,
        min_price: Option<f64>,
        max_price: Option<f64>,
    ) -> DomainResult<Self> {
        let terms: Vec<String> = q
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if terms.is_empty() {
            return Err(DomainError::validation("search query q is required"));
        }

        let (mut menu, mut orders) = (false, false);
        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            None => (menu, orders) = (true, true),
            Some(raw) => {
                for part in raw.split(',').map(|p| p.trim().to_ascii_lowercase()) {
                    match part.as_str() {
                        "menu" => menu = true,
                        "orders" => orders = true,
                        "all" => (menu, orders) = (true, true),
                        other => {
                            return Err(DomainError::validation(format!(
                                "filter must be a comma separated list of: menu, orders, all (got {other:?})"
                            )));
                        }
                    }
                }
            }
        }

        let min_price = min_price.unwrap_or(DEFAULT_MIN_PRICE);
        let max_price = max_price.unwrap_or(DEFAULT_MAX_PRICE);
        if !min_price.is_finite() || !max_price.is_finite() || min_price < 0.0 || max_price < min_price {
            return Err(DomainError::validation(
                "price bounds must satisfy 0 <= minPrice <= maxPrice",
            ));
        }

        Ok(Self {
            terms,
            menu,
            orders,
            min_price,
            max_price,
        })
    }

    /// Case-insensitive: any term appearing anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.terms.iter().any(|t| text.contains(t.as_str()))
    }

    pub fn price_in_range(&self, price: f64) -> bool {
        self.min_price <= price && price <= self.max_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuMatch {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderMatch {
    pub id: OrderId,
    pub customer_name: String,
    pub items: Vec<String>,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub menu_items: Vec<MenuMatch>,
    pub orders: Vec<OrderMatch>,
    pub total_matches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn line(name: &str, quantity: u64, ordered_at: DateTime<Utc>) -> OrderedLine {
        OrderedLine {
            name: name.to_string(),
            quantity,
            ordered_at,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn date_range_defaults_and_inclusive_end() {
        let now = at(2024, 3, 15);
        let open = DateRange::parse(None, None, now).unwrap();
        assert_eq!(open.start, DateTime::<Utc>::default());
        assert_eq!(open.end, now);

        let bounded = DateRange::parse(Some("2024-03-01"), Some("2024-03-10"), now).unwrap();
        assert!(bounded.contains(at(2024, 3, 10)));
        assert!(!bounded.contains(at(2024, 3, 11)));
    }

    #[test]
    fn date_range_rejects_bad_input() {
        let now = at(2024, 3, 15);
        assert!(DateRange::parse(Some("03/01/2024"), None, now).is_err());
        assert!(DateRange::parse(Some("2024-03-10"), Some("2024-03-01"), now).is_err());
    }

    #[test]
    fn counts_sum_by_name() {
        let lines = vec![
            line("Latte", 2, at(2024, 3, 1)),
            line("Espresso", 1, at(2024, 3, 1)),
            line("Latte", 3, at(2024, 3, 2)),
        ];
        let counts = count_by_name(&lines);
        assert_eq!(counts.get("Latte"), Some(&5));
        assert_eq!(counts.get("Espresso"), Some(&1));
    }

    #[test]
    fn day_report_buckets_one_month() {
        let period = Period::parse("day", Some("March"), Some(2024), today()).unwrap();
        let lines = vec![
            line("Latte", 2, at(2024, 3, 1)),
            line("Latte", 3, at(2024, 3, 1)),
            line("Latte", 4, at(2024, 3, 9)),
            line("Latte", 7, at(2024, 4, 1)),
        ];
        let report = period.report(&lines);
        assert_eq!(report.month.as_deref(), Some("march"));
        assert_eq!(
            report.ordered_items,
            vec![BTreeMap::from([("1".to_string(), 5)]), BTreeMap::from([("9".to_string(), 4)])]
        );
    }

    #[test]
    fn month_report_buckets_one_year() {
        let period = Period::parse("month", None, None, today()).unwrap();
        assert_eq!(period, Period::Month { year: 2024 });
        let lines = vec![
            line("Latte", 1, at(2024, 1, 5)),
            line("Mocha", 2, at(2024, 12, 31)),
            line("Mocha", 2, at(2023, 12, 31)),
        ];
        let report = period.report(&lines);
        assert_eq!(
            report.ordered_items,
            vec![
                BTreeMap::from([("january".to_string(), 1)]),
                BTreeMap::from([("december".to_string(), 2)])
            ]
        );
    }

    #[test]
    fn period_parsing_errors() {
        assert!(Period::parse("week", None, None, today()).is_err());
        assert!(Period::parse("day", Some("smarch"), None, today()).is_err());
        assert_eq!(
            Period::parse("day", Some("2"), Some(2023), today()).unwrap(),
            Period::Day { month: 2, year: 2023 }
        );
    }

    #[test]
    fn search_query_defaults_and_filters() {
        let q = SearchQuery::parse(Some("Vanilla latte"), None, None, None).unwrap();
        assert_eq!(q.terms, vec!["vanilla", "latte"]);
        assert!(q.menu && q.orders);
        assert_eq!(q.max_price, DEFAULT_MAX_PRICE);
        assert!(q.matches("Iced LATTE"));
        assert!(!q.matches("Espresso"));

        let q = SearchQuery::parse(Some("latte"), Some("menu"), Some(2.0), Some(5.0)).unwrap();
        assert!(q.menu && !q.orders);
        assert!(q.price_in_range(5.0));
        assert!(!q.price_in_range(5.5));
    }

    #[test]
    fn search_query_rejects_bad_input() {
        assert!(SearchQuery::parse(None, None, None, None).is_err());
        assert!(SearchQuery::parse(Some("  "), None, None, None).is_err());
        assert!(SearchQuery::parse(Some("x"), Some("drinks"), None, None).is_err());
        assert!(SearchQuery::parse(Some("x"), None, Some(10.0), Some(5.0)).is_err());
    }
}

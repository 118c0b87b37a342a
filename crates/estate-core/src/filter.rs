//! A single filter model shared by every register.
//!
//! [`FilterState`] converts to and from a flat key/value query payload and can
//! also be applied directly to any [`Filterable`] collection, producing a page.

use std::cmp::Ordering;

use chrono::NaiveDate;
use estate_domain::{Deal, Employee, Invoice, Lead, Lease, Property, Tenant, Ticket, Unit, Voucher};
use serde::Serialize;

use crate::{CoreError, ServiceResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub search: Option<String>,
    pub statuses: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub sort: Option<Sort>,
    /// One-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: None,
            statuses: Vec::new(),
            date_from: None,
            date_to: None,
            amount_min: None,
            amount_max: None,
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Value an item exposes for ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Date(NaiveDate),
    Amount(f64),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            (SortValue::Amount(a), SortValue::Amount(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Text(_) => 0,
            SortValue::Date(_) => 1,
            SortValue::Amount(_) => 2,
        }
    }
}

/// Exposes the fields the unified filter understands.
///
/// Items without a status, date, or amount never match a filter that
/// constrains that dimension.
pub trait Filterable {
    fn search_text(&self) -> String;

    fn status_label(&self) -> Option<String> {
        None
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        None
    }

    fn filter_amount(&self) -> Option<f64> {
        None
    }

    fn sort_value(&self, field: &str) -> Option<SortValue>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn pages(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }
}

impl FilterState {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.push(status.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    /// Ordered query payload. Empty values are omitted; `page` and `limit` are always present.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: String| query.push((key.to_string(), value));
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            push("search", search.to_string());
        }
        let statuses: Vec<&str> = self
            .statuses
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !statuses.is_empty() {
            push("status", statuses.join(","));
        }
        if let Some(from) = self.date_from {
            push("from", from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = self.date_to {
            push("to", to.format("%Y-%m-%d").to_string());
        }
        if let Some(min) = self.amount_min {
            push("minAmount", min.to_string());
        }
        if let Some(max) = self.amount_max {
            push("maxAmount", max.to_string());
        }
        if let Some(sort) = &self.sort {
            push("sortBy", sort.field.clone());
            push("sortOrder", sort.order.as_str().to_string());
        }
        push("page", self.page.to_string());
        push("limit", self.page_size.to_string());
        query
    }

    /// Parses a payload produced by [`FilterState::to_query`]. Unknown keys are ignored.
    pub fn from_query<'a, I>(pairs: I) -> ServiceResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut state = FilterState::default();
        let mut sort_field = None;
        let mut sort_order = SortOrder::default();
        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "search" => state.search = Some(value.to_string()),
                "status" => {
                    state.statuses = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "from" => state.date_from = Some(parse_date(key, value)?),
                "to" => state.date_to = Some(parse_date(key, value)?),
                "minAmount" => state.amount_min = Some(parse_amount(key, value)?),
                "maxAmount" => state.amount_max = Some(parse_amount(key, value)?),
                "sortBy" => sort_field = Some(value.to_string()),
                "sortOrder" => {
                    sort_order = match value.to_ascii_lowercase().as_str() {
                        "asc" => SortOrder::Asc,
                        "desc" => SortOrder::Desc,
                        _ => return Err(bad_value(key, value)),
                    }
                }
                "page" => state.page = parse_count(key, value)?,
                "limit" => state.page_size = parse_count(key, value)?,
                _ => {}
            }
        }
        state.sort = sort_field.map(|field| Sort {
            field,
            order: sort_order,
        });
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.page == 0 {
            return Err(CoreError::validation("page starts at 1"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(CoreError::Validation(format!(
                "page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if to < from {
                return Err(CoreError::validation("date range ends before it starts"));
            }
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if max < min {
                return Err(CoreError::validation("maximum amount is below the minimum"));
            }
        }
        Ok(())
    }

    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !item
                .search_text()
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if !self.statuses.is_empty() {
            let Some(status) = item.status_label() else {
                return false;
            };
            if !self.statuses.iter().any(|s| s.trim().eq_ignore_ascii_case(&status)) {
                return false;
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = item.filter_date() else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from)
                || self.date_to.is_some_and(|to| date > to)
            {
                return false;
            }
        }
        if self.amount_min.is_some() || self.amount_max.is_some() {
            let Some(amount) = item.filter_amount() else {
                return false;
            };
            if self.amount_min.is_some_and(|min| amount < min)
                || self.amount_max.is_some_and(|max| amount > max)
            {
                return false;
            }
        }
        true
    }

    /// Filters, sorts (stable; items lacking the sort field go last), and pages.
    pub fn apply<'a, T, I>(&self, items: I) -> Page<&'a T>
    where
        T: Filterable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut matched: Vec<&'a T> = items.into_iter().filter(|item| self.matches(*item)).collect();
        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                match (a.sort_value(&sort.field), b.sort_value(&sort.field)) {
                    (Some(a), Some(b)) => {
                        let ordering = a.compare(&b);
                        match sort.order {
                            SortOrder::Asc => ordering,
                            SortOrder::Desc => ordering.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
        let total = matched.len();
        let page_size = self.page_size.max(1);
        let skip = self.page.saturating_sub(1).saturating_mul(page_size);
        Page {
            items: matched.into_iter().skip(skip).take(page_size).collect(),
            total,
            page: self.page.max(1),
            page_size,
        }
    }
}

fn bad_value(key: &str, value: &str) -> CoreError {
    CoreError::Validation(format!("invalid value `{}` for `{}`", value, key))
}

fn parse_date(key: &str, value: &str) -> ServiceResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| bad_value(key, value))
}

fn parse_amount(key: &str, value: &str) -> ServiceResult<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| bad_value(key, value))
}

fn parse_count(key: &str, value: &str) -> ServiceResult<usize> {
    value.parse().map_err(|_| bad_value(key, value))
}

fn text(value: &str) -> Option<SortValue> {
    Some(SortValue::Text(value.to_string()))
}

impl Filterable for Property {
    fn search_text(&self) -> String {
        format!("{} {} {} {}", self.tid, self.name, self.code, self.address)
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => text(&self.name),
            "code" => text(&self.code),
            "tid" => text(self.tid.as_str()),
            _ => None,
        }
    }
}

impl Filterable for Unit {
    fn search_text(&self) -> String {
        format!("{} {} {}", self.unit_number, self.name, self.kind)
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_amount(&self) -> Option<f64> {
        self.monthly_rent
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "unit" | "unitNumber" => text(&self.unit_number),
            "rent" | "amount" => self.monthly_rent.map(SortValue::Amount),
            _ => None,
        }
    }
}

impl Filterable for Tenant {
    fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.tid,
            self.name,
            self.email,
            self.phone.as_deref().unwrap_or_default()
        )
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.created_at.date_naive())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => text(&self.name),
            "email" => text(&self.email),
            "date" | "createdAt" => Some(SortValue::Date(self.created_at.date_naive())),
            _ => None,
        }
    }
}

impl Filterable for Lease {
    fn search_text(&self) -> String {
        format!("{} {}", self.status, self.billing.label())
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.start_date)
    }

    fn filter_amount(&self) -> Option<f64> {
        Some(self.rent)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "date" | "startDate" => Some(SortValue::Date(self.start_date)),
            "endDate" => Some(SortValue::Date(self.end_date)),
            "rent" | "amount" => Some(SortValue::Amount(self.rent)),
            _ => None,
        }
    }
}

impl Filterable for Invoice {
    fn search_text(&self) -> String {
        let descriptions: Vec<&str> = self.items.iter().map(|i| i.description.as_str()).collect();
        format!("{} {}", self.number, descriptions.join(" "))
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.issue_date)
    }

    fn filter_amount(&self) -> Option<f64> {
        Some(self.total_amount())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "number" => text(self.number.as_str()),
            "date" | "issueDate" => Some(SortValue::Date(self.issue_date)),
            "dueDate" => Some(SortValue::Date(self.due_date)),
            "amount" | "total" => Some(SortValue::Amount(self.total_amount())),
            "outstanding" => Some(SortValue::Amount(self.outstanding())),
            _ => None,
        }
    }
}

impl Filterable for Voucher {
    fn search_text(&self) -> String {
        format!("{} {} {}", self.reference(), self.voucher_type.code(), self.description)
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn filter_amount(&self) -> Option<f64> {
        Some(self.total_debit())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "number" | "reference" => text(&self.reference()),
            "date" => Some(SortValue::Date(self.date)),
            "amount" => Some(SortValue::Amount(self.total_debit())),
            _ => None,
        }
    }
}

impl Filterable for Employee {
    fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.tid,
            self.full_name(),
            self.email,
            self.position,
            self.department
        )
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.start_date)
    }

    fn filter_amount(&self) -> Option<f64> {
        Some(self.salary)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => text(&self.full_name()),
            "department" => text(&self.department),
            "date" | "startDate" => Some(SortValue::Date(self.start_date)),
            "salary" | "amount" => Some(SortValue::Amount(self.salary)),
            _ => None,
        }
    }
}

impl Filterable for Lead {
    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.email.as_deref().unwrap_or_default(),
            self.source.as_deref().unwrap_or_default()
        )
    }

    fn status_label(&self) -> Option<String> {
        Some(self.stage.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.created_at.date_naive())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => text(&self.name),
            "date" | "createdAt" => Some(SortValue::Date(self.created_at.date_naive())),
            _ => None,
        }
    }
}

impl Filterable for Deal {
    fn search_text(&self) -> String {
        format!("{} {}", self.tid, self.title)
    }

    fn status_label(&self) -> Option<String> {
        Some(self.stage.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        self.closed_on
    }

    fn filter_amount(&self) -> Option<f64> {
        Some(self.value)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "title" => text(&self.title),
            "value" | "amount" => Some(SortValue::Amount(self.value)),
            "closedOn" | "date" => self.closed_on.map(SortValue::Date),
            _ => None,
        }
    }
}

impl Filterable for Ticket {
    fn search_text(&self) -> String {
        format!("{} {} {} {}", self.tid, self.title, self.category, self.description)
    }

    fn status_label(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn filter_date(&self) -> Option<NaiveDate> {
        Some(self.created_at.date_naive())
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "title" => text(&self.title),
            "priority" => Some(SortValue::Amount(self.priority as u8 as f64)),
            "date" | "createdAt" => Some(SortValue::Date(self.created_at.date_naive())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_domain::{Tid, InvoiceItem, InvoiceStatus};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn invoice(seq: u32, issued: NaiveDate, amount: f64, status: InvoiceStatus) -> Invoice {
        let mut invoice = Invoice::new(
            Tid::format("INV", seq),
            issued,
            issued,
            vec![InvoiceItem::new(format!("Rent {}", seq), 1.0, amount)],
        );
        invoice.status = status;
        invoice
    }

    #[test]
    fn query_payload_omits_empty_values() {
        let state = FilterState {
            search: Some("  tower ".into()),
            statuses: vec!["issued".into(), "paid".into()],
            date_from: Some(date(1, 1)),
            amount_min: Some(100.5),
            sort: Some(Sort {
                field: "date".into(),
                order: SortOrder::Desc,
            }),
            page: 2,
            ..FilterState::default()
        };
        let query = state.to_query();
        let keys: Vec<&str> = query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["search", "status", "from", "minAmount", "sortBy", "sortOrder", "page", "limit"]
        );
        assert_eq!(query[1].1, "issued,paid");
        assert_eq!(query[2].1, "2025-01-01");
        assert_eq!(query[6].1, "2");
        assert_eq!(query[7].1, "20");

        let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let parsed = FilterState::from_query(pairs).unwrap();
        assert_eq!(parsed.search.as_deref(), Some("tower"));
        assert_eq!(parsed.statuses, vec!["issued", "paid"]);
        assert_eq!(parsed.sort.unwrap().order, SortOrder::Desc);

        assert_eq!(FilterState::default().to_query().len(), 2);
    }

    #[test]
    fn bad_query_values_are_rejected() {
        assert!(FilterState::from_query([("from", "01/02/2025")]).is_err());
        assert!(FilterState::from_query([("page", "0")]).is_err());
        assert!(FilterState::from_query([("sortOrder", "sideways")]).is_err());
        assert!(FilterState::from_query([("minAmount", "10"), ("maxAmount", "5")]).is_err());
        assert!(FilterState::from_query([("unknown", "x")]).is_ok());
    }

    #[test]
    fn apply_filters_sorts_and_pages() {
        let invoices = vec![
            invoice(1, date(1, 1), 900.0, InvoiceStatus::Paid),
            invoice(2, date(2, 1), 1200.0, InvoiceStatus::Issued),
            invoice(3, date(3, 1), 1500.0, InvoiceStatus::Issued),
            invoice(4, date(4, 1), 300.0, InvoiceStatus::Issued),
        ];
        let state = FilterState {
            amount_min: Some(1000.0),
            page_size: 1,
            ..FilterState::default()
        }
        .with_status("ISSUED")
        .sorted_by("amount", SortOrder::Desc);
        let page = state.apply(&invoices);
        assert_eq!(page.total, 2);
        assert_eq!(page.pages(), 2);
        assert_eq!(page.items[0].number.as_str(), "INV-0003");

        let search = FilterState::default().with_search("rent 2");
        assert_eq!(search.apply(&invoices).items.len(), 1);
    }
}

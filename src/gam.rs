// ===============================
// src/gam.rs
// ===============================
//
// Wire models for the Ad Manager REST (v1) surface plus the small helpers
// shared by the client and the service layer. Timestamps stay as raw JSON
// here; normalize.rs turns them into epoch millis.
//
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Network-scoped collections (plus the top-level network listing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource { Orders, LineItems, Networks, AdUnits, Creatives }

impl Resource {
    /// Path segment and response field share the same name.
    pub fn collection(&self) -> &'static str {
        match self {
            Resource::Orders => "orders",
            Resource::LineItems => "lineItems",
            Resource::Networks => "networks",
            Resource::AdUnits => "adUnits",
            Resource::Creatives => "creatives",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub page_size: u32,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn new(page_size: u32) -> Self { Self { page_size, ..Default::default() } }
    pub fn filter(mut self, f: impl Into<String>) -> Self { self.filter = Some(f.into()); self }
    pub fn order_by(mut self, o: impl Into<String>) -> Self { self.order_by = Some(o.into()); self }

    /// Query string (without `?`), url-encoded.
    pub fn query(&self) -> String {
        let mut params: Vec<(&str, String)> = vec![("pageSize", self.page_size.to_string())];
        if let Some(f) = &self.filter { params.push(("filter", f.clone())); }
        if let Some(o) = &self.order_by { params.push(("orderBy", o.clone())); }
        if let Some(t) = &self.page_token { params.push(("pageToken", t.clone())); }
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_page_token: Option<String>,
}

// ---- Entities ----
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireOrder {
    pub name: Option<String>,
    pub order_id: Option<Value>,
    pub display_name: Option<String>,
    pub status: Value,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub unlimited_end_time: Option<Value>,
    pub currency_code: Option<String>,
    pub advertiser: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireGoal {
    pub goal_type: Option<String>,
    pub unit_type: Option<String>,
    pub units: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireLineItem {
    pub name: Option<String>,
    pub line_item_id: Option<Value>,
    pub display_name: Option<String>,
    pub order: Option<String>,
    pub status: Value,
    pub line_item_type: Option<String>,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub unlimited_end_time: Option<Value>,
    pub goal: Option<WireGoal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireNetwork {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub network_code: Option<String>,
    pub property_code: Option<String>,
    pub effective_root_ad_unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireAdUnit {
    pub name: Option<String>,
    pub ad_unit_id: Option<Value>,
    pub parent_ad_unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireCreative {
    pub name: Option<String>,
    pub creative_id: Option<Value>,
    pub display_name: Option<String>,
    pub advertiser: Option<String>,
}

/// Numeric order status codes as some surfaces emit them.
pub const ORDER_STATUS_CODES: [(i64, &str); 7] = [
    (2, "DRAFT"),
    (3, "PENDING_APPROVAL"),
    (4, "APPROVED"),
    (5, "DISAPPROVED"),
    (6, "PAUSED"),
    (7, "CANCELED"),
    (8, "DELETED"),
];

pub const LINE_ITEM_STATUS_CODES: [(i64, &str); 11] = [
    (1, "DELIVERY_EXTENDED"),
    (2, "DELIVERING"),
    (3, "READY"),
    (4, "PAUSED"),
    (5, "INACTIVE"),
    (6, "PAUSED_INVENTORY_RELEASED"),
    (7, "PENDING_APPROVAL"),
    (8, "COMPLETED"),
    (9, "DISAPPROVED"),
    (10, "DRAFT"),
    (11, "CANCELED"),
];

/// Last segment of a resource name: `networks/1/orders/42` -> `42`.
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Explicit id field if present, else the tail of the resource name.
pub fn entity_id(explicit: &Option<Value>, name: &Option<String>) -> Option<String> {
    match explicit {
        Some(Value::Number(n)) => return Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        _ => {}
    }
    name.as_deref().map(resource_id).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Booleans occasionally arrive as strings or 0/1.
pub fn flag_is_true(v: &Option<Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

pub fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---- Reports ----
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType { Historical, FutureSellThrough }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDateRange {
    Fixed { start: NaiveDate, end: NaiveDate },
    Relative(&'static str),
}

fn civil(d: &NaiveDate) -> Value {
    serde_json::json!({ "year": d.year(), "month": d.month(), "day": d.day() })
}

impl Serialize for ReportDateRange {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let v = match self {
            ReportDateRange::Fixed { start, end } => serde_json::json!({
                "fixed": { "startDate": civil(start), "endDate": civil(end) }
            }),
            ReportDateRange::Relative(name) => serde_json::json!({ "relative": name }),
        };
        v.serialize(s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub report_type: ReportType,
    pub date_range: ReportDateRange,
}

impl ReportDefinition {
    pub fn new(report_type: ReportType, dims: &[&str], metrics: &[&str], date_range: ReportDateRange) -> Self {
        Self {
            dimensions: dims.iter().map(|s| s.to_string()).collect(),
            metrics: metrics.iter().map(|s| s.to_string()).collect(),
            report_type,
            date_range,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportValue {
    pub int_value: Option<Value>,
    pub double_value: Option<f64>,
    pub string_value: Option<String>,
}

impl ReportValue {
    pub fn as_i64(&self) -> Option<i64> {
        self.int_value
            .as_ref()
            .and_then(value_as_i64)
            .or_else(|| self.double_value.map(|d| d.round() as i64))
            .or_else(|| self.string_value.as_deref().and_then(|s| s.trim().parse().ok()))
    }

    pub fn as_text(&self) -> Option<String> {
        if let Some(s) = &self.string_value {
            return Some(s.clone());
        }
        self.int_value.as_ref().and_then(value_as_i64).map(|n| n.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricValueGroup {
    pub primary_values: Vec<ReportValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRow {
    pub dimension_values: Vec<ReportValue>,
    pub metric_value_groups: Vec<MetricValueGroup>,
}

impl ReportRow {
    pub fn dimension_text(&self, idx: usize) -> Option<String> {
        self.dimension_values.get(idx).and_then(ReportValue::as_text)
    }

    /// Primary metric value at `idx`, zero when absent.
    pub fn metric(&self, idx: usize) -> i64 {
        self.metric_value_groups
            .first()
            .and_then(|g| g.primary_values.get(idx))
            .and_then(ReportValue::as_i64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowPage {
    pub rows: Vec<ReportRow>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_come_from_field_or_name() {
        assert_eq!(entity_id(&Some(json!(42)), &None), Some("42".into()));
        assert_eq!(entity_id(&None, &Some("networks/1/orders/77".into())), Some("77".into()));
        assert_eq!(entity_id(&None, &None), None);
    }

    #[test]
    fn date_range_wire_shape() {
        let fixed = ReportDateRange::Fixed {
            start: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        };
        let v = serde_json::to_value(&fixed).unwrap();
        assert_eq!(v["fixed"]["startDate"], json!({"year": 2026, "month": 2, "day": 24}));
        let rel = serde_json::to_value(ReportDateRange::Relative("LAST_30_DAYS")).unwrap();
        assert_eq!(rel, json!({"relative": "LAST_30_DAYS"}));
    }

    #[test]
    fn report_row_values() {
        let row: ReportRow = serde_json::from_value(json!({
            "dimensionValues": [{"stringValue": "300 x 250"}],
            "metricValueGroups": [{"primaryValues": [{"intValue": "1200"}, {"doubleValue": 7.0}]}]
        }))
        .unwrap();
        assert_eq!(row.dimension_text(0).as_deref(), Some("300 x 250"));
        assert_eq!(row.metric(0), 1200);
        assert_eq!(row.metric(1), 7);
        assert_eq!(row.metric(2), 0);
    }

    #[test]
    fn list_query_is_encoded() {
        let q = ListRequest::new(50).filter("status = \"APPROVED\"").query();
        assert_eq!(q, "pageSize=50&filter=status%20%3D%20%22APPROVED%22");
    }
}

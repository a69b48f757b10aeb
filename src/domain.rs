// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket key for sources that cannot break inventory down by size.
pub const TOTAL_BUCKET: &str = "_total";
/// Placeholder for undefined ratios / unavailable values.
pub const PLACEHOLDER: &str = "-";
/// End-date sentinel for orders without an end.
pub const ONGOING: &str = "Ongoing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastCounts { pub available: i64, pub forecasted: i64, pub reserved: i64 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalCounts { pub impressions: i64 }

/// Per-size inventory metrics. The variant is fixed by whoever builds the map,
/// so a single map can never carry both shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "sizes", rename_all = "lowercase")]
pub enum SizeMetrics {
    Forecast(BTreeMap<String, ForecastCounts>),
    Historical(BTreeMap<String, HistoricalCounts>),
}

impl SizeMetrics {
    /// Single un-broken-down bucket (legacy traffic forecast).
    pub fn legacy_total(total: i64) -> Self {
        let mut m = BTreeMap::new();
        m.insert(
            TOTAL_BUCKET.to_string(),
            ForecastCounts { available: total, forecasted: total, reserved: 0 },
        );
        SizeMetrics::Forecast(m)
    }

    pub fn is_total_only(&self) -> bool {
        match self {
            SizeMetrics::Forecast(m) => m.len() == 1 && m.contains_key(TOTAL_BUCKET),
            SizeMetrics::Historical(m) => m.len() == 1 && m.contains_key(TOTAL_BUCKET),
        }
    }

    pub fn mode(&self) -> InventoryMode {
        match self {
            SizeMetrics::Forecast(_) => InventoryMode::Forecast,
            SizeMetrics::Historical(_) => InventoryMode::Historical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryMode { Forecast, Historical, Unavailable }

/// Which source produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastSource { FutureSellThrough, Historical, TrafficForecast }

impl ForecastSource {
    pub fn label(&self) -> &'static str {
        match self {
            ForecastSource::FutureSellThrough => "future_sell_through",
            ForecastSource::Historical => "historical",
            ForecastSource::TrafficForecast => "traffic_forecast",
        }
    }
}

/// Outcome of resolving inventory for a date window: either data or the
/// error that explains why no source produced any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub data: Option<SizeMetrics>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ForecastSource>,
    #[serde(skip)]
    pub unsupported: bool,
}

impl ForecastResult {
    pub fn ok(data: SizeMetrics, source: ForecastSource) -> Self {
        Self { data: Some(data), error: None, source: Some(source), unsupported: false }
    }
    pub fn failed(error: String, unsupported: bool) -> Self {
        Self { data: None, error: Some(error), source: None, unsupported }
    }
}

/// Display row for one preset, every value already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRow {
    pub available: String,
    pub forecasted: String,
    pub reserved: String,
    pub share_of_total_reserved_pct: String,
    pub impressions: String,
}

impl AggregatedRow {
    pub fn placeholder() -> Self {
        Self {
            available: PLACEHOLDER.into(),
            forecasted: PLACEHOLDER.into(),
            reserved: PLACEHOLDER.into(),
            share_of_total_reserved_pct: PLACEHOLDER.into(),
            impressions: PLACEHOLDER.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
    pub preset: String,
    pub label: String,
    pub sizes: String,
    #[serde(flatten)]
    pub values: AggregatedRow,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub rows: Vec<InventoryRow>,
    pub start_str: String,
    pub end_str: String,
    pub mode: InventoryMode,
    pub source: Option<ForecastSource>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMetrics { pub impressions: i64, pub clicks: i64 }

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub currency: String,
    pub advertiser_id: String,
    pub line_item_count: Option<u64>,
    pub impressions: i64,
    pub clicks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    pub id: String,
    pub name: String,
    pub order_id: String,
    pub status: String,
    pub line_item_type: String,
    pub start_date: String,
    pub end_date: String,
    pub goal_units: Option<i64>,
    pub goal_unit_type: String,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: String,
    pub progress: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord { pub network_code: String, pub display_name: String, pub property_code: String }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeRecord { pub id: String, pub name: String, pub advertiser_id: String }

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo { pub display_name: String, pub email: String, pub id: String, pub role_name: String }

// ===============================
// src/forecast.rs (inventory source resolver)
// ===============================
//
// Sources, in priority order:
//   future window : FUTURE_SELL_THROUGH report -> legacy getTrafficData
//   past/present  : HISTORICAL report -> (FUTURE_SELL_THROUGH report -> getTrafficData)
// The first success wins; otherwise one error is surfaced according to
// `ErrorPrecedence`.
//
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, TryStreamExt};
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::client::{AdManagerApi, ApiError};
use crate::domain::{ForecastCounts, ForecastResult, ForecastSource, HistoricalCounts, SizeMetrics, TOTAL_BUCKET};
use crate::gam::{resource_id, ListRequest, ReportDateRange, ReportDefinition, ReportType, Resource, WireAdUnit};
use crate::inventory::normalize_size_token;
use crate::metrics::FORECAST_ATTEMPTS;
use crate::pager;

pub const FUTURE_UNAVAILABLE: &str = "future forecasting unavailable";
pub const TRAILING_RANGE: &str = "LAST_30_DAYS";

const SELL_THROUGH_SIZE_DIM: &str = "REQUESTED_AD_SIZES";
const SELL_THROUGH_METRICS: [&str; 3] = [
    "SELL_THROUGH_AVAILABLE_IMPRESSIONS",
    "SELL_THROUGH_FORECASTED_IMPRESSIONS",
    "SELL_THROUGH_RESERVED_IMPRESSIONS",
];
const HISTORICAL_SIZE_DIM: &str = "CREATIVE_SIZE";
const HISTORICAL_METRICS: [&str; 1] = ["AD_SERVER_IMPRESSIONS"];

/// Which message survives when several sources fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPrecedence {
    /// First non-empty message (root cause first).
    #[default]
    Earliest,
    /// Last non-empty message.
    Latest,
}

impl FromStr for ErrorPrecedence {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" | "first" => Ok(ErrorPrecedence::Earliest),
            "latest" | "last" => Ok(ErrorPrecedence::Latest),
            other => Err(format!("unknown error precedence '{other}' (earliest|latest)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub unsupported: bool,
}

impl From<ApiError> for Failure {
    fn from(e: ApiError) -> Self {
        Failure { unsupported: e.is_unsupported(), message: e.to_string() }
    }
}

impl Failure {
    fn or_message(mut self, fallback: &str) -> Self {
        if self.message.trim().is_empty() {
            self.message = fallback.to_string();
        }
        self
    }
}

impl ErrorPrecedence {
    fn pick(self, earlier: Failure, later: Failure) -> Failure {
        let (preferred, other) = match self {
            ErrorPrecedence::Earliest => (earlier, later),
            ErrorPrecedence::Latest => (later, earlier),
        };
        if preferred.message.trim().is_empty() { other } else { preferred }
    }
}

pub type Resolved = (ForecastSource, SizeMetrics);
pub type Attempt<'a, T> = BoxFuture<'a, Result<T, Failure>>;

/// Await attempts in order; first success wins, otherwise the failure chosen
/// by `precedence`. Attempts after a success are never polled.
pub async fn first_success<T>(attempts: Vec<Attempt<'_, T>>, precedence: ErrorPrecedence) -> Result<T, Failure> {
    let mut chosen: Option<Failure> = None;
    for attempt in attempts {
        match attempt.await {
            Ok(v) => return Ok(v),
            Err(f) => {
                chosen = Some(match chosen {
                    None => f,
                    Some(prev) => precedence.pick(prev, f),
                })
            }
        }
    }
    Err(chosen.unwrap_or(Failure { message: "no inventory source available".into(), unsupported: false }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Dates came from the user rather than defaults.
    pub explicit: bool,
}

fn track<T>(source: ForecastSource, r: Result<T, ApiError>) -> Result<T, ApiError> {
    let outcome = if r.is_ok() { "ok" } else { "error" };
    FORECAST_ATTEMPTS.with_label_values(&[source.label(), outcome]).inc();
    match &r {
        Ok(_) => debug!(source = source.label(), "inventory source succeeded"),
        Err(e) => warn!(source = source.label(), error = %e, "inventory source failed"),
    }
    r
}

pub struct ForecastResolver<'a> {
    api: &'a dyn AdManagerApi,
    precedence: ErrorPrecedence,
    root_ad_unit: OnceCell<String>,
}

impl<'a> ForecastResolver<'a> {
    pub fn new(api: &'a dyn AdManagerApi, precedence: ErrorPrecedence) -> Self {
        Self { api, precedence, root_ad_unit: OnceCell::new() }
    }

    /// Root ad unit already known from an earlier listing.
    pub fn with_root_ad_unit(self, id: Option<String>) -> Self {
        if let Some(id) = id {
            let _ = self.root_ad_unit.set(id);
        }
        self
    }

    pub async fn resolve(&self, window: &DateWindow, today: NaiveDate) -> ForecastResult {
        let outcome = if window.start > today {
            info!(start = %window.start, end = %window.end, "resolving future inventory");
            self.future_chain(window.start, window.end)
                .await
                .map_err(|f| f.or_message(FUTURE_UNAVAILABLE))
        } else {
            let range = if window.explicit {
                ReportDateRange::Fixed { start: window.start, end: window.end }
            } else {
                ReportDateRange::Relative(TRAILING_RANGE)
            };
            info!(start = %window.start, end = %window.end, ?range, "resolving historical inventory");
            let historical: Attempt<'_, Resolved> = async move {
                let m = track(ForecastSource::Historical, self.historical(range).await)?;
                Ok::<Resolved, Failure>((ForecastSource::Historical, m))
            }
            .boxed();
            // beberapa network hanya punya FUTURE_SELL_THROUGH
            let fallback = self.future_chain(window.start, window.end).boxed();
            first_success(vec![historical, fallback], self.precedence).await
        };
        match outcome {
            Ok((source, data)) => ForecastResult::ok(data, source),
            Err(f) => ForecastResult::failed(f.message, f.unsupported),
        }
    }

    /// Structured sell-through report, then the legacy traffic call.
    async fn future_chain(&self, start: NaiveDate, end: NaiveDate) -> Result<Resolved, Failure> {
        let report: Attempt<'_, Resolved> = async move {
            let m = track(ForecastSource::FutureSellThrough, self.future_sell_through(start, end).await)?;
            Ok::<Resolved, Failure>((ForecastSource::FutureSellThrough, m))
        }
        .boxed();
        let legacy: Attempt<'_, Resolved> = async move {
            let m = track(ForecastSource::TrafficForecast, self.legacy_traffic(start, end).await)?;
            Ok::<Resolved, Failure>((ForecastSource::TrafficForecast, m))
        }
        .boxed();
        first_success(vec![report, legacy], self.precedence).await
    }

    async fn future_sell_through(&self, start: NaiveDate, end: NaiveDate) -> Result<SizeMetrics, ApiError> {
        let def = ReportDefinition::new(
            ReportType::FutureSellThrough,
            &[SELL_THROUGH_SIZE_DIM],
            &SELL_THROUGH_METRICS,
            ReportDateRange::Fixed { start, end },
        );
        let result = self.api.start_report(&def).await?;
        let map = pager::report_rows(self.api, result)
            .try_fold(BTreeMap::<String, ForecastCounts>::new(), |mut m, row| async move {
                let key = row
                    .dimension_text(0)
                    .map(|t| normalize_size_token(&t))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| TOTAL_BUCKET.to_string());
                let e = m.entry(key).or_default();
                e.available += row.metric(0);
                e.forecasted += row.metric(1);
                e.reserved += row.metric(2);
                Ok(m)
            })
            .await?;
        if map.is_empty() {
            return Err(ApiError::Empty("future sell-through report returned no rows".into()));
        }
        Ok(SizeMetrics::Forecast(map))
    }

    async fn historical(&self, range: ReportDateRange) -> Result<SizeMetrics, ApiError> {
        let def = ReportDefinition::new(ReportType::Historical, &[HISTORICAL_SIZE_DIM], &HISTORICAL_METRICS, range);
        let result = self.api.start_report(&def).await?;
        let map = pager::report_rows(self.api, result)
            .try_fold(BTreeMap::<String, HistoricalCounts>::new(), |mut m, row| async move {
                let key = row
                    .dimension_text(0)
                    .map(|t| normalize_size_token(&t))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| TOTAL_BUCKET.to_string());
                m.entry(key).or_default().impressions += row.metric(0);
                Ok(m)
            })
            .await?;
        if map.is_empty() {
            return Err(ApiError::Empty("historical report returned no rows".into()));
        }
        Ok(SizeMetrics::Historical(map))
    }

    async fn legacy_traffic(&self, start: NaiveDate, end: NaiveDate) -> Result<SizeMetrics, ApiError> {
        let root = self.root_ad_unit_id().await?;
        let values = self.api.traffic_forecast(&root, start, end).await?;
        if values.is_empty() {
            return Err(ApiError::Empty("no forecasted traffic returned".into()));
        }
        Ok(SizeMetrics::legacy_total(values.iter().sum()))
    }

    async fn root_ad_unit_id(&self) -> Result<String, ApiError> {
        self.root_ad_unit
            .get_or_try_init(|| async {
                let network = self.api.current_network().await?;
                if let Some(root) = network.effective_root_ad_unit.as_deref().filter(|s| !s.is_empty()) {
                    return Ok::<String, ApiError>(resource_id(root).to_string());
                }
                // tanpa effectiveRootAdUnit: cari ad unit tanpa parent
                let units: Vec<WireAdUnit> =
                    pager::collect_limited(pager::items(self.api, Resource::AdUnits, ListRequest::new(100)), 500).await?;
                units
                    .into_iter()
                    .find(|u| u.parent_ad_unit.as_deref().map_or(true, str::is_empty))
                    .and_then(|u| crate::gam::entity_id(&u.ad_unit_id, &u.name))
                    .ok_or_else(|| ApiError::Empty("root ad unit not found".into()))
            })
            .await
            .cloned()
    }
}

// ===============================
// src/joiner.rs (delivery metrics join)
// ===============================
use ahash::AHashMap;
use futures_util::TryStreamExt;
use tracing::debug;

use crate::client::{AdManagerApi, ApiError};
use crate::domain::{DeliveryMetrics, LineItemRecord, OrderRecord, PLACEHOLDER};
use crate::gam::{ReportDateRange, ReportDefinition, ReportType};
use crate::normalize::format_percent;
use crate::pager;

pub type MetricsById = AHashMap<String, DeliveryMetrics>;

pub const ORDER_DIM: &str = "ORDER_ID";
pub const LINE_ITEM_DIM: &str = "LINE_ITEM_ID";
const DELIVERY_METRICS: [&str; 2] = ["AD_SERVER_IMPRESSIONS", "AD_SERVER_CLICKS"];
const METRICS_RANGE: &str = "LAST_90_DAYS";

/// Impressions/clicks per id over the trailing 90 days.
pub async fn fetch_metrics(api: &dyn AdManagerApi, dimension: &str) -> Result<MetricsById, ApiError> {
    let def = ReportDefinition::new(
        ReportType::Historical,
        &[dimension],
        &DELIVERY_METRICS,
        ReportDateRange::Relative(METRICS_RANGE),
    );
    let result = api.start_report(&def).await?;
    pager::report_rows(api, result)
        .try_fold(MetricsById::new(), |mut m, row| async move {
            if let Some(id) = row.dimension_text(0).filter(|s| !s.is_empty()) {
                let e = m.entry(id).or_default();
                e.impressions += row.metric(0);
                e.clicks += row.metric(1);
            }
            Ok(m)
        })
        .await
}

/// Same as [`fetch_metrics`], but a failure degrades to an empty map.
pub async fn metrics_or_empty(api: &dyn AdManagerApi, dimension: &str, ids: &[String]) -> MetricsById {
    if ids.is_empty() {
        return MetricsById::new();
    }
    match fetch_metrics(api, dimension).await {
        Ok(m) => m,
        Err(e) => {
            debug!(dimension, error = %e, "metrics report failed; showing zeros");
            MetricsById::new()
        }
    }
}

fn lookup(metrics: &MetricsById, id: &str) -> DeliveryMetrics {
    metrics.get(id).copied().unwrap_or_default()
}

pub fn join_orders(orders: &mut [OrderRecord], metrics: &MetricsById) {
    for o in orders.iter_mut() {
        let m = lookup(metrics, &o.id);
        o.impressions = m.impressions;
        o.clicks = m.clicks;
    }
}

pub fn join_line_items(items: &mut [LineItemRecord], metrics: &MetricsById) {
    for li in items.iter_mut() {
        let m = lookup(metrics, &li.id);
        li.impressions = m.impressions;
        li.clicks = m.clicks;
        li.ctr = ctr(m);
        li.progress = progress(m, li.goal_units, &li.goal_unit_type);
    }
}

pub fn ctr(m: DeliveryMetrics) -> String {
    format_percent(m.clicks, m.impressions, 2)
}

pub fn progress(m: DeliveryMetrics, goal_units: Option<i64>, goal_unit_type: &str) -> String {
    match goal_units {
        Some(goal) if goal > 0 => {
            let delivered = if goal_unit_type.to_ascii_uppercase().contains("CLICKS") { m.clicks } else { m.impressions };
            format_percent(delivered, goal, 1)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use serde_json::json;

    fn item(id: &str, goal_units: Option<i64>, unit: &str) -> LineItemRecord {
        LineItemRecord {
            id: id.into(),
            name: "li".into(),
            order_id: "1".into(),
            status: "READY".into(),
            line_item_type: "STANDARD".into(),
            start_date: "2026-02-01".into(),
            end_date: "2026-03-01".into(),
            goal_units,
            goal_unit_type: unit.into(),
            impressions: 0,
            clicks: 0,
            ctr: PLACEHOLDER.into(),
            progress: PLACEHOLDER.into(),
        }
    }

    #[test]
    fn ctr_and_progress_formatting() {
        let m = DeliveryMetrics { impressions: 200, clicks: 10 };
        assert_eq!(ctr(m), "5.00%");
        assert_eq!(progress(m, Some(1000), "CLICKS"), "1.0%");
        assert_eq!(progress(m, Some(1000), "IMPRESSIONS"), "20.0%");
        assert_eq!(progress(m, None, "CLICKS"), "-");
        assert_eq!(progress(m, Some(0), "CLICKS"), "-");
        assert_eq!(ctr(DeliveryMetrics::default()), "-");
    }

    #[test]
    fn absent_ids_default_to_zero() {
        let mut metrics = MetricsById::new();
        metrics.insert("7".into(), DeliveryMetrics { impressions: 200, clicks: 10 });
        let mut items = vec![item("7", Some(1000), "CLICKS"), item("8", Some(1000), "IMPRESSIONS")];
        join_line_items(&mut items, &metrics);
        assert_eq!((items[0].impressions, items[0].ctr.as_str(), items[0].progress.as_str()), (200, "5.00%", "1.0%"));
        assert_eq!((items[1].impressions, items[1].clicks), (0, 0));
        assert_eq!(items[1].ctr, "-");
        assert_eq!(items[1].progress, "0.0%");
    }

    #[tokio::test]
    async fn report_rows_are_summed_per_id() {
        let row = |id: &str, imp: i64, clk: i64| {
            json!({
                "dimensionValues": [{"intValue": id}],
                "metricValueGroups": [{"primaryValues": [{"intValue": imp.to_string()}, {"intValue": clk.to_string()}]}]
            })
        };
        let api = FakeApi::default().with_report(
            ReportType::Historical,
            ORDER_DIM,
            Ok(vec![row("11", 100, 1), row("11", 50, 2), row("12", 5, 0)]),
        );
        let m = fetch_metrics(&api, ORDER_DIM).await.unwrap();
        assert_eq!(m["11"], DeliveryMetrics { impressions: 150, clicks: 3 });
        assert_eq!(m["12"].impressions, 5);
        assert_eq!(api.started_reports()[0].date_range, ReportDateRange::Relative("LAST_90_DAYS"));
    }

    #[tokio::test]
    async fn failures_degrade_to_empty() {
        let api = FakeApi::default().with_report(ReportType::Historical, LINE_ITEM_DIM, Err("PERMISSION_DENIED"));
        assert!(metrics_or_empty(&api, LINE_ITEM_DIM, &["1".to_string()]).await.is_empty());
        assert!(metrics_or_empty(&api, LINE_ITEM_DIM, &[]).await.is_empty());
        assert_eq!(api.started_reports().len(), 1);
    }
}

// ===============================
// src/inventory.rs (presets + per-preset aggregation)
// ===============================
use once_cell::sync::Lazy;

use crate::domain::{AggregatedRow, ForecastCounts, HistoricalCounts, SizeMetrics, PLACEHOLDER};
use crate::normalize::format_thousands;

pub type SizeFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct InventoryPreset {
    pub key: &'static str,
    pub label: &'static str,
    pub sizes: &'static [&'static str],
    /// `None` matches every size token.
    pub size_filter: Option<SizeFilter>,
}

impl InventoryPreset {
    pub fn includes(&self, token: &str) -> bool {
        self.size_filter.as_ref().map_or(true, |f| f(token))
    }

    pub fn sizes_label(&self) -> String {
        if self.sizes.is_empty() { "All".to_string() } else { self.sizes.join(", ") }
    }
}

fn only_sizes(sizes: &'static [&'static str]) -> SizeFilter {
    Box::new(move |token| sizes.contains(&token))
}

const DESKTOP_SIZES: &[&str] = &["970x250", "300x250", "300x600", "728x90"];
const MOBILE_SIZES: &[&str] = &["320x50", "320x100", "300x50", "320x480", "300x250", "728x90"];

pub static PRESETS: Lazy<Vec<InventoryPreset>> = Lazy::new(|| {
    vec![
        InventoryPreset {
            key: "run-of-site",
            label: "Run of site (all sites)",
            sizes: &[],
            size_filter: None,
        },
        InventoryPreset {
            key: "desktop",
            label: "Desktop banners",
            sizes: DESKTOP_SIZES,
            size_filter: Some(only_sizes(DESKTOP_SIZES)),
        },
        InventoryPreset {
            key: "mobile",
            label: "Mobile banners",
            sizes: MOBILE_SIZES,
            size_filter: Some(only_sizes(MOBILE_SIZES)),
        },
    ]
});

/// Requested preset, or every preset when the key is missing / unknown.
pub fn select_presets(key: Option<&str>) -> Vec<&'static InventoryPreset> {
    match key.and_then(|k| PRESETS.iter().find(|p| p.key.eq_ignore_ascii_case(k.trim()))) {
        Some(p) => vec![p],
        None => PRESETS.iter().collect(),
    }
}

/// Size tokens come back as "300 x 250" and friends.
pub fn normalize_size_token(token: &str) -> String {
    token.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase()
}

fn forecast_row(c: ForecastCounts) -> AggregatedRow {
    let share = if c.forecasted > 0 {
        format!("{:.1}%", c.reserved as f64 / c.forecasted as f64 * 100.0)
    } else {
        PLACEHOLDER.to_string()
    };
    AggregatedRow {
        available: format_thousands(c.available),
        forecasted: format_thousands(c.forecasted),
        reserved: format_thousands(c.reserved),
        share_of_total_reserved_pct: share,
        impressions: PLACEHOLDER.to_string(),
    }
}

fn historical_row(c: HistoricalCounts) -> AggregatedRow {
    AggregatedRow { impressions: format_thousands(c.impressions), ..AggregatedRow::placeholder() }
}

/// Fold a size map into one preset's totals. A map holding only the total
/// bucket is used verbatim since it has no size breakdown to filter.
pub fn aggregate(metrics: &SizeMetrics, preset: &InventoryPreset) -> AggregatedRow {
    match metrics {
        SizeMetrics::Forecast(map) => {
            if metrics.is_total_only() {
                return forecast_row(map.values().copied().next().unwrap_or_default());
            }
            let mut sum = ForecastCounts::default();
            for (token, c) in map {
                if preset.includes(&normalize_size_token(token)) {
                    sum.available += c.available;
                    sum.forecasted += c.forecasted;
                    sum.reserved += c.reserved;
                }
            }
            forecast_row(sum)
        }
        SizeMetrics::Historical(map) => {
            if metrics.is_total_only() {
                return historical_row(map.values().copied().next().unwrap_or_default());
            }
            let impressions = map
                .iter()
                .filter(|(token, _)| preset.includes(&normalize_size_token(token)))
                .map(|(_, c)| c.impressions)
                .sum();
            historical_row(HistoricalCounts { impressions })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TOTAL_BUCKET;
    use std::collections::BTreeMap;

    fn fc(available: i64, forecasted: i64, reserved: i64) -> ForecastCounts {
        ForecastCounts { available, forecasted, reserved }
    }

    fn forecast_map() -> SizeMetrics {
        let mut m = BTreeMap::new();
        m.insert("300 x 250".to_string(), fc(600, 1000, 400));
        m.insert("728x90".to_string(), fc(50, 100, 50));
        m.insert("320x50".to_string(), fc(200, 200, 0));
        m.insert("160x600".to_string(), fc(10, 10, 0));
        SizeMetrics::Forecast(m)
    }

    fn preset(key: &str) -> &'static InventoryPreset {
        PRESETS.iter().find(|p| p.key == key).unwrap()
    }

    #[test]
    fn total_bucket_ignores_filters() {
        let m = SizeMetrics::legacy_total(12_345);
        for p in PRESETS.iter() {
            let row = aggregate(&m, p);
            assert_eq!(row.forecasted, "12,345");
            assert_eq!(row.available, "12,345");
            assert_eq!(row.reserved, "0");
            assert_eq!(row.share_of_total_reserved_pct, "0.0%");
        }
    }

    #[test]
    fn historical_total_bucket_ignores_filters() {
        let mut m = BTreeMap::new();
        m.insert(TOTAL_BUCKET.to_string(), HistoricalCounts { impressions: 5000 });
        let m = SizeMetrics::Historical(m);
        let row = aggregate(&m, preset("mobile"));
        assert_eq!(row.impressions, "5,000");
        assert_eq!(row.forecasted, "-");
    }

    #[test]
    fn desktop_sums_matching_sizes() {
        let row = aggregate(&forecast_map(), preset("desktop"));
        assert_eq!(row.available, "650");
        assert_eq!(row.forecasted, "1,100");
        assert_eq!(row.reserved, "450");
        assert_eq!(row.share_of_total_reserved_pct, "40.9%");
        assert_eq!(row.impressions, "-");
    }

    #[test]
    fn disjoint_filters_partition_the_total() {
        let m = forecast_map();
        let small = InventoryPreset {
            key: "a",
            label: "a",
            sizes: &[],
            size_filter: Some(Box::new(|t: &str| t.starts_with('3'))),
        };
        let rest = InventoryPreset {
            key: "b",
            label: "b",
            sizes: &[],
            size_filter: Some(Box::new(|t: &str| !t.starts_with('3'))),
        };
        let parse = |s: String| s.replace(',', "").parse::<i64>().unwrap();
        let total = parse(aggregate(&m, &small).forecasted) + parse(aggregate(&m, &rest).forecasted);
        assert_eq!(total, 1310);
        assert_eq!(parse(aggregate(&m, preset("run-of-site")).forecasted), 1310);
    }

    #[test]
    fn share_is_placeholder_only_without_forecast() {
        let mut m = BTreeMap::new();
        m.insert("970x250".to_string(), fc(0, 0, 0));
        let row = aggregate(&SizeMetrics::Forecast(m), preset("desktop"));
        assert_eq!(row.share_of_total_reserved_pct, "-");
        let row = aggregate(&forecast_map(), preset("mobile"));
        assert_ne!(row.share_of_total_reserved_pct, "-");
    }

    #[test]
    fn aggregation_is_repeatable() {
        let m = forecast_map();
        assert_eq!(aggregate(&m, preset("mobile")), aggregate(&m, preset("mobile")));
    }

    #[test]
    fn unknown_preset_selects_all() {
        assert_eq!(select_presets(Some("tablet")).len(), 3);
        assert_eq!(select_presets(None).len(), 3);
        assert_eq!(select_presets(Some("Desktop"))[0].key, "desktop");
    }
}

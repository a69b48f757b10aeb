// ===============================
// src/render.rs (tables / JSON)
// ===============================
use serde::Serialize;

use crate::domain::{
    CreativeRecord, InventoryMode, InventoryReport, LineItemRecord, NetworkRecord, OrderRecord, UserInfo, PLACEHOLDER,
};
use crate::normalize::{format_thousands, truncate_chars};

pub const CELL_WIDTH: usize = 50;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn table_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = *w))
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Left-aligned columns, two-space gutter, dashed underline.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| truncate_chars(c, CELL_WIDTH)).collect())
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&table_line(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + widths.len() * 2));
    out.push('\n');
    for r in &cells {
        out.push_str(&table_line(r.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn section(title: &str, body: &str) -> String {
    format!("\n=== {title} ===\n\n{body}")
}

fn count_or_placeholder(n: Option<u64>) -> String {
    n.map(|n| n.to_string()).unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn user(u: &UserInfo) -> String {
    section(
        "GAM Connection Info",
        &format!("User: {}\nEmail: {}\nUser ID: {}\nRole: {}\n", u.display_name, u.email, u.id, u.role_name),
    )
}

pub fn orders(orders: &[OrderRecord]) -> String {
    let title = format!("Orders (showing {})", orders.len());
    if orders.is_empty() {
        return section(&title, "No orders found.\n");
    }
    let rows: Vec<Vec<String>> = orders
        .iter()
        .map(|o| {
            vec![
                o.id.clone(),
                o.name.clone(),
                o.status.clone(),
                o.start_date.clone(),
                o.end_date.clone(),
                count_or_placeholder(o.line_item_count),
                format_thousands(o.impressions),
                format_thousands(o.clicks),
                o.currency.clone(),
                o.advertiser_id.clone(),
            ]
        })
        .collect();
    let headers = ["ID", "Name", "Status", "Start", "End", "Line Items", "Impressions", "Clicks", "Currency", "Advertiser"];
    section(&title, &format_table(&headers, &rows))
}

pub fn line_items(items: &[LineItemRecord]) -> String {
    let title = format!("Line Items (showing {})", items.len());
    if items.is_empty() {
        return section(&title, "No line items found.\n");
    }
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|li| {
            vec![
                li.id.clone(),
                li.name.clone(),
                li.order_id.clone(),
                li.status.clone(),
                li.line_item_type.clone(),
                li.start_date.clone(),
                li.end_date.clone(),
                format_thousands(li.impressions),
                format_thousands(li.clicks),
                li.ctr.clone(),
                li.progress.clone(),
            ]
        })
        .collect();
    let headers = ["ID", "Name", "Order ID", "Status", "Type", "Start", "End", "Impressions", "Clicks", "CTR", "Progress"];
    section(&title, &format_table(&headers, &rows))
}

pub fn inventory(inv: &InventoryReport, quiet: bool) -> String {
    let range = format!("{} to {}", inv.start_str, inv.end_str);
    let title = match inv.mode {
        InventoryMode::Historical => format!("Inventory Delivered ({range})"),
        _ => format!("Inventory Forecast ({range})"),
    };
    let mut body = if inv.rows.is_empty() {
        "No inventory data.\n".to_string()
    } else if inv.mode == InventoryMode::Historical {
        let rows: Vec<Vec<String>> = inv
            .rows
            .iter()
            .map(|r| vec![r.preset.clone(), r.sizes.clone(), r.values.impressions.clone()])
            .collect();
        format_table(&["Preset", "Sizes", "Impressions"], &rows)
    } else {
        let rows: Vec<Vec<String>> = inv
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.preset.clone(),
                    r.sizes.clone(),
                    r.values.available.clone(),
                    r.values.forecasted.clone(),
                    r.values.reserved.clone(),
                    r.values.share_of_total_reserved_pct.clone(),
                ]
            })
            .collect();
        format_table(&["Preset", "Sizes", "Available", "Forecasted", "Reserved", "STR%"], &rows)
    };
    if !quiet {
        if let Some(source) = inv.source {
            body.push_str(&format!("\nSource: {}\n", source.label()));
        }
        if let Some(err) = &inv.error {
            body.push_str(&format!("\nForecast unavailable: {err}\n"));
        }
        if let Some(hint) = &inv.hint {
            body.push_str(&format!("Hint: {hint}\n"));
        }
    }
    section(&title, &body)
}

pub fn networks(networks: &[NetworkRecord]) -> String {
    if networks.is_empty() {
        return section("Available Networks", "No networks found.\n");
    }
    let body: String = networks
        .iter()
        .map(|n| {
            format!(
                "Network Code: {}\nDisplay Name: {}\nProperty Code: {}\n\n",
                n.network_code, n.display_name, n.property_code
            )
        })
        .collect();
    section("Available Networks", &body)
}

pub fn creatives(creatives: &[CreativeRecord]) -> String {
    let title = format!("Creatives (showing {})", creatives.len());
    if creatives.is_empty() {
        return section(&title, "No creatives found.\n");
    }
    let rows: Vec<Vec<String>> = creatives
        .iter()
        .map(|c| vec![c.id.clone(), c.name.clone(), c.advertiser_id.clone()])
        .collect();
    section(&title, &format_table(&["ID", "Name", "Advertiser ID"], &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AggregatedRow, ForecastSource, InventoryRow};

    #[test]
    fn table_pads_and_truncates() {
        let long = "y".repeat(80);
        let out = format_table(&["ID", "Name"], &[vec!["1".into(), "short".into()], vec!["22".into(), long]]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID  Name");
        assert_eq!(lines[1], "-".repeat(2 + CELL_WIDTH + 4));
        assert_eq!(lines[2], "1   short");
        assert_eq!(lines[3].chars().count(), 2 + 2 + CELL_WIDTH);
    }

    #[test]
    fn empty_listing_message() {
        assert!(orders(&[]).contains("No orders found."));
        assert!(creatives(&[]).contains("No creatives found."));
    }

    fn report(error: Option<&str>) -> InventoryReport {
        InventoryReport {
            rows: vec![InventoryRow {
                preset: "desktop".into(),
                label: "Desktop banners".into(),
                sizes: "970x250, 300x250".into(),
                values: AggregatedRow::placeholder(),
            }],
            start_str: "2026-02-25".into(),
            end_str: "2026-03-04".into(),
            mode: InventoryMode::Unavailable,
            source: None,
            error: error.map(str::to_string),
            hint: Some("upgrade".into()),
        }
    }

    #[test]
    fn inventory_error_hidden_when_quiet() {
        let loud = inventory(&report(Some("HTTP 403")), false);
        assert!(loud.contains("2026-02-25 to 2026-03-04"));
        assert!(loud.contains("Forecast unavailable: HTTP 403"));
        assert!(loud.contains("Hint: upgrade"));
        let quiet = inventory(&report(Some("HTTP 403")), true);
        assert!(!quiet.contains("HTTP 403"));
        assert!(quiet.contains("STR%"));
    }

    #[test]
    fn inventory_json_shape() {
        let mut r = report(None);
        r.mode = InventoryMode::Forecast;
        r.source = Some(ForecastSource::FutureSellThrough);
        let v: serde_json::Value = serde_json::from_str(&to_json(&r).unwrap()).unwrap();
        assert_eq!(v["startStr"], "2026-02-25");
        assert_eq!(v["mode"], "forecast");
        assert_eq!(v["source"], "FUTURE_SELL_THROUGH");
        assert_eq!(v["rows"][0]["shareOfTotalReservedPct"], "-");
        assert!(v["error"].is_null());
    }
}

// ===============================
// src/service.rs (command operations)
// ===============================
use chrono::{Duration, NaiveDate};
use futures_util::future::join_all;
use futures_util::TryStreamExt;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{AdManagerApi, ApiError};
use crate::delivery::{classify, DeliveryWindow, StatusFilter};
use crate::domain::{
    AggregatedRow, CreativeRecord, InventoryMode, InventoryReport, InventoryRow, LineItemRecord, NetworkRecord,
    OrderRecord, UserInfo, ONGOING, PLACEHOLDER,
};
use crate::forecast::{DateWindow, ErrorPrecedence, ForecastResolver};
use crate::gam::{
    entity_id, flag_is_true, resource_id, value_as_i64, ListRequest, Resource, WireCreative, WireLineItem,
    WireNetwork, WireOrder, LINE_ITEM_STATUS_CODES, ORDER_STATUS_CODES,
};
use crate::inventory::{aggregate, select_presets};
use crate::joiner::{join_line_items, join_orders, metrics_or_empty, LINE_ITEM_DIM, ORDER_DIM};
use crate::normalize::{format_date, normalize_status, parse_timestamp, truncate_chars, EpochMillis};
use crate::pager;

pub const NAME_WIDTH: usize = 40;
const MAX_PAGE_SIZE: usize = 500;
const DEFAULT_GOAL_UNIT: &str = "IMPRESSIONS";
const DEFAULT_WINDOW_DAYS: i64 = 30;

pub const AD_MANAGER_360_HINT: &str =
    "This network cannot run forecasting reports. Inventory forecasts require Google Ad Manager 360 \
     (or the sell-through report enabled for the network).";

fn page_size(limit: usize) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE) as u32
}

fn display_name(display: &Option<String>, name: &Option<String>) -> String {
    let n = display
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(name.as_deref())
        .unwrap_or_default();
    truncate_chars(n, NAME_WIDTH)
}

fn text_or_placeholder(v: Option<&str>) -> String {
    v.filter(|s| !s.is_empty()).unwrap_or(PLACEHOLDER).to_string()
}

fn end_date(end_ms: Option<EpochMillis>, unlimited: bool) -> String {
    match end_ms {
        Some(ms) if !unlimited => format_date(Some(ms)),
        _ => ONGOING.to_string(),
    }
}

pub struct GamService {
    api: Arc<dyn AdManagerApi>,
    network_code: String,
    precedence: ErrorPrecedence,
    // diisi oleh networks(); dipakai lagi oleh jalur SOAP forecast
    known_root_ad_unit: OnceCell<String>,
}

impl GamService {
    pub fn new(api: Arc<dyn AdManagerApi>, network_code: impl Into<String>, precedence: ErrorPrecedence) -> Self {
        Self { api, network_code: network_code.into(), precedence, known_root_ad_unit: OnceCell::new() }
    }

    fn api(&self) -> &dyn AdManagerApi {
        self.api.as_ref()
    }

    fn order_filter(&self, order_id: &str) -> String {
        format!("order = \"networks/{}/orders/{}\"", self.network_code, order_id)
    }

    pub async fn user(&self) -> Result<UserInfo, ApiError> {
        self.api().current_user().await
    }

    pub async fn orders(&self, limit: usize, status: Option<&str>, now_ms: EpochMillis) -> Result<Vec<OrderRecord>, ApiError> {
        let filter = StatusFilter::parse(status);
        let scan = filter.scan_limit(limit);
        let mut req = ListRequest::new(page_size(scan)).order_by("orderId desc");
        if let Some(expr) = filter.filter_expr() {
            req = req.filter(expr);
        }
        info!(limit, scan, status = ?filter.server_status, delivering = filter.delivering, "listing orders");

        let wire: Vec<WireOrder> = pager::collect_limited(pager::items(self.api(), Resource::Orders, req), scan).await?;
        let mut orders: Vec<OrderRecord> = wire
            .iter()
            .filter_map(|o| self.order_record(o, &filter, now_ms))
            .take(limit)
            .collect();

        let ids: Vec<String> = orders.iter().map(|o| o.id.clone()).filter(|id| id != PLACEHOLDER).collect();
        let counts = join_all(orders.iter().map(|o| self.line_item_count(&o.id)));
        let (counts, metrics) = tokio::join!(counts, metrics_or_empty(self.api(), ORDER_DIM, &ids));

        for (o, count) in orders.iter_mut().zip(counts) {
            o.line_item_count = count;
        }
        join_orders(&mut orders, &metrics);
        Ok(orders)
    }

    fn order_record(&self, o: &WireOrder, filter: &StatusFilter, now_ms: EpochMillis) -> Option<OrderRecord> {
        let window = DeliveryWindow::from_order(o);
        let status = classify(&o.status, &ORDER_STATUS_CODES, &window, now_ms, filter.delivering)?;
        Some(OrderRecord {
            id: entity_id(&o.order_id, &o.name).unwrap_or_else(|| PLACEHOLDER.to_string()),
            name: display_name(&o.display_name, &o.name),
            status,
            start_date: format_date(window.start_ms),
            end_date: end_date(window.end_ms, window.unlimited_end),
            currency: text_or_placeholder(o.currency_code.as_deref()),
            advertiser_id: text_or_placeholder(o.advertiser.as_deref().map(resource_id)),
            line_item_count: None,
            impressions: 0,
            clicks: 0,
        })
    }

    /// Number of line items under an order; `None` when the listing fails.
    async fn line_item_count(&self, order_id: &str) -> Option<u64> {
        if order_id == PLACEHOLDER {
            return None;
        }
        let req = ListRequest::new(MAX_PAGE_SIZE as u32).filter(self.order_filter(order_id));
        let counted = pager::items::<Value>(self.api(), Resource::LineItems, req)
            .try_fold(0u64, |n, _| async move { Ok(n + 1) })
            .await;
        match counted {
            Ok(n) => Some(n),
            Err(e) => {
                debug!(order_id, error = %e, "line item count failed");
                None
            }
        }
    }

    pub async fn line_items(&self, order_id: Option<u64>, limit: usize) -> Result<Vec<LineItemRecord>, ApiError> {
        let mut req = ListRequest::new(page_size(limit)).order_by("lineItemId desc");
        if let Some(id) = order_id {
            req = req.filter(self.order_filter(&id.to_string()));
        }
        info!(?order_id, limit, "listing line items");
        let wire: Vec<WireLineItem> =
            pager::collect_limited(pager::items(self.api(), Resource::LineItems, req), limit).await?;
        let mut items: Vec<LineItemRecord> = wire.iter().map(line_item_record).collect();

        let ids: Vec<String> = items.iter().map(|li| li.id.clone()).filter(|id| id != PLACEHOLDER).collect();
        let metrics = metrics_or_empty(self.api(), LINE_ITEM_DIM, &ids).await;
        join_line_items(&mut items, &metrics);
        Ok(items)
    }

    pub async fn networks(&self) -> Result<Vec<NetworkRecord>, ApiError> {
        let wire: Vec<WireNetwork> =
            pager::items(self.api(), Resource::Networks, ListRequest::new(100)).try_collect().await?;
        for n in &wire {
            let root = n.effective_root_ad_unit.as_deref().filter(|r| !r.is_empty());
            if let (Some(code), Some(root)) = (n.network_code.as_deref(), root) {
                if code == self.network_code && self.known_root_ad_unit.set(resource_id(root).to_string()).is_ok() {
                    debug!(root, "root ad unit cached from network listing");
                }
            }
        }
        Ok(wire
            .iter()
            .map(|n| NetworkRecord {
                network_code: text_or_placeholder(n.network_code.as_deref()),
                display_name: text_or_placeholder(n.display_name.as_deref()),
                property_code: text_or_placeholder(n.property_code.as_deref()),
            })
            .collect())
    }

    pub async fn creatives(&self, limit: usize) -> Result<Vec<CreativeRecord>, ApiError> {
        let req = ListRequest::new(page_size(limit)).order_by("creativeId desc");
        let wire: Vec<WireCreative> =
            pager::collect_limited(pager::items(self.api(), Resource::Creatives, req), limit).await?;
        Ok(wire
            .iter()
            .map(|c| CreativeRecord {
                id: entity_id(&c.creative_id, &c.name).unwrap_or_else(|| PLACEHOLDER.to_string()),
                name: display_name(&c.display_name, &c.name),
                advertiser_id: text_or_placeholder(c.advertiser.as_deref().map(resource_id)),
            })
            .collect())
    }

    /// Inventory per preset for `[start, end]`. Without `--start` the window
    /// is today plus 30 days, resolved from the trailing 30-day history.
    pub async fn inventory(
        &self,
        preset: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> InventoryReport {
        let explicit = start.is_some() || end.is_some();
        let start = start.unwrap_or(today);
        let end = end.unwrap_or(today + Duration::days(DEFAULT_WINDOW_DAYS));
        let presets = select_presets(preset);

        let mut report = InventoryReport {
            rows: Vec::with_capacity(presets.len()),
            start_str: start.format("%Y-%m-%d").to_string(),
            end_str: end.format("%Y-%m-%d").to_string(),
            mode: InventoryMode::Unavailable,
            source: None,
            error: None,
            hint: None,
        };
        let placeholder_rows = |report: &mut InventoryReport| {
            for p in &presets {
                report.rows.push(InventoryRow {
                    preset: p.key.to_string(),
                    label: p.label.to_string(),
                    sizes: p.sizes_label(),
                    values: AggregatedRow::placeholder(),
                });
            }
        };

        if end < start {
            report.error = Some(format!("end date {} is before start date {}", report.end_str, report.start_str));
            placeholder_rows(&mut report);
            return report;
        }

        let window = DateWindow { start, end, explicit };
        let resolved = ForecastResolver::new(self.api(), self.precedence)
            .with_root_ad_unit(self.known_root_ad_unit.get().cloned())
            .resolve(&window, today)
            .await;

        match resolved.data {
            Some(data) => {
                report.mode = data.mode();
                report.source = resolved.source;
                for p in &presets {
                    report.rows.push(InventoryRow {
                        preset: p.key.to_string(),
                        label: p.label.to_string(),
                        sizes: p.sizes_label(),
                        values: aggregate(&data, p),
                    });
                }
            }
            None => {
                report.error = resolved.error;
                if resolved.unsupported {
                    report.hint = Some(AD_MANAGER_360_HINT.to_string());
                }
                placeholder_rows(&mut report);
            }
        }
        report
    }
}

fn line_item_record(li: &WireLineItem) -> LineItemRecord {
    let goal = li.goal.clone().unwrap_or_default();
    LineItemRecord {
        id: entity_id(&li.line_item_id, &li.name).unwrap_or_else(|| PLACEHOLDER.to_string()),
        name: display_name(&li.display_name, &li.name),
        order_id: text_or_placeholder(li.order.as_deref().map(resource_id)),
        status: normalize_status(&li.status, &LINE_ITEM_STATUS_CODES),
        line_item_type: text_or_placeholder(li.line_item_type.as_deref()),
        start_date: format_date(li.start_time.as_ref().and_then(parse_timestamp)),
        end_date: end_date(
            li.end_time.as_ref().and_then(parse_timestamp),
            flag_is_true(&li.unlimited_end_time),
        ),
        goal_units: goal.units.as_ref().and_then(value_as_i64),
        goal_unit_type: goal
            .unit_type
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_GOAL_UNIT.to_string()),
        impressions: 0,
        clicks: 0,
        ctr: PLACEHOLDER.to_string(),
        progress: PLACEHOLDER.to_string(),
    }
}

// ===============================
// src/delivery.rs (delivery-window classifier)
// ===============================
use serde_json::Value;

use crate::gam::{flag_is_true, WireOrder};
use crate::normalize::{normalize_status, parse_timestamp, EpochMillis};

/// 365.25 days. Orders that started earlier are not "currently delivering".
pub const STALE_AFTER_MS: i64 = 31_557_600_000;
pub const DELIVERING: &str = "DELIVERING";

// input user (lowercase) -> status di server
const STATUS_ALIASES: [(&str, &str); 10] = [
    ("delivering", "APPROVED"),
    ("approved", "APPROVED"),
    ("active", "APPROVED"),
    ("draft", "DRAFT"),
    ("pending_approval", "PENDING_APPROVAL"),
    ("disapproved", "DISAPPROVED"),
    ("paused", "PAUSED"),
    ("canceled", "CANCELED"),
    ("cancelled", "CANCELED"),
    ("deleted", "DELETED"),
];

const DELIVERING_ALIASES: [&str; 3] = ["delivering", "approved", "active"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub start_ms: Option<EpochMillis>,
    pub end_ms: Option<EpochMillis>,
    pub unlimited_end: bool,
}

impl DeliveryWindow {
    pub fn from_order(o: &WireOrder) -> Self {
        Self {
            start_ms: o.start_time.as_ref().and_then(parse_timestamp),
            end_ms: o.end_time.as_ref().and_then(parse_timestamp),
            unlimited_end: flag_is_true(&o.unlimited_end_time),
        }
    }

    pub fn is_delivering(&self, now_ms: EpochMillis) -> bool {
        let Some(start) = self.start_ms else { return false };
        if start > now_ms {
            return false;
        }
        if !self.unlimited_end && self.end_ms.map_or(true, |end| end < now_ms) {
            return false;
        }
        start >= now_ms - STALE_AFTER_MS
    }
}

/// Display status for an order, or `None` when the delivering filter is on
/// and the order falls outside the window.
pub fn classify(
    raw_status: &Value,
    table: &[(i64, &str)],
    window: &DeliveryWindow,
    now_ms: EpochMillis,
    want_delivering: bool,
) -> Option<String> {
    if !want_delivering {
        return Some(normalize_status(raw_status, table));
    }
    window.is_delivering(now_ms).then(|| DELIVERING.to_string())
}

/// Parsed `--status` argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter {
    /// Status sent to the listing filter.
    pub server_status: Option<String>,
    pub delivering: bool,
}

impl StatusFilter {
    pub fn parse(input: Option<&str>) -> Self {
        let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let lower = raw.to_ascii_lowercase();
        let server = STATUS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, s)| s.to_string())
            .unwrap_or_else(|| raw.to_ascii_uppercase());
        Self { server_status: Some(server), delivering: DELIVERING_ALIASES.contains(&lower.as_str()) }
    }

    pub fn filter_expr(&self) -> Option<String> {
        self.server_status.as_ref().map(|s| format!("status = \"{s}\""))
    }

    /// Entities to scan before truncating to `limit`; the window check runs
    /// client-side so the delivering filter reads wider.
    pub fn scan_limit(&self, limit: usize) -> usize {
        if self.delivering { limit.saturating_mul(10).min(500) } else { limit }
    }
}

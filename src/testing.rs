// ===============================
// src/testing.rs (in-memory AdManagerApi for unit tests)
// ===============================
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::client::{AdManagerApi, ApiError};
use crate::domain::UserInfo;
use crate::gam::{ListRequest, Page, ReportDefinition, ReportType, Resource, RowPage, WireNetwork};

pub fn report_key(report_type: ReportType, first_dim: &str) -> String {
    let t = match report_type {
        ReportType::Historical => "HISTORICAL",
        ReportType::FutureSellThrough => "FUTURE_SELL_THROUGH",
    };
    format!("{t}/{first_dim}")
}

fn remote(msg: &str) -> ApiError {
    ApiError::Http { status: 400, body: msg.to_string() }
}

#[derive(Default)]
pub struct FakeApi {
    pages: HashMap<(&'static str, Option<String>), Vec<Vec<Value>>>,
    list_errors: HashMap<(&'static str, Option<String>), String>,
    reports: HashMap<String, Result<Vec<Vec<Value>>, String>>,
    traffic: Option<Result<Vec<i64>, String>>,
    network: Option<Result<Value, String>>,
    user: Option<UserInfo>,
    list_calls: AtomicUsize,
    network_calls: AtomicUsize,
    traffic_calls: Mutex<Vec<String>>,
    started_reports: Mutex<Vec<ReportDefinition>>,
}

impl FakeApi {
    pub fn with_pages(mut self, r: Resource, pages: Vec<Vec<Value>>) -> Self {
        self.pages.insert((r.collection(), None), pages);
        self
    }

    pub fn with_filtered_pages(mut self, r: Resource, filter: &str, pages: Vec<Vec<Value>>) -> Self {
        self.pages.insert((r.collection(), Some(filter.to_string())), pages);
        self
    }

    pub fn with_list_error(mut self, r: Resource, filter: Option<&str>, msg: &str) -> Self {
        self.list_errors.insert((r.collection(), filter.map(str::to_string)), msg.to_string());
        self
    }

    /// Single-page report keyed by type and first dimension.
    pub fn with_report(mut self, t: ReportType, first_dim: &str, rows: Result<Vec<Value>, &str>) -> Self {
        let v = rows.map(|r| vec![r]).map_err(str::to_string);
        self.reports.insert(report_key(t, first_dim), v);
        self
    }

    /// Multi-page rows for a result named "r".
    pub fn with_report_rows(mut self, pages: Vec<Vec<Value>>) -> Self {
        self.reports.insert("r".to_string(), Ok(pages));
        self
    }

    pub fn with_traffic(mut self, t: Result<Vec<i64>, &str>) -> Self {
        self.traffic = Some(t.map_err(str::to_string));
        self
    }

    pub fn with_network(mut self, n: Result<Value, &str>) -> Self {
        self.network = Some(n.map_err(str::to_string));
        self
    }

    pub fn with_user(mut self, u: UserInfo) -> Self {
        self.user = Some(u);
        self
    }

    pub fn list_calls(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }
    pub fn network_calls(&self) -> usize { self.network_calls.load(Ordering::SeqCst) }
    pub fn traffic_roots(&self) -> Vec<String> { self.traffic_calls.lock().unwrap().clone() }
    pub fn started_reports(&self) -> Vec<ReportDefinition> { self.started_reports.lock().unwrap().clone() }
}

fn page_at(pages: &[Vec<Value>], token: Option<&str>) -> (Vec<Value>, Option<String>) {
    let idx: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let items = pages.get(idx).cloned().unwrap_or_default();
    let next = (idx + 1 < pages.len()).then(|| (idx + 1).to_string());
    (items, next)
}

#[async_trait]
impl AdManagerApi for FakeApi {
    async fn list_page(&self, resource: Resource, req: &ListRequest) -> Result<Page, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let key = (resource.collection(), req.filter.clone());
        if let Some(msg) = self.list_errors.get(&key) {
            return Err(remote(msg));
        }
        let pages = self
            .pages
            .get(&key)
            .or_else(|| self.pages.get(&(resource.collection(), None)))
            .cloned()
            .unwrap_or_default();
        let (items, next_page_token) = page_at(&pages, req.page_token.as_deref());
        Ok(Page { items, next_page_token })
    }

    async fn current_network(&self) -> Result<WireNetwork, ApiError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        match &self.network {
            Some(Ok(v)) => Ok(serde_json::from_value(v.clone())?),
            Some(Err(msg)) => Err(remote(msg)),
            None => Ok(serde_json::from_value(json!({}))?),
        }
    }

    async fn start_report(&self, def: &ReportDefinition) -> Result<String, ApiError> {
        self.started_reports.lock().unwrap().push(def.clone());
        let key = report_key(def.report_type, def.dimensions.first().map(String::as_str).unwrap_or(""));
        match self.reports.get(&key) {
            Some(Ok(_)) => Ok(key),
            Some(Err(msg)) => Err(remote(msg)),
            None => Err(ApiError::Report(format!("no fake report for {key}"))),
        }
    }

    async fn fetch_report_rows(&self, result: &str, page_token: Option<&str>) -> Result<RowPage, ApiError> {
        let pages = match self.reports.get(result) {
            Some(Ok(p)) => p.clone(),
            _ => return Err(ApiError::Report(format!("unknown result {result}"))),
        };
        let (rows, next_page_token) = page_at(&pages, page_token);
        let rows = rows.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>()?;
        Ok(RowPage { rows, next_page_token })
    }

    async fn traffic_forecast(&self, root_ad_unit_id: &str, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<i64>, ApiError> {
        self.traffic_calls.lock().unwrap().push(root_ad_unit_id.to_string());
        match &self.traffic {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(msg)) => Err(ApiError::Soap(msg.clone())),
            None => Err(ApiError::Soap("traffic not configured".into())),
        }
    }

    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        self.user.clone().ok_or_else(|| ApiError::Empty("no user".into()))
    }
}

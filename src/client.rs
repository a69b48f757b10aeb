// ===============================
// src/client.rs
// ===============================
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};
use url::Url;

use crate::auth::{AuthError, TokenProvider};
use crate::domain::UserInfo;
use crate::gam::{ListRequest, Page, ReportDefinition, Resource, RowPage, WireNetwork};
use crate::metrics::{API_LATENCY_MS, API_REQUESTS};
use crate::soap;

/// Remote error texts that mean "this network/tier cannot do that".
const UNSUPPORTED_MARKERS: [&str; 6] = [
    "UNSUPPORTED_OPERATION",
    "CommonError",
    "FEATURE_NOT_ENABLED",
    "NOT_WHITELISTED",
    "PERMISSION_DENIED",
    "REPORT_TYPE_NOT_SUPPORTED",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("SOAP fault: {0}")]
    Soap(String),
    #[error("malformed SOAP response: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("report failed: {0}")]
    Report(String),
    #[error("{0}")]
    Empty(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn is_unsupported(&self) -> bool {
        let text = self.to_string();
        UNSUPPORTED_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// Everything the core needs from Ad Manager. The HTTP adapter below is the
/// production implementation; tests plug in an in-memory one.
#[async_trait]
pub trait AdManagerApi: Send + Sync {
    async fn list_page(&self, resource: Resource, req: &ListRequest) -> Result<Page, ApiError>;
    async fn current_network(&self) -> Result<WireNetwork, ApiError>;
    /// Create, run and await a report; returns the result resource name.
    async fn start_report(&self, def: &ReportDefinition) -> Result<String, ApiError>;
    async fn fetch_report_rows(&self, result: &str, page_token: Option<&str>) -> Result<RowPage, ApiError>;
    /// Legacy `getTrafficData`: forecasted series for the whole subtree.
    async fn traffic_forecast(&self, root_ad_unit_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<i64>, ApiError>;
    async fn current_user(&self) -> Result<UserInfo, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ClientCfg {
    pub network_code: String,
    pub application_name: String,
    pub api_base: String,
    pub soap_base: String,
    pub api_version: String,
    pub report_poll: Duration,
    pub report_page_size: u32,
}

pub struct HttpAdManager {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    cfg: ClientCfg,
}

impl HttpAdManager {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenProvider>, mut cfg: ClientCfg) -> Result<Self, url::ParseError> {
        // validasi base URL di awal, bukan di request pertama
        Url::parse(&cfg.api_base)?;
        Url::parse(&cfg.soap_base)?;
        cfg.api_base = cfg.api_base.trim_end_matches('/').to_string();
        cfg.soap_base = cfg.soap_base.trim_end_matches('/').to_string();
        Ok(Self { http, tokens, cfg })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.api_base, path.trim_start_matches('/'))
    }

    fn network_path(&self) -> String {
        format!("networks/{}", self.cfg.network_code)
    }

    async fn send(&self, req: reqwest::RequestBuilder, surface: &'static str) -> Result<(u16, String), ApiError> {
        let bearer = self.tokens.bearer().await?;
        let started = Instant::now();
        let result = req.bearer_auth(bearer).send().await;
        API_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1000.0);
        let rsp = match result {
            Ok(r) => r,
            Err(e) => {
                API_REQUESTS.with_label_values(&[surface, "error"]).inc();
                return Err(e.into());
            }
        };
        let status = rsp.status().as_u16();
        let body = rsp.text().await?;
        let outcome = if (200..300).contains(&status) { "ok" } else { "error" };
        API_REQUESTS.with_label_values(&[surface, outcome]).inc();
        Ok((status, body))
    }

    async fn rest(&self, req: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let (status, body) = self.send(req, "rest").await?;
        if !(200..300).contains(&status) {
            warn!(status, "ad manager REST call failed");
            return Err(ApiError::Http { status, body });
        }
        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, url: String) -> Result<Value, ApiError> {
        debug!(%url, "GET");
        self.rest(self.http.get(url)).await
    }

    async fn post(&self, url: String, body: &Value) -> Result<Value, ApiError> {
        debug!(%url, "POST");
        self.rest(self.http.post(url).json(body)).await
    }

    async fn soap_call(&self, service: &str, body: &str) -> Result<String, ApiError> {
        let url = format!("{}/{}/{}", self.cfg.soap_base, self.cfg.api_version, service);
        let envelope = soap::envelope(&self.cfg.api_version, &self.cfg.network_code, &self.cfg.application_name, body);
        debug!(%url, "SOAP");
        let req = self
            .http
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope);
        let (status, xml) = self.send(req, "soap").await?;
        // fault datang bersama HTTP 500, cek dulu sebelum status
        match soap::fault(&xml) {
            Ok(Some(f)) => Err(ApiError::Soap(f)),
            _ if !(200..300).contains(&status) => Err(ApiError::Http { status, body: xml }),
            Ok(None) => Ok(xml),
            Err(e) => Err(e.into()),
        }
    }
}

fn operation_error(op: &Value) -> Option<String> {
    op.get("error").map(|e| {
        e.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| e.to_string())
    })
}

#[async_trait]
impl AdManagerApi for HttpAdManager {
    async fn list_page(&self, resource: Resource, req: &ListRequest) -> Result<Page, ApiError> {
        let path = match resource {
            Resource::Networks => "networks".to_string(),
            other => format!("{}/{}", self.network_path(), other.collection()),
        };
        let v = self.get(format!("{}?{}", self.rest_url(&path), req.query())).await?;
        let items = match v.get(resource.collection()) {
            Some(Value::Array(a)) => a.clone(),
            _ => Vec::new(),
        };
        let next_page_token = v
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Ok(Page { items, next_page_token })
    }

    async fn current_network(&self) -> Result<WireNetwork, ApiError> {
        let v = self.get(self.rest_url(&self.network_path())).await?;
        Ok(serde_json::from_value(v)?)
    }

    async fn start_report(&self, def: &ReportDefinition) -> Result<String, ApiError> {
        let body = json!({
            "displayName": "gam-cli-report",
            "visibility": "HIDDEN",
            "reportDefinition": def,
        });
        let created = self.post(self.rest_url(&format!("{}/reports", self.network_path())), &body).await?;
        let report_name = created
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Report("create returned no report name".into()))?
            .to_string();

        let mut op = self.post(self.rest_url(&format!("{report_name}:run")), &json!({})).await?;
        // Long-running operation; poll until done (no client-side deadline).
        while !op.get("done").and_then(Value::as_bool).unwrap_or(false) {
            sleep(self.cfg.report_poll).await;
            let op_name = op
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Report("run returned no operation name".into()))?
                .to_string();
            op = self.get(self.rest_url(&op_name)).await?;
        }
        if let Some(msg) = operation_error(&op) {
            return Err(ApiError::Report(msg));
        }
        op.pointer("/response/reportResult")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Empty("report finished without a result".into()))
    }

    async fn fetch_report_rows(&self, result: &str, page_token: Option<&str>) -> Result<RowPage, ApiError> {
        let mut url = format!("{}:fetchRows?pageSize={}", self.rest_url(result), self.cfg.report_page_size);
        if let Some(t) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(t)));
        }
        let v = self.get(url).await?;
        Ok(serde_json::from_value(v)?)
    }

    async fn traffic_forecast(&self, root_ad_unit_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<i64>, ApiError> {
        let body = soap::traffic_data_body(root_ad_unit_id, &start, &end);
        let xml = self.soap_call("ForecastService", &body).await?;
        Ok(soap::forecast_values(&xml)?)
    }

    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        let xml = self.soap_call("UserService", soap::current_user_body()).await?;
        let rval = soap::section(&xml, "rval")?.ok_or_else(|| ApiError::Empty("getCurrentUser returned nothing".into()))?;
        let field = |name: &str| rval.text(name).unwrap_or_default().to_string();
        Ok(UserInfo {
            display_name: field("name"),
            email: field("email"),
            id: field("id"),
            role_name: field("roleName"),
        })
    }
}

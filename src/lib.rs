use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use error::{ApiErrorBody, InfluxError};
use query::{QueryApi, QueryOperation, QueryRequest};
use reqwest::{
    Response,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use url::Url;
use write::{WriteApiBlocking, WriteOperation, WritePrecision, WriteRequest};

pub mod demo;
pub mod error;
pub mod macros;
pub mod model;
pub mod query;
pub mod server;
pub mod util;
pub mod write;

#[cfg(test)]
pub mod test_util;

const USER_AGENT: &str = "influxdb-hello-rs/0.1.0";
const HEADER_AUTHORIZATION: &str = "Authorization";
const API_PREFIX: &str = "api/v2";

/// 默认的请求超时时间
const DEFAULT_TIMEOUT_MS: u64 = 20_000;

pub type InfluxResult<T> = Result<T, InfluxError>;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfluxOp {
    #[default]
    Undefined,

    Write,
    Query,
}

impl From<InfluxOp> for String {
    fn from(value: InfluxOp) -> Self {
        value.to_string()
    }
}

impl Display for InfluxOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InfluxOp::Undefined => "_undefined_",
            InfluxOp::Write => "write",
            InfluxOp::Query => "query",
        };

        write!(f, "{}", s)
    }
}

/// The request to send to InfluxDB 2.x HTTP API
#[derive(Debug, Clone)]
pub struct InfluxRequest {
    method: reqwest::Method,
    operation: InfluxOp,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

impl Default for InfluxRequest {
    fn default() -> Self {
        Self {
            method: reqwest::Method::POST,
            operation: InfluxOp::Undefined,
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InfluxClientOptions {
    /// 单次请求的超时时间，`None` 表示不超时
    pub timeout_ms: Option<u64>,

    /// 写入时间戳的精度
    pub precision: WritePrecision,
}

impl InfluxClientOptions {
    pub fn new() -> Self {
        Self {
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            precision: WritePrecision::default(),
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout_ms = None;
        self
    }

    pub fn precision(mut self, precision: WritePrecision) -> Self {
        self.precision = precision;
        self
    }
}

impl Default for InfluxClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// InfluxDB 2.x client.
///
/// Cloning is cheap and every clone shares the same underlying http client and the same closed state:
/// after [`InfluxClient::close`] is called on any of them, all requests fail with [`InfluxError::ClientClosed`].
#[derive(Clone)]
pub struct InfluxClient {
    url: String,
    token: String,
    http_client: reqwest::Client,
    options: InfluxClientOptions,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for InfluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxClient")
            .field("url", &self.url)
            .field("http_client", &self.http_client)
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl InfluxClient {
    /// Create a client for the server base url, e.g. `http://localhost:8086`, and the API token.
    ///
    /// No connection is made here. The first request opens it.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_options(url, token, InfluxClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, token: impl Into<String>, options: InfluxClientOptions) -> Self {
        let url = url.into();

        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.into(),
            http_client: reqwest::Client::new(),
            options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build an InfluxClient from env values. The following env vars are required:
    ///
    /// - `INFLUXDB_URL`: The server base url. e.g. `http://localhost:8086`
    /// - `INFLUXDB_TOKEN`: The API token
    pub fn from_env() -> InfluxResult<Self> {
        let url = std::env::var("INFLUXDB_URL").map_err(|_| InfluxError::ValidationFailed("env var INFLUXDB_URL is missing".to_string()))?;
        let token = std::env::var("INFLUXDB_TOKEN").map_err(|_| InfluxError::ValidationFailed("env var INFLUXDB_TOKEN is missing".to_string()))?;

        Ok(Self::new(url, token))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &InfluxClientOptions {
        &self.options
    }

    /// 关闭客户端。之后所有由该客户端（包括它的克隆）发起的请求都会失败
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("influxdb client for {} closed", self.url);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn prepare_headers(&self, req: &mut InfluxRequest) {
        let headers = &mut req.headers;
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert(HEADER_AUTHORIZATION.to_string(), format!("Token {}", self.token));
    }

    fn build_url(&self, operation: InfluxOp, query: &HashMap<String, String>) -> InfluxResult<Url> {
        let mut url = Url::parse(format!("{}/{}/{}", self.url, API_PREFIX, operation).as_str())
            .map_err(|e| InfluxError::ValidationFailed(format!("invalid server url {}: {}", self.url, e)))?;

        if !query.is_empty() {
            let mut items = query.iter().collect::<Vec<_>>();
            items.sort_by(|a, b| a.0.cmp(b.0));
            url.query_pairs_mut().extend_pairs(items);
        }

        Ok(url)
    }

    pub async fn send(&self, req: InfluxRequest) -> InfluxResult<Response> {
        if self.is_closed() {
            return Err(InfluxError::ClientClosed);
        }

        let mut req = req;
        self.prepare_headers(&mut req);

        let InfluxRequest {
            method,
            operation,
            headers,
            query,
            body,
        } = req;

        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            if k != HEADER_AUTHORIZATION {
                log::debug!(">> header: {}: {}", k, v);
            }

            let name = HeaderName::from_str(&k.to_lowercase()).map_err(|e| InfluxError::ValidationFailed(format!("invalid header name {}: {}", k, e)))?;
            let value = HeaderValue::from_str(&v).map_err(|e| InfluxError::ValidationFailed(format!("invalid value for header {}: {}", k, e)))?;
            header_map.insert(name, value);
        }

        let url = self.build_url(operation, &query)?;
        log::debug!("{} {}", method, url);

        let mut request_builder = self.http_client.request(method, url).headers(header_map).body(body);

        // Handle per-request options
        if let Some(ms) = self.options.timeout_ms {
            request_builder = request_builder.timeout(Duration::from_millis(ms));
        }

        let response = request_builder.send().await?;

        response.headers().iter().for_each(|(k, v)| {
            log::debug!("<< header: {}: {}", k, v.to_str().unwrap_or_default());
        });

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let e = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(api_error) if !api_error.code.is_empty() || !api_error.message.is_empty() => InfluxError::ApiError(Box::new(api_error)),
            _ => InfluxError::StatusError(status, text),
        };

        log::error!("api call failed for operation {} with error {}", operation, e);

        Err(e)
    }

    pub fn write(&self, request: WriteRequest) -> WriteOperation {
        WriteOperation::new(self.clone(), request)
    }

    pub fn query(&self, request: QueryRequest) -> QueryOperation {
        QueryOperation::new(self.clone(), request)
    }

    /// 获取阻塞式写入接口：每次写入都会等待服务端确认之后才返回
    pub fn write_api_blocking(&self, org: &str, bucket: &str) -> WriteApiBlocking {
        WriteApiBlocking::new(self.clone(), org, bucket)
    }

    pub fn query_api(&self, org: &str) -> QueryApi {
        QueryApi::new(self.clone(), org)
    }
}

use std::collections::HashMap;

use serde::Serialize;

use crate::{InfluxClient, InfluxOp, InfluxRequest, InfluxResult, add_per_request_options, error::InfluxError};

use super::QueryTableResult;

/// Annotated CSV 的标注类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Annotation {
    Datatype,
    Group,
    Default,
}

/// 时间格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateTimeFormat {
    RFC3339,
    RFC3339Nano,
}

/// 查询结果的 CSV 输出格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialect {
    pub annotations: Vec<Annotation>,

    /// 分隔符，只能是一个 ASCII 字符
    pub delimiter: String,

    /// 是否输出表头
    pub header: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time_format: Option<DateTimeFormat>,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            annotations: vec![Annotation::Datatype, Annotation::Group, Annotation::Default],
            delimiter: ",".to_string(),
            header: true,
            comment_prefix: None,
            date_time_format: None,
        }
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,

    #[serde(rename = "type")]
    query_type: &'static str,

    dialect: &'a Dialect,
}

/// 执行 Flux 查询
///
/// 官方文档：<https://docs.influxdata.com/influxdb/v2/api/#operation/PostQuery>
#[derive(Debug, Default, Clone)]
pub struct QueryRequest {
    /// 组织名称
    pub org: String,

    /// Flux 查询语句
    pub query: String,

    pub dialect: Dialect,
}

impl QueryRequest {
    pub fn new(org: &str, query: impl Into<String>) -> Self {
        Self {
            org: org.to_string(),
            query: query.into(),
            dialect: Dialect::default(),
        }
    }

    /// 设置查询语句
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();

        self
    }

    /// 设置 CSV 输出格式
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;

        self
    }

    pub(crate) fn validate(&self) -> InfluxResult<()> {
        if self.org.is_empty() {
            return Err(InfluxError::ValidationFailed("org can not be empty".to_string()));
        }

        if self.query.trim().is_empty() {
            return Err(InfluxError::ValidationFailed("query statement can not be empty".to_string()));
        }

        if self.dialect.delimiter.len() != 1 || !self.dialect.delimiter.is_ascii() {
            return Err(InfluxError::ValidationFailed(format!("invalid delimiter: {:?}", self.dialect.delimiter)));
        }

        if !self.dialect.header || !self.dialect.annotations.contains(&Annotation::Datatype) {
            return Err(InfluxError::ValidationFailed("query result must contain header and datatype annotation".to_string()));
        }

        Ok(())
    }

    pub(crate) fn encode_body(&self) -> InfluxResult<Vec<u8>> {
        let body = QueryBody {
            query: &self.query,
            query_type: "flux",
            dialect: &self.dialect,
        };

        Ok(serde_json::to_vec(&body)?)
    }
}

#[derive(Debug, Clone)]
pub struct QueryOperation {
    client: InfluxClient,
    request: QueryRequest,
}

add_per_request_options!(QueryOperation);

impl QueryOperation {
    pub(crate) fn new(client: InfluxClient, request: QueryRequest) -> Self {
        Self { client, request }
    }

    /// 提交查询。请求被服务端接受之后返回结果游标，数据行在遍历游标的时候才解析
    pub async fn send(self) -> InfluxResult<QueryTableResult> {
        self.request.validate()?;

        let Self { client, request } = self;

        let body = request.encode_body()?;
        let delimiter = request.dialect.delimiter.as_bytes()[0];

        log::debug!("query in org {}: {}", request.org, request.query);

        let req = InfluxRequest {
            operation: InfluxOp::Query,
            headers: HashMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/csv".to_string()),
            ]),
            query: HashMap::from([("org".to_string(), request.org)]),
            body,
            ..Default::default()
        };

        let resp = client.send(req).await?;
        let bytes = resp.bytes().await?;

        Ok(QueryTableResult::new(bytes, delimiter))
    }
}

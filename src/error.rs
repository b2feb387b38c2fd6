use std::fmt::{Display, Formatter};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// InfluxDB 2.x API 返回的错误消息体
///
/// e.g. `{"code":"unauthorized","message":"unauthorized access"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,

    /// 部分写入错误会带上出错的行号
    #[serde(default)]
    pub line: Option<u32>,
}

impl Display for ApiErrorBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(n) => write!(f, "{}: {} (line {})", self.code, self.message, n),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum InfluxError {
    #[error("{0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// This is error for InfluxDB API response.
    #[error("{0}")]
    ApiError(Box<ApiErrorBody>),

    #[error("InfluxDB api response with non-successful code: {0}. response message is: {1}")]
    StatusError(StatusCode, String),

    /// 查询结果（annotated CSV）解析失败
    #[error("{0}")]
    ParseError(String),

    /// Flux 查询结果中返回的错误表
    #[error("{0}")]
    QueryError(String),

    #[error("client has been closed")]
    ClientClosed,
}

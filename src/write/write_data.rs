use std::collections::HashMap;

use crate::{InfluxClient, InfluxOp, InfluxRequest, InfluxResult, add_per_request_options, error::InfluxError, model::Point};

use super::WritePrecision;

/// 要写入的一行数据：结构化的数据点，或者是已经编码好的 line protocol 文本
#[derive(Debug, Clone, PartialEq)]
pub enum WriteData {
    Point(Point),
    Record(String),
}

/// 写入数据到指定的组织和桶
///
/// 官方文档：<https://docs.influxdata.com/influxdb/v2/api/#operation/PostWrite>
#[derive(Debug, Default, Clone)]
pub struct WriteRequest {
    /// 组织名称
    pub org: String,

    /// 桶名称
    pub bucket: String,

    /// 按照添加顺序写入的数据
    pub data: Vec<WriteData>,

    /// 时间戳精度。没有设置的时候使用客户端选项中的精度
    pub precision: Option<WritePrecision>,
}

impl WriteRequest {
    pub fn new(org: &str, bucket: &str) -> Self {
        Self {
            org: org.to_string(),
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    /// 添加一个数据点
    pub fn point(mut self, point: Point) -> Self {
        self.data.push(WriteData::Point(point));

        self
    }

    /// 添加多个数据点
    pub fn points(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        self.data.extend(points.into_iter().map(WriteData::Point));

        self
    }

    /// 添加一行 line protocol 文本
    pub fn record(mut self, line: impl Into<String>) -> Self {
        self.data.push(WriteData::Record(line.into()));

        self
    }

    /// 添加多行 line protocol 文本
    pub fn records(mut self, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.data.extend(lines.into_iter().map(|s| WriteData::Record(s.into())));

        self
    }

    /// 设置时间戳精度
    pub fn precision(mut self, precision: WritePrecision) -> Self {
        self.precision = Some(precision);

        self
    }

    pub(crate) fn validate(&self) -> InfluxResult<()> {
        if self.org.is_empty() {
            return Err(InfluxError::ValidationFailed("org can not be empty".to_string()));
        }

        if self.bucket.is_empty() {
            return Err(InfluxError::ValidationFailed("bucket can not be empty".to_string()));
        }

        if self.data.is_empty() {
            return Err(InfluxError::ValidationFailed("can not write empty data".to_string()));
        }

        for d in &self.data {
            match d {
                WriteData::Point(p) => p.validate()?,
                WriteData::Record(s) if s.trim().is_empty() => {
                    return Err(InfluxError::ValidationFailed("can not write empty line protocol record".to_string()));
                }
                WriteData::Record(_) => {}
            }
        }

        Ok(())
    }

    /// 编码成请求体，每个数据一行
    pub(crate) fn encode_body(&self, precision: WritePrecision) -> InfluxResult<String> {
        let mut lines = Vec::with_capacity(self.data.len());

        for d in &self.data {
            match d {
                WriteData::Point(p) => lines.push(p.to_line_protocol(precision)?),
                WriteData::Record(s) => lines.push(s.trim_end_matches('\n').to_string()),
            }
        }

        Ok(lines.join("\n"))
    }
}

#[derive(Debug, Clone)]
pub struct WriteOperation {
    client: InfluxClient,
    request: WriteRequest,
}

add_per_request_options!(WriteOperation);

impl WriteOperation {
    pub(crate) fn new(client: InfluxClient, request: WriteRequest) -> Self {
        Self { client, request }
    }

    /// 发送写入请求，服务端确认（`204 No Content`）之后返回
    pub async fn send(self) -> InfluxResult<()> {
        self.request.validate()?;

        let Self { client, request } = self;

        let precision = request.precision.unwrap_or(client.options.precision);
        let body = request.encode_body(precision)?;

        log::debug!("write {} line(s) to {}/{}:\n{}", request.data.len(), request.org, request.bucket, body);

        let WriteRequest { org, bucket, .. } = request;

        let req = InfluxRequest {
            operation: InfluxOp::Write,
            headers: HashMap::from([("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())]),
            query: HashMap::from([
                ("org".to_string(), org),
                ("bucket".to_string(), bucket),
                ("precision".to_string(), precision.to_string()),
            ]),
            body: body.into_bytes(),
            ..Default::default()
        };

        client.send(req).await?;

        Ok(())
    }
}

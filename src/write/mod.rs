//! 写入数据

mod write_data;

use std::fmt::Display;

use chrono::{DateTime, Utc};
pub use write_data::*;

use crate::{InfluxClient, InfluxResult, model::Point};

/// 写入时间戳的精度
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecision {
    #[default]
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
}

impl WritePrecision {
    /// 按照精度换算时间戳。纳秒精度只能表示 1677 ~ 2262 年之间的时间
    pub(crate) fn timestamp(&self, t: &DateTime<Utc>) -> Option<i64> {
        match self {
            Self::Nanosecond => t.timestamp_nanos_opt(),
            Self::Microsecond => Some(t.timestamp_micros()),
            Self::Millisecond => Some(t.timestamp_millis()),
            Self::Second => Some(t.timestamp()),
        }
    }
}

impl Display for WritePrecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Nanosecond => "ns",
            Self::Microsecond => "us",
            Self::Millisecond => "ms",
            Self::Second => "s",
        };

        write!(f, "{}", s)
    }
}

/// 阻塞式写入接口。每次调用都会立即发送请求，并等待服务端确认之后才返回
#[derive(Debug, Clone)]
pub struct WriteApiBlocking {
    client: InfluxClient,
    org: String,
    bucket: String,
}

impl WriteApiBlocking {
    pub(crate) fn new(client: InfluxClient, org: &str, bucket: &str) -> Self {
        Self {
            client,
            org: org.to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// 写入一个数据点
    pub async fn write_point(&self, point: &Point) -> InfluxResult<()> {
        self.write_points([point.clone()]).await
    }

    /// 在一个请求中写入多个数据点
    pub async fn write_points(&self, points: impl IntoIterator<Item = Point>) -> InfluxResult<()> {
        let request = WriteRequest::new(&self.org, &self.bucket).points(points);

        self.client.write(request).send().await
    }

    /// 直接写入一行 line protocol 文本
    pub async fn write_record(&self, line: &str) -> InfluxResult<()> {
        self.write_records([line]).await
    }

    /// 在一个请求中写入多行 line protocol 文本
    pub async fn write_records(&self, lines: impl IntoIterator<Item = impl Into<String>>) -> InfluxResult<()> {
        let request = WriteRequest::new(&self.org, &self.bucket).records(lines);

        self.client.write(request).send().await
    }
}

#[cfg(test)]
mod test_write {
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};

    use crate::{InfluxClient, error::InfluxError, model::Point, test_util::setup};

    use super::{WritePrecision, WriteRequest};

    fn write_query_matcher(org: &str, bucket: &str, precision: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("org".to_string(), org.to_string()),
            Matcher::UrlEncoded("bucket".to_string(), bucket.to_string()),
            Matcher::UrlEncoded("precision".to_string(), precision.to_string()),
        ])
    }

    async fn test_write_point_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(write_query_matcher("some-org", "some-bucket", "ns"))
            .match_header("authorization", "Token some-token")
            .match_header("content-type", "text/plain; charset=utf-8")
            .match_body("stat,unit=temperature avg=24.5,max=45 1700000000000000000")
            .with_status(204)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let write_api = client.write_api_blocking("some-org", "some-bucket");

        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let p = Point::new("stat", [("unit", "temperature")], [("avg", 24.5), ("max", 45.0)], t);

        let resp = write_api.write_point(&p).await;
        log::debug!("{:?}", resp);
        assert!(resp.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_point() {
        test_write_point_impl().await;
    }

    async fn test_write_record_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(write_query_matcher("some-org", "some-bucket", "ns"))
            .match_body("stat,unit=temperature avg=23.500000,max=45.000000")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let write_api = client.write_api_blocking("some-org", "some-bucket");

        let resp = write_api.write_record("stat,unit=temperature avg=23.500000,max=45.000000").await;
        assert!(resp.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_record() {
        test_write_record_impl().await;
    }

    async fn test_write_mixed_with_precision_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(write_query_matcher("o", "b", "s"))
            .match_body("cpu,host=a usage=0.5 1700000000\nmem free=12i")
            .with_status(204)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let request = WriteRequest::new("o", "b")
            .point(Point::with_measurement("cpu").add_tag("host", "a").add_field("usage", 0.5).set_time(t))
            .record("mem free=12i\n")
            .precision(WritePrecision::Second);

        let resp = client.write(request).timeout_ms(5000).send().await;
        assert!(resp.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_mixed_with_precision() {
        test_write_mixed_with_precision_impl().await;
    }

    async fn test_write_validation_impl() {
        setup();
        let client = InfluxClient::new("http://localhost:8086", "some-token");

        let resp = client.write(WriteRequest::new("o", "b")).send().await;
        assert!(matches!(resp, Err(InfluxError::ValidationFailed(_))));

        let resp = client.write(WriteRequest::new("", "b").record("m f=1")).send().await;
        assert!(matches!(resp, Err(InfluxError::ValidationFailed(_))));

        let resp = client.write_api_blocking("o", "b").write_point(&Point::with_measurement("m")).await;
        assert!(matches!(resp, Err(InfluxError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_write_validation() {
        test_write_validation_impl().await;
    }

    async fn test_write_api_error_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":"invalid","message":"unable to parse 'bad line'","line":1}"#)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let resp = client.write_api_blocking("o", "b").write_record("bad line").await;

        match resp {
            Err(InfluxError::ApiError(e)) => {
                assert_eq!("invalid", e.code);
                assert_eq!(Some(1), e.line);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_api_error() {
        test_write_api_error_impl().await;
    }

    #[test]
    fn test_precision() {
        let t = Utc.timestamp_opt(1, 2_003_004).unwrap();

        assert_eq!(Some(1_002_003_004), WritePrecision::Nanosecond.timestamp(&t));
        assert_eq!(Some(1_002_003), WritePrecision::Microsecond.timestamp(&t));
        assert_eq!(Some(1_002), WritePrecision::Millisecond.timestamp(&t));
        assert_eq!(Some(1), WritePrecision::Second.timestamp(&t));
        assert_eq!("us", WritePrecision::Microsecond.to_string());
    }
}

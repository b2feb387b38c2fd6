//! 每次 HTTP 请求都会执行一遍的演示流程：
//! 连接 InfluxDB，用三种方式各写入一个数据点，执行一次查询并打印结果，最后关闭连接。
//!
//! 流程中的错误不会影响调用方：写入错误只记录日志，查询错误打印到输出中。

use std::{io::Write, ops::Deref};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    InfluxClient, InfluxResult,
    model::Point,
    query::{QueryApi, QueryTableResult},
    write::WriteApiBlocking,
};

pub const INFLUXDB_URL: &str = "http://localhost:8086";
pub const INFLUXDB_TOKEN: &str = "influxdb";
pub const INFLUXDB_ORG: &str = "influxdb-org";
pub const INFLUXDB_BUCKET: &str = "influxdb";

pub const MEASUREMENT: &str = "stat";

/// 查询最近一小时的 `stat` 数据
pub const STAT_QUERY: &str = r#"from(bucket:"influxdb")|> range(start: -1h) |> filter(fn: (r) => r._measurement == "stat")"#;

/// 输出中每个块前后的分隔行
pub const BANNER: &str = "+++++++++++++ ------ +++++++++++++";

/// 只能向前遍历一次的查询结果
pub trait ResultCursor: Send {
    fn next(&mut self) -> bool;

    fn table_changed(&self) -> bool;

    fn table_metadata_text(&self) -> String;

    fn record_text(&self) -> String;

    fn err_text(&self) -> Option<String>;
}

impl ResultCursor for QueryTableResult {
    fn next(&mut self) -> bool {
        QueryTableResult::next(self)
    }

    fn table_changed(&self) -> bool {
        QueryTableResult::table_changed(self)
    }

    fn table_metadata_text(&self) -> String {
        self.table_metadata().map(|t| t.to_string()).unwrap_or_default()
    }

    fn record_text(&self) -> String {
        self.record().map(|r| r.to_string()).unwrap_or_default()
    }

    fn err_text(&self) -> Option<String> {
        self.err().map(|e| e.to_string())
    }
}

/// 演示流程用到的数据存储会话
#[async_trait]
pub trait DemoStore: Send + Sync {
    type Cursor: ResultCursor;

    /// 写入一个数据点，等待服务端确认
    async fn write_point(&self, point: &Point) -> InfluxResult<()>;

    /// 写入一行 line protocol 文本，等待服务端确认
    async fn write_record(&self, line: &str) -> InfluxResult<()>;

    async fn query(&self, query: &str) -> InfluxResult<Self::Cursor>;

    fn close(&self);
}

/// 为每次流程打开一个新的会话
pub trait Connector: Send + Sync {
    type Store: DemoStore;

    fn connect(&self) -> Self::Store;
}

#[derive(Debug, Clone)]
pub struct InfluxConnector {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl InfluxConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for InfluxConnector {
    fn default() -> Self {
        Self {
            url: INFLUXDB_URL.to_string(),
            token: INFLUXDB_TOKEN.to_string(),
            org: INFLUXDB_ORG.to_string(),
            bucket: INFLUXDB_BUCKET.to_string(),
        }
    }
}

impl Connector for InfluxConnector {
    type Store = InfluxStore;

    fn connect(&self) -> InfluxStore {
        let client = InfluxClient::new(&self.url, &self.token);

        InfluxStore {
            write_api: client.write_api_blocking(&self.org, &self.bucket),
            query_api: client.query_api(&self.org),
            client,
        }
    }
}

#[derive(Debug)]
pub struct InfluxStore {
    client: InfluxClient,
    write_api: WriteApiBlocking,
    query_api: QueryApi,
}

#[async_trait]
impl DemoStore for InfluxStore {
    type Cursor = QueryTableResult;

    async fn write_point(&self, point: &Point) -> InfluxResult<()> {
        self.write_api.write_point(point).await
    }

    async fn write_record(&self, line: &str) -> InfluxResult<()> {
        self.write_api.write_record(line).await
    }

    async fn query(&self, query: &str) -> InfluxResult<QueryTableResult> {
        self.query_api.query(query).await
    }

    fn close(&self) {
        self.client.close();
    }
}

/// 离开作用域时关闭会话
struct StoreGuard<S: DemoStore> {
    store: S,
}

impl<S: DemoStore> Deref for StoreGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S: DemoStore> Drop for StoreGuard<S> {
    fn drop(&mut self) {
        self.store.close();
    }
}

/// 第三个数据点的 line protocol 文本
pub fn raw_stat_line(avg: f64, max: f64) -> String {
    format!("stat,unit=temperature avg={:.6},max={:.6}", avg, max)
}

/// 使用默认配置执行演示流程，结果打印到标准输出
pub async fn run() {
    let mut out = std::io::stdout();
    run_with(&InfluxConnector::default(), &mut out).await;
}

pub async fn run_with<C: Connector, W: Write + Send>(connector: &C, out: &mut W) {
    let store = StoreGuard { store: connector.connect() };

    write_samples(&*store).await;

    if let Err(e) = query_and_report(&*store, out).await {
        log::warn!("failed to print query result: {}", e);
    }
}

fn discard(result: InfluxResult<()>, what: &str) {
    if let Err(e) = result {
        log::warn!("write {} failed: {}", what, e);
    }
}

async fn write_samples<S: DemoStore>(store: &S) {
    let p = Point::new(MEASUREMENT, [("unit", "temperature")], [("avg", 24.5), ("max", 45.0)], Utc::now());
    discard(store.write_point(&p).await, "structured point");

    let p = Point::with_measurement(MEASUREMENT)
        .add_tag("unit", "temperature")
        .add_field("avg", 23.2)
        .add_field("max", 45.0)
        .set_time(Utc::now());
    discard(store.write_point(&p).await, "fluent point");

    let line = raw_stat_line(23.5, 45.0);
    discard(store.write_record(&line).await, "line protocol record");
}

async fn query_and_report<S: DemoStore, W: Write + Send>(store: &S, out: &mut W) -> std::io::Result<()> {
    match store.query(STAT_QUERY).await {
        Ok(mut cursor) => report_rows(&mut cursor, out),
        Err(e) => {
            writeln!(out, "{}", BANNER)?;
            writeln!(out, "{}", e)?;
            writeln!(out, "{}", BANNER)
        }
    }
}

/// 打印所有的行，每个新表的第一行之前先打印表的元数据
pub fn report_rows<R: ResultCursor, W: Write>(cursor: &mut R, out: &mut W) -> std::io::Result<()> {
    while cursor.next() {
        if cursor.table_changed() {
            writeln!(out, "{}", BANNER)?;
            writeln!(out, "table: {}", cursor.table_metadata_text())?;
            writeln!(out, "{}", BANNER)?;
        }

        writeln!(out, "{}", BANNER)?;
        writeln!(out, "row: {}", cursor.record_text())?;
        writeln!(out, "{}", BANNER)?;
    }

    if let Some(e) = cursor.err_text() {
        writeln!(out, "{}", BANNER)?;
        writeln!(out, "Query error: {}", e)?;
        writeln!(out, "{}", BANNER)?;
    }

    Ok(())
}

//! Flux 查询

mod query_data;
mod result;

pub use query_data::*;
pub use result::*;

use crate::{InfluxClient, InfluxResult};

/// 某个组织下的查询接口
#[derive(Debug, Clone)]
pub struct QueryApi {
    client: InfluxClient,
    org: String,
}

impl QueryApi {
    pub(crate) fn new(client: InfluxClient, org: &str) -> Self {
        Self { client, org: org.to_string() }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// 执行 Flux 查询并返回结果游标
    pub async fn query(&self, query: &str) -> InfluxResult<QueryTableResult> {
        self.client.query(QueryRequest::new(&self.org, query)).send().await
    }
}

#[cfg(test)]
mod test_query {
    use std::time::Duration;

    use mockito::{Matcher, Server};

    use crate::{InfluxClient, error::InfluxError, model::FluxValue, test_util::setup};

    use super::{QueryRequest, QueryTableResult};

    const TWO_ROWS_CSV: &str = "\
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string
#group,false,false,true,true,false,false,true,true,true
#default,_result,,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement,unit
,,0,2024-04-01T10:00:00Z,2024-04-01T11:00:00Z,2024-04-01T10:30:00Z,24.5,avg,stat,temperature
,,0,2024-04-01T10:00:00Z,2024-04-01T11:00:00Z,2024-04-01T10:31:00Z,23.2,avg,stat,temperature

";

    fn parse(csv: &'static str) -> QueryTableResult {
        QueryTableResult::new(csv.as_bytes(), b',')
    }

    #[test]
    fn test_two_rows_in_one_table() {
        let mut result = parse(TWO_ROWS_CSV);

        assert!(result.next());
        assert!(result.table_changed());

        let meta = result.table_metadata().unwrap();
        assert_eq!(0, meta.position);
        assert_eq!(9, meta.columns.len());
        assert_eq!("_result", meta.columns[0].default_value);
        assert!(meta.columns[8].group);
        assert!(!meta.columns[5].group);
        assert_eq!("dateTime:RFC3339", meta.column(2).unwrap().data_type);
        assert!(meta.column(9).is_none());

        let record = result.record().unwrap();
        assert_eq!(Some(&FluxValue::String("_result".to_string())), record.value_by_key("result"));
        assert_eq!(Some(&FluxValue::Double(24.5)), record.value());
        assert_eq!(Some("avg"), record.field());
        assert_eq!("2024-04-01T10:30:00+00:00", record.time().unwrap().to_rfc3339());

        assert!(result.next());
        assert!(!result.table_changed());
        assert_eq!(Some(&FluxValue::Double(23.2)), result.record().unwrap().value());

        assert!(!result.next());
        assert!(result.err().is_none());
        assert!(result.record().is_none());

        // forward only
        assert!(!result.next());
    }

    #[test]
    fn test_multiple_tables() {
        let csv = "\
#datatype,string,long,string,double
#group,false,false,true,false
#default,_result,,,
,result,table,_field,_value
,,0,avg,24.5
,,1,max,45

#datatype,string,long,string,long
#group,false,false,true,false
#default,_result,,,
,result,table,_field,_value
,,2,count,3
";
        let mut result = parse(csv);

        let mut positions = vec![];
        let mut changes = vec![];
        while result.next() {
            changes.push(result.table_changed());
            positions.push(result.record().unwrap().table);
        }

        assert!(result.err().is_none());
        assert_eq!(vec![true, true, true], changes);
        assert_eq!(vec![0, 1, 2], positions);
        assert_eq!("long", result.table_metadata().unwrap().columns[3].data_type);
    }

    #[test]
    fn test_error_table() {
        let csv = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,failed to execute query: bucket not found,897
";
        let mut result = parse(csv);

        assert!(!result.next());
        assert_eq!("failed to execute query: bucket not found,897", result.err().unwrap().to_string());

        let csv = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,,
";
        let mut result = parse(csv);
        assert!(!result.next());
        assert!(matches!(result.err(), Some(InfluxError::QueryError(s)) if s == "unknown query error"));
    }

    #[test]
    fn test_parsing_errors() {
        let mut result = parse(",result,table\n,,0\n");
        assert!(!result.next());
        assert_eq!("parsing error, datatype annotation not found", result.err().unwrap().to_string());

        let csv = "\
#datatype,string,long
#group,false,false,true
";
        let mut result = parse(csv);
        assert!(!result.next());
        assert!(matches!(result.err(), Some(InfluxError::ParseError(_))));

        let csv = "\
#datatype,string,long
,result,table
,,zero
";
        let mut result = parse(csv);
        assert!(!result.next());
        assert!(matches!(result.err(), Some(InfluxError::ParseError(_))));
    }

    #[test]
    fn test_overflowing_duration_ends_cursor() {
        let csv = format!("#datatype,string,duration\n,result,d\n,,{0}h{0}h\n", "9".repeat(400));
        let mut result = QueryTableResult::new(csv.into_bytes(), b',');

        assert!(!result.next());
        assert!(matches!(result.err(), Some(InfluxError::ParseError(_))));
    }

    #[test]
    fn test_empty_result() {
        let mut result = parse("\r\n");
        assert!(!result.next());
        assert!(result.err().is_none());
        assert!(result.table_metadata().is_none());
    }

    async fn test_query_api_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::UrlEncoded("org".to_string(), "some-org".to_string()))
            .match_header("authorization", "Token some-token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJsonString(
                r#"{"query":"from(bucket:\"b\") |> range(start: -1h)","type":"flux","dialect":{"annotations":["datatype","group","default"],"delimiter":",","header":true}}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_body(TWO_ROWS_CSV)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let query_api = client.query_api("some-org");

        let mut result = query_api.query(r#"from(bucket:"b") |> range(start: -1h)"#).await.unwrap();

        let mut rows = 0;
        while result.next() {
            log::debug!("row: {}", result.record().unwrap());
            rows += 1;
        }

        assert_eq!(2, rows);
        assert!(result.err().is_none());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_api() {
        test_query_api_impl().await;
    }

    async fn test_query_api_failure_impl() {
        setup();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":"invalid","message":"compilation failed: error at @1:1-1:5: undefined identifier frm"}"#)
            .create_async()
            .await;

        let client = InfluxClient::new(server.url(), "some-token");
        let resp = client.query(QueryRequest::new("some-org", "frm()")).timeout(Duration::from_secs(5)).send().await;

        assert!(matches!(resp, Err(InfluxError::ApiError(_))));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_api_failure() {
        test_query_api_failure_impl().await;
    }
}

use std::{collections::BTreeMap, fmt::Display};

use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::{InfluxResult, error::InfluxError, util::parse_duration};

/// Flux 查询结果中的值
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FluxValue {
    #[default]
    Null,
    String(String),
    Long(i64),
    UnsignedLong(u64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Base64Binary(Vec<u8>),
}

impl FluxValue {
    /// 按照 annotated CSV 中 `#datatype` 标注的类型解析单元格文本。
    /// 空字符串解析为 `Null`，未知的类型原样保留为字符串
    pub fn parse(s: &str, data_type: &str, column_name: &str) -> InfluxResult<Self> {
        if s.is_empty() {
            return Ok(Self::Null);
        }

        let invalid = |e: &dyn Display| InfluxError::ParseError(format!("invalid {} value {:?} of column {}: {}", data_type, s, column_name, e));

        let v = match data_type {
            "string" => Self::String(s.to_string()),
            "long" => Self::Long(s.parse().map_err(|e| invalid(&e))?),
            "unsignedLong" => Self::UnsignedLong(s.parse().map_err(|e| invalid(&e))?),
            "double" => match s {
                "+Inf" => Self::Double(f64::INFINITY),
                "-Inf" => Self::Double(f64::NEG_INFINITY),
                _ => Self::Double(s.parse().map_err(|e| invalid(&e))?),
            },
            "boolean" => Self::Boolean(s.eq_ignore_ascii_case("true")),
            "dateTime:RFC3339" | "dateTime:RFC3339Nano" => Self::DateTime(DateTime::parse_from_rfc3339(s).map_err(|e| invalid(&e))?),
            "duration" => Self::Duration(parse_duration(s).ok_or_else(|| invalid(&"malformed duration"))?),
            "base64Binary" => Self::Base64Binary(BASE64_STANDARD.decode(s).map_err(|e| invalid(&e))?),
            _ => Self::String(s.to_string()),
        };

        Ok(v)
    }
}

impl Display for FluxValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "<nil>"),
            Self::String(s) => write!(f, "{}", s),
            Self::Long(n) => write!(f, "{}", n),
            Self::UnsignedLong(n) => write!(f, "{}", n),
            Self::Double(d) => write!(f, "{}", d),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Duration(d) => write!(f, "{}", d),
            Self::Base64Binary(bytes) => write!(f, "{}", BASE64_STANDARD.encode(bytes)),
        }
    }
}

/// 查询结果表中的一列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluxColumn {
    pub index: usize,
    pub name: String,
    pub data_type: String,
    pub group: bool,
    pub default_value: String,
}

impl FluxColumn {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }
}

impl Display for FluxColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}: name: {}, datatype: {}, defaultValue: {}, group: {}}}",
            self.index, self.name, self.data_type, self.default_value, self.group
        )
    }
}

/// 查询结果表的元数据：表的位置和所有的列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluxTableMetadata {
    pub position: usize,
    pub columns: Vec<FluxColumn>,
}

impl FluxTableMetadata {
    pub fn new(position: usize, column_count: usize) -> Self {
        Self {
            position,
            columns: (0..column_count).map(FluxColumn::new).collect(),
        }
    }

    pub fn column(&self, index: usize) -> Option<&FluxColumn> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&FluxColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl Display for FluxTableMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.columns.iter().map(|c| format!("col{}", c)).collect::<Vec<_>>().join(",");

        write!(f, "{}", s)
    }
}

/// 查询结果中的一行数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxRecord {
    /// 所属表的位置
    pub table: usize,

    /// 列名到值的映射
    pub values: BTreeMap<String, FluxValue>,
}

impl FluxRecord {
    pub fn new(table: usize, values: BTreeMap<String, FluxValue>) -> Self {
        Self { table, values }
    }

    pub fn value_by_key(&self, key: &str) -> Option<&FluxValue> {
        self.values.get(key)
    }

    fn time_by_key(&self, key: &str) -> Option<&DateTime<FixedOffset>> {
        match self.values.get(key) {
            Some(FluxValue::DateTime(t)) => Some(t),
            _ => None,
        }
    }

    fn string_by_key(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FluxValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// `_start` 列
    pub fn start(&self) -> Option<&DateTime<FixedOffset>> {
        self.time_by_key("_start")
    }

    /// `_stop` 列
    pub fn stop(&self) -> Option<&DateTime<FixedOffset>> {
        self.time_by_key("_stop")
    }

    /// `_time` 列
    pub fn time(&self) -> Option<&DateTime<FixedOffset>> {
        self.time_by_key("_time")
    }

    /// `_value` 列
    pub fn value(&self) -> Option<&FluxValue> {
        self.values.get("_value")
    }

    /// `_field` 列
    pub fn field(&self) -> Option<&str> {
        self.string_by_key("_field")
    }

    /// `_measurement` 列
    pub fn measurement(&self) -> Option<&str> {
        self.string_by_key("_measurement")
    }
}

impl Display for FluxRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.values.iter().map(|(k, v)| format!("{}:{}", k, v)).collect::<Vec<_>>().join(",");

        write!(f, "{}", s)
    }
}

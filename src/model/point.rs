use std::{collections::BTreeMap, fmt::Display};

use chrono::{DateTime, Utc};

use crate::{InfluxResult, error::InfluxError, write::WritePrecision};

/// 数据点的字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(value as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInteger(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::UInteger(value as u64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// 按照 line protocol 的格式输出字段值
impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(d) => write!(f, "{}", d),
            Self::Integer(n) => write!(f, "{}i", n),
            Self::UInteger(n) => write!(f, "{}u", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "\"{}\"", escape(s, &['\\', '"'])),
        }
    }
}

fn escape(s: &str, special_chars: &[char]) -> String {
    let mut ret = String::with_capacity(s.len());

    for c in s.chars() {
        if special_chars.contains(&c) {
            ret.push('\\');
        }
        ret.push(c);
    }

    ret
}

const MEASUREMENT_SPECIAL_CHARS: &[char] = &[',', ' '];
const KEY_SPECIAL_CHARS: &[char] = &[',', '=', ' '];

/// 一个时序数据点：度量名称、标签、字段和时间戳。
///
/// 标签和字段都按照 key 排序，相同的 key 后写入的覆盖先写入的。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    /// 度量名称
    pub measurement: String,

    /// 标签
    pub tags: BTreeMap<String, String>,

    /// 字段
    pub fields: BTreeMap<String, FieldValue>,

    /// 时间戳。没有设置的时候由服务端使用写入时间
    pub time: Option<DateTime<Utc>>,
}

impl Point {
    /// 一次性给出度量名称、标签、字段和时间戳
    pub fn new(
        measurement: impl Into<String>,
        tags: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<FieldValue>)>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            time: Some(time),
        }
    }

    /// 以 fluent 风格构建数据点，先设置度量名称
    pub fn with_measurement(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            ..Default::default()
        }
    }

    /// 添加/更新一个标签
    pub fn add_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 添加/更新一个字段
    pub fn add_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 设置时间戳
    pub fn set_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|s| s.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub(crate) fn validate(&self) -> InfluxResult<()> {
        if self.measurement.is_empty() {
            return Err(InfluxError::ValidationFailed("measurement can not be empty".to_string()));
        }

        if self.fields.is_empty() {
            return Err(InfluxError::ValidationFailed(format!("point of measurement {} has no fields", self.measurement)));
        }

        let names = std::iter::once(&self.measurement).chain(self.tags.keys()).chain(self.tags.values()).chain(self.fields.keys());
        for name in names {
            if name.contains('\n') {
                return Err(InfluxError::ValidationFailed(format!("line break is not allowed in name: {:?}", name)));
            }
        }

        if self.tags.keys().any(|k| k.is_empty()) || self.fields.keys().any(|k| k.is_empty()) {
            return Err(InfluxError::ValidationFailed("tag key and field key can not be empty".to_string()));
        }

        for (k, v) in &self.fields {
            if let FieldValue::Float(d) = v {
                if !d.is_finite() {
                    return Err(InfluxError::ValidationFailed(format!("invalid value of field {}: {}", k, d)));
                }
            }
        }

        Ok(())
    }

    /// 编码为一行 line protocol 文本（不带换行符）。
    ///
    /// 值为空字符串的标签会被忽略
    pub fn to_line_protocol(&self, precision: WritePrecision) -> InfluxResult<String> {
        self.validate()?;

        let mut line = escape(&self.measurement, MEASUREMENT_SPECIAL_CHARS);

        for (k, v) in self.tags.iter().filter(|(_, v)| !v.is_empty()) {
            line.push(',');
            line.push_str(&escape(k, KEY_SPECIAL_CHARS));
            line.push('=');
            line.push_str(&escape(v, KEY_SPECIAL_CHARS));
        }

        let fields = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k, KEY_SPECIAL_CHARS), v))
            .collect::<Vec<_>>()
            .join(",");

        line.push(' ');
        line.push_str(&fields);

        if let Some(t) = &self.time {
            let ts = precision
                .timestamp(t)
                .ok_or_else(|| InfluxError::ValidationFailed(format!("timestamp out of range: {}", t)))?;
            line.push(' ');
            line.push_str(&ts.to_string());
        }

        Ok(line)
    }
}

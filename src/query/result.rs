use std::{collections::BTreeMap, io::Cursor};

use bytes::Bytes;
use csv::StringRecord;

use crate::{
    InfluxResult,
    error::InfluxError,
    model::{FluxRecord, FluxTableMetadata, FluxValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsingState {
    /// 正在读取数据行
    Normal,

    /// 正在读取表头之前的标注行
    Annotation,

    /// 表头是 `error,reference` 的错误表，下一行是错误信息
    Error,
}

/// Flux 查询结果游标。
///
/// 响应体是 annotated CSV，只能向前遍历一次：每次调用 [`QueryTableResult::next`] 解析一行数据。
/// 遍历结束后通过 [`QueryTableResult::err`] 检查是否因为错误而结束
#[derive(Debug)]
pub struct QueryTableResult {
    reader: csv::Reader<Cursor<Bytes>>,
    state: ParsingState,
    datatype_found: bool,
    next_position: usize,
    table: Option<FluxTableMetadata>,
    table_changed: bool,
    last_table_id: Option<String>,
    record: Option<FluxRecord>,
    err: Option<InfluxError>,
    finished: bool,
}

impl QueryTableResult {
    pub fn new(body: impl Into<Bytes>, delimiter: u8) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(Cursor::new(body.into()));

        Self {
            reader,
            state: ParsingState::Normal,
            datatype_found: false,
            next_position: 0,
            table: None,
            table_changed: false,
            last_table_id: None,
            record: None,
            err: None,
            finished: false,
        }
    }

    /// 前进到下一行数据。没有更多数据或者发生错误的时候返回 `false`
    pub fn next(&mut self) -> bool {
        if self.finished {
            return false;
        }

        self.table_changed = false;

        match self.advance() {
            Ok(true) => true,
            Ok(false) => {
                self.finish();
                false
            }
            Err(e) => {
                log::debug!("query result parsing stopped: {}", e);
                self.err = Some(e);
                self.finish();
                false
            }
        }
    }

    /// 当前行是否是一个新表的第一行
    pub fn table_changed(&self) -> bool {
        self.table_changed
    }

    /// 当前表的元数据
    pub fn table_metadata(&self) -> Option<&FluxTableMetadata> {
        self.table.as_ref()
    }

    /// 当前行
    pub fn record(&self) -> Option<&FluxRecord> {
        self.record.as_ref()
    }

    /// 遍历结束的原因，`None` 表示正常结束
    pub fn err(&self) -> Option<&InfluxError> {
        self.err.as_ref()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.record = None;
    }

    fn advance(&mut self) -> InfluxResult<bool> {
        let mut row = StringRecord::new();

        loop {
            if !self.reader.read_record(&mut row)? {
                return Ok(false);
            }

            // empty lines between tables
            if row.len() <= 1 {
                continue;
            }

            if row[0].starts_with('#') {
                self.read_annotation(&row)?;
                continue;
            }

            if !self.datatype_found {
                return Err(InfluxError::ParseError("parsing error, datatype annotation not found".to_string()));
            }

            match self.state {
                ParsingState::Annotation => {
                    if &row[1] == "error" {
                        self.state = ParsingState::Error;
                    } else {
                        self.read_header(&row)?;
                        self.state = ParsingState::Normal;
                    }
                }

                ParsingState::Error => {
                    let message = row.get(1).filter(|s| !s.is_empty()).unwrap_or("unknown query error");
                    let reference = row.get(2).filter(|s| !s.is_empty()).map(|s| format!(",{}", s)).unwrap_or_default();

                    return Err(InfluxError::QueryError(format!("{}{}", message, reference)));
                }

                ParsingState::Normal => {
                    let record = self.read_record(&row)?;
                    self.record = Some(record);
                    return Ok(true);
                }
            }
        }
    }

    /// 标注行之前如果是数据行，说明开始了一个新表
    fn start_table(&mut self, column_count: usize) {
        self.table = Some(FluxTableMetadata::new(self.next_position, column_count));
        self.next_position += 1;
        self.table_changed = true;
        self.state = ParsingState::Annotation;
        self.datatype_found = false;
        self.last_table_id = None;
    }

    fn read_annotation(&mut self, row: &StringRecord) -> InfluxResult<()> {
        if self.state == ParsingState::Normal {
            self.start_table(row.len() - 1);
        }

        let table = self
            .table
            .as_mut()
            .ok_or_else(|| InfluxError::ParseError("parsing error, annotations not found".to_string()))?;
        check_column_count(row, table)?;

        let cells = row.iter().skip(1);

        match &row[0] {
            "#datatype" => {
                table.columns.iter_mut().zip(cells).for_each(|(c, v)| c.data_type = v.to_string());
                self.datatype_found = true;
            }

            "#group" => {
                table.columns.iter_mut().zip(cells).for_each(|(c, v)| c.group = v == "true");
            }

            "#default" => {
                table.columns.iter_mut().zip(cells).for_each(|(c, v)| c.default_value = v.to_string());
            }

            other => {
                log::debug!("ignore unknown annotation: {}", other);
            }
        }

        Ok(())
    }

    fn read_header(&mut self, row: &StringRecord) -> InfluxResult<()> {
        let table = self
            .table
            .as_mut()
            .ok_or_else(|| InfluxError::ParseError("parsing error, annotations not found".to_string()))?;
        check_column_count(row, table)?;

        table.columns.iter_mut().zip(row.iter().skip(1)).for_each(|(c, name)| c.name = name.to_string());

        Ok(())
    }

    fn read_record(&mut self, row: &StringRecord) -> InfluxResult<FluxRecord> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| InfluxError::ParseError("parsing error, annotations not found".to_string()))?;
        check_column_count(row, table)?;

        let mut table_id = None;
        let mut values = BTreeMap::new();

        for (column, cell) in table.columns.iter().zip(row.iter().skip(1)) {
            let raw = if cell.is_empty() { column.default_value.as_str() } else { cell };

            if column.name == "table" {
                table_id = Some(raw.to_string());
            }

            values.insert(column.name.clone(), FluxValue::parse(raw, &column.data_type, &column.name)?);
        }

        // Several tables may share one annotation block, distinguished by the `table` column
        if let (Some(id), Some(last)) = (&table_id, &self.last_table_id) {
            if id != last {
                if let Some(table) = &mut self.table {
                    table.position = self.next_position;
                }
                self.next_position += 1;
                self.table_changed = true;
            }
        }
        self.last_table_id = table_id;

        let position = self.table.as_ref().map(|t| t.position).unwrap_or_default();

        Ok(FluxRecord::new(position, values))
    }
}

fn check_column_count(row: &StringRecord, table: &FluxTableMetadata) -> InfluxResult<()> {
    if row.len() - 1 != table.columns.len() {
        return Err(InfluxError::ParseError(format!(
            "parsing error, row has different number of columns than the table: {} vs {}",
            row.len() - 1,
            table.columns.len()
        )));
    }

    Ok(())
}

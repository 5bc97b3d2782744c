// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow::compute::kernels::cast_utils::Parser;
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;

use crate::common::types::{ColumnDesc, ConnectionProfile};
use crate::error::QuarryError;
use crate::exec::schema::{SchemaResolver, truncate_time_columns};
use crate::exec::table::MaterializedTable;
use crate::exec::convert::Converter;
use crate::fs::path::{ResultShape, classify_result_shape, resolve_file};
use crate::fs::io_block_on;
use crate::quarry_logging::debug;

/// Quoting behavior of the delimited source. All modes except `None` read
/// identically (double-quote enclosed fields, doubled-quote escapes); `None`
/// turns quote handling off entirely.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum QuoteMode {
    #[default]
    Minimal,
    All,
    NonNumeric,
    None,
}

/// Stock null tokens, applied on top of `na_values` only when
/// `keep_default_na` is set.
pub const DEFAULT_NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Clone, Debug)]
pub struct TextReadOptions {
    pub quoting: QuoteMode,
    /// When set, the stock null-token list applies in addition to
    /// `na_values`. Off by default: only `na_values` marks nulls.
    pub keep_default_na: bool,
    pub na_values: Vec<String>,
}

impl Default for TextReadOptions {
    fn default() -> Self {
        Self {
            quoting: QuoteMode::default(),
            keep_default_na: false,
            na_values: vec![String::new()],
        }
    }
}

impl TextReadOptions {
    fn effective_na_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.na_values.iter().map(String::as_str).collect();
        if self.keep_default_na {
            for token in DEFAULT_NA_TOKENS {
                if !tokens.contains(token) {
                    tokens.push(token);
                }
            }
        }
        tokens
    }
}

/// Materializes the row-oriented text output of a plain `SELECT` execution.
///
/// `.txt` is tab-separated without a header (names come from the
/// description); `.csv` is comma-separated with a header row. Any other
/// suffix produces an empty table: statements like DDL succeed without
/// writing a readable result file.
pub fn read_text_result(
    location: &str,
    profile: &ConnectionProfile,
    description: &[ColumnDesc],
    converter: &dyn Converter,
    options: &TextReadOptions,
) -> Result<MaterializedTable, QuarryError> {
    if location.trim().is_empty() {
        return Err(QuarryError::InvalidConfig(
            "output location is unset".to_string(),
        ));
    }
    let shape = classify_result_shape(location);
    if shape == ResultShape::Other {
        return Ok(MaterializedTable::empty());
    }

    let (op, rel) =
        resolve_file(location, profile).map_err(|e| QuarryError::read_msg(location, e))?;

    let meta = io_block_on(op.stat(&rel))
        .map_err(|e| QuarryError::read_msg(location, e))?
        .map_err(|e| QuarryError::read(location, e))?;
    if meta.content_length() == 0 {
        return Ok(MaterializedTable::empty());
    }

    debug!("reading text result: location={location} shape={shape:?}");
    let buffer = io_block_on(op.read(&rel))
        .map_err(|e| QuarryError::read_msg(location, e))?
        .map_err(|e| QuarryError::read(location, e))?;
    let content = String::from_utf8(buffer.to_bytes().to_vec())
        .map_err(|e| QuarryError::read(location, e))?;

    parse_text_result(&content, shape, description, converter, options)
        .map_err(|e| QuarryError::read_msg(location, e))
}

fn parse_text_result(
    content: &str,
    shape: ResultShape,
    description: &[ColumnDesc],
    converter: &dyn Converter,
    options: &TextReadOptions,
) -> Result<MaterializedTable, String> {
    let quote = match options.quoting {
        QuoteMode::None => None,
        _ => Some(b'"'),
    };
    let delimiter = match shape {
        ResultShape::Csv => b',',
        ResultShape::Tsv => b'\t',
        ResultShape::Other => unreachable!("classified before parsing"),
    };

    let mut records = split_records(content, quote);

    let names: Vec<String> = match shape {
        ResultShape::Tsv => description.iter().map(|d| d.name.clone()).collect(),
        ResultShape::Csv => {
            if records.is_empty() {
                return Ok(MaterializedTable::empty());
            }
            let header = records.remove(0);
            let header_fields = parse_record(&header, delimiter, quote, 0)?;
            if description.is_empty() {
                header_fields
                    .into_iter()
                    .map(|f| f.unwrap_or_default())
                    .collect()
            } else {
                if header_fields.len() != description.len() {
                    return Err(format!(
                        "csv header column count mismatch: expected={} actual={}",
                        description.len(),
                        header_fields.len()
                    ));
                }
                description.iter().map(|d| d.name.clone()).collect()
            }
        }
        ResultShape::Other => unreachable!("classified before parsing"),
    };
    if names.is_empty() {
        return Ok(MaterializedTable::empty());
    }

    let na_tokens = options.effective_na_tokens();
    let mut columns: Vec<Vec<Option<String>>> = (0..names.len()).map(|_| Vec::new()).collect();
    for (record_idx, record) in records.iter().enumerate() {
        // A blank line is a row of nulls, not a record separator.
        if record.is_empty() {
            for column in columns.iter_mut() {
                column.push(None);
            }
            continue;
        }
        let fields = parse_record(record, delimiter, quote, record_idx)?;
        if fields.len() != names.len() {
            return Err(format!(
                "column count mismatch: expected={} actual={} row_index={}",
                names.len(),
                fields.len(),
                record_idx
            ));
        }
        for (idx, field) in fields.into_iter().enumerate() {
            let value = field.filter(|v| !na_tokens.contains(&v.as_str()));
            columns[idx].push(value);
        }
    }

    let batch = build_typed_batch(&names, columns, description, converter)?;
    let batch = truncate_time_columns(description, batch)?;
    let schema = batch.schema();
    Ok(MaterializedTable::new(schema, vec![batch]))
}

/// Splits raw content into physical records, preserving interior blank lines
/// and newlines embedded in quoted fields. One trailing empty record from a
/// final newline is not a row.
fn split_records(content: &str, quote: Option<u8>) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in content.chars() {
        match ch {
            '"' if quote == Some(b'"') => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '\n' if !in_quotes => {
                if current.ends_with('\r') {
                    current.pop();
                }
                records.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        if current.ends_with('\r') {
            current.pop();
        }
        records.push(current);
    }
    records
}

fn parse_record(
    record: &str,
    delimiter: u8,
    quote: Option<u8>,
    record_idx: usize,
) -> Result<Vec<Option<String>>, String> {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true);
    match quote {
        Some(q) => {
            builder.quoting(true).quote(q);
        }
        None => {
            builder.quoting(false);
        }
    }
    let mut reader = builder.from_reader(record.as_bytes());
    let mut out = Vec::new();
    for parsed in reader.records() {
        let parsed =
            parsed.map_err(|e| format!("failed to parse record at row_index={record_idx}: {e}"))?;
        for field in parsed.iter() {
            out.push(Some(field.to_string()));
        }
    }
    Ok(out)
}

fn build_typed_batch(
    names: &[String],
    columns: Vec<Vec<Option<String>>>,
    description: &[ColumnDesc],
    converter: &dyn Converter,
) -> Result<RecordBatch, String> {
    let resolver = SchemaResolver::new(description, converter);
    let dtypes = resolver.dtypes();
    let converters = resolver.converters();
    let parse_dates = resolver.parse_dates();

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());
    for (name, values) in names.iter().zip(columns.into_iter()) {
        let (data_type, array) = if let Some(convert) = converters.get(name) {
            let converted = values
                .iter()
                .map(|v| convert(v.as_deref()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("conversion failed for column `{name}`: {e}"))?;
            (
                DataType::Utf8,
                Arc::new(StringArray::from(converted)) as ArrayRef,
            )
        } else if parse_dates.contains(name) {
            let parsed = values
                .iter()
                .map(|v| {
                    v.as_deref()
                        .map(parse_timestamp_value)
                        .transpose()
                        .map_err(|e| format!("column `{name}`: {e}"))
                })
                .collect::<Result<Vec<_>, String>>()?;
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(parsed)) as ArrayRef,
            )
        } else if let Some(target) = dtypes.get(name) {
            let raw = Arc::new(StringArray::from(values)) as ArrayRef;
            let options = CastOptions {
                safe: false,
                ..CastOptions::default()
            };
            let array = cast_with_options(raw.as_ref(), target, &options)
                .map_err(|e| format!("cast column `{name}` to {target:?} failed: {e}"))?;
            (target.clone(), array)
        } else {
            (
                DataType::Utf8,
                Arc::new(StringArray::from(values)) as ArrayRef,
            )
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| e.to_string())
}

/// Parses one date/time-flavored text value into epoch microseconds.
/// Time-only values get the conventional 1900-01-01 date; the truncation
/// pass removes it again for `time` columns.
fn parse_timestamp_value(raw: &str) -> Result<i64, String> {
    let value = raw.trim();
    let value = value.strip_suffix(" UTC").unwrap_or(value);

    if let Ok(ts) = chrono::DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %:z") {
        return Ok(ts.naive_utc().and_utc().timestamp_micros());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc().timestamp_micros());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(dt.and_utc().timestamp_micros());
    }
    let time_value = value
        .rsplit_once(' ')
        .map(|(head, _tz)| head)
        .filter(|head| NaiveTime::parse_from_str(head, "%H:%M:%S%.f").is_ok())
        .unwrap_or(value);
    if let Ok(time) = NaiveTime::parse_from_str(time_value, "%H:%M:%S%.f") {
        let base = NaiveDate::from_ymd_opt(1900, 1, 1).expect("valid base date");
        return Ok(base.and_time(time).and_utc().timestamp_micros());
    }
    // Last resort: Arrow's own timestamp syntax, which covers offsets like
    // `+09:00` without a space separator.
    if let Some(micros) =
        arrow::datatypes::TimestampMicrosecondType::parse(value)
    {
        return Ok(micros);
    }
    Err(format!("unrecognized date/time value: `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::LogicalType;
    use crate::exec::convert::StandardConverter;
    use crate::exec::value::{Cell, cell_at};

    fn description() -> Vec<ColumnDesc> {
        vec![
            ColumnDesc::new("id", LogicalType::BigInt),
            ColumnDesc::new("name", LogicalType::Varchar),
        ]
    }

    #[test]
    fn split_records_preserves_interior_blank_lines() {
        let records = split_records("a\t1\n\nb\t2\n", Some(b'"'));
        assert_eq!(records, vec!["a\t1", "", "b\t2"]);
    }

    #[test]
    fn split_records_keeps_quoted_newlines_in_one_record() {
        let records = split_records("\"a\nb\",1\nc,2\n", Some(b'"'));
        assert_eq!(records, vec!["\"a\nb\",1", "c,2"]);
    }

    #[test]
    fn split_records_drops_only_the_trailing_newline() {
        assert_eq!(split_records("a\n", Some(b'"')), vec!["a"]);
        assert_eq!(split_records("a", Some(b'"')), vec!["a"]);
        assert_eq!(split_records("a\n\n", Some(b'"')), vec!["a", ""]);
    }

    #[test]
    fn tsv_blank_line_becomes_null_row() {
        let converter = StandardConverter::new();
        let table = parse_text_result(
            "1\talpha\n\n3\tgamma\n",
            ResultShape::Tsv,
            &description(),
            &converter,
            &TextReadOptions::default(),
        )
        .expect("parse tsv");
        assert_eq!(table.num_rows(), 3);
        let batch = &table.batches()[0];
        assert_eq!(cell_at(batch.column(0).as_ref(), 1), Cell::Null);
        assert_eq!(cell_at(batch.column(1).as_ref(), 1), Cell::Null);
        assert_eq!(cell_at(batch.column(0).as_ref(), 2), Cell::Int64(3));
    }

    #[test]
    fn csv_header_consumed_and_description_names_win() {
        let converter = StandardConverter::new();
        let table = parse_text_result(
            "\"id\",\"name\"\n\"1\",\"alpha\"\n",
            ResultShape::Csv,
            &description(),
            &converter,
            &TextReadOptions::default(),
        )
        .expect("parse csv");
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column_names(), vec!["id", "name"]);
        let batch = &table.batches()[0];
        assert_eq!(cell_at(batch.column(0).as_ref(), 0), Cell::Int64(1));
    }

    #[test]
    fn empty_string_is_null_by_default_but_null_token_is_not() {
        let converter = StandardConverter::new();
        let description = vec![
            ColumnDesc::new("a", LogicalType::Varchar),
            ColumnDesc::new("b", LogicalType::Varchar),
        ];
        let table = parse_text_result(
            "a,b\n\"\",\"NULL\"\n",
            ResultShape::Csv,
            &description,
            &converter,
            &TextReadOptions::default(),
        )
        .expect("parse csv");
        let batch = &table.batches()[0];
        assert_eq!(cell_at(batch.column(0).as_ref(), 0), Cell::Null);
        assert_eq!(
            cell_at(batch.column(1).as_ref(), 0),
            Cell::Utf8("NULL".to_string())
        );
    }

    #[test]
    fn keep_default_na_applies_stock_tokens() {
        let converter = StandardConverter::new();
        let description = vec![ColumnDesc::new("a", LogicalType::Varchar)];
        let options = TextReadOptions {
            keep_default_na: true,
            ..TextReadOptions::default()
        };
        let table = parse_text_result(
            "a\n\"NULL\"\n",
            ResultShape::Csv,
            &description,
            &converter,
            &options,
        )
        .expect("parse csv");
        assert_eq!(
            cell_at(table.batches()[0].column(0).as_ref(), 0),
            Cell::Null
        );
    }

    #[test]
    fn time_columns_truncate_to_time_of_day() {
        let converter = StandardConverter::new();
        let description = vec![ColumnDesc::new("wake_up", LogicalType::Time)];
        let table = parse_text_result(
            "wake_up\n\"11:30:05.000\"\n",
            ResultShape::Csv,
            &description,
            &converter,
            &TextReadOptions::default(),
        )
        .expect("parse csv");
        let expected = NaiveTime::from_hms_opt(11, 30, 5).expect("valid time");
        assert_eq!(
            cell_at(table.batches()[0].column(0).as_ref(), 0),
            Cell::Time(expected)
        );
    }

    #[test]
    fn parse_timestamp_value_accepts_common_forms() {
        assert!(parse_timestamp_value("2021-09-02 12:34:56.789").is_ok());
        assert!(parse_timestamp_value("2021-09-02").is_ok());
        assert!(parse_timestamp_value("2021-09-02 12:34:56.789 UTC").is_ok());
        assert!(parse_timestamp_value("not a timestamp").is_err());
    }

    #[test]
    fn malformed_numeric_cell_is_an_error() {
        let converter = StandardConverter::new();
        let err = parse_text_result(
            "1\talpha\nx\tbeta\n",
            ResultShape::Tsv,
            &description(),
            &converter,
            &TextReadOptions::default(),
        )
        .expect_err("bad integer should fail the parse");
        assert!(err.contains("id"));
    }
}

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
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, RecordBatch, Time64MicrosecondArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use crate::common::types::{ColumnDesc, LogicalType};
use crate::exec::convert::{ConvertFn, Converter};

const MICROS_PER_DAY: i64 = 86_400_000_000;

pub fn is_parse_date(logical: &LogicalType) -> bool {
    matches!(
        logical,
        LogicalType::Date
            | LogicalType::Time
            | LogicalType::TimeWithTimeZone
            | LogicalType::Timestamp
            | LogicalType::TimestampWithTimeZone
    )
}

fn is_time_of_day(logical: &LogicalType) -> bool {
    matches!(logical, LogicalType::Time | LogicalType::TimeWithTimeZone)
}

/// Derives the per-column materialization plan from the description and the
/// injected converter. The three views are recomputed on every access; they
/// are cheap and side-effect free.
pub struct SchemaResolver<'a> {
    description: &'a [ColumnDesc],
    converter: &'a dyn Converter,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(description: &'a [ColumnDesc], converter: &'a dyn Converter) -> Self {
        Self {
            description,
            converter,
        }
    }

    /// Column name to target physical type, restricted to logical types the
    /// converter recognizes.
    pub fn dtypes(&self) -> HashMap<String, DataType> {
        self.description
            .iter()
            .filter_map(|d| {
                self.converter
                    .target_type(&d.logical_type)
                    .map(|t| (d.name.clone(), t))
            })
            .collect()
    }

    /// Column name to value parser, restricted to logical types with a
    /// registered conversion.
    pub fn converters(&self) -> HashMap<String, ConvertFn> {
        self.description
            .iter()
            .filter(|d| self.converter.has_mapping(&d.logical_type))
            .map(|d| (d.name.clone(), self.converter.get(&d.logical_type)))
            .collect()
    }

    /// Ordered names of date/time-flavored columns, parsed as timestamps by
    /// the text materializer.
    pub fn parse_dates(&self) -> Vec<String> {
        self.description
            .iter()
            .filter(|d| is_parse_date(&d.logical_type))
            .map(|d| d.name.clone())
            .collect()
    }
}

/// Rebuilds `time`/`time with time zone` columns as time-of-day arrays.
/// The text parse stage materializes them as full timestamps first (time-only
/// source text gets the conventional 1900-01-01 date); without this pass that
/// placeholder date would leak into fetched rows.
pub fn truncate_time_columns(
    description: &[ColumnDesc],
    batch: RecordBatch,
) -> Result<RecordBatch, String> {
    let time_names: Vec<&str> = description
        .iter()
        .filter(|d| is_time_of_day(&d.logical_type))
        .map(|d| d.name.as_str())
        .collect();
    if time_names.is_empty() {
        return Ok(batch);
    }

    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (idx, field) in schema.fields().iter().enumerate() {
        let column = batch.column(idx);
        if !time_names.contains(&field.name().as_str())
            || field.data_type() != &DataType::Timestamp(TimeUnit::Microsecond, None)
        {
            fields.push(field.clone());
            columns.push(column.clone());
            continue;
        }

        let source = column
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| format!("time column `{}` is not a timestamp array", field.name()))?;
        let truncated: Time64MicrosecondArray = source
            .iter()
            .map(|v| v.map(|micros| micros.rem_euclid(MICROS_PER_DAY)))
            .collect();
        fields.push(Arc::new(Field::new(
            field.name(),
            DataType::Time64(TimeUnit::Microsecond),
            field.is_nullable(),
        )));
        columns.push(Arc::new(truncated) as ArrayRef);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, columns).map_err(|e| e.to_string())
}

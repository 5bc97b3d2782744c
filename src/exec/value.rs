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
use std::fmt;

use arrow::array::{
    Array, BooleanArray, Date32Array, Decimal128Array, Float32Array, Float64Array, Int8Array,
    Int16Array, Int32Array, Int64Array, LargeStringArray, StringArray, Time32MillisecondArray,
    Time32SecondArray, Time64MicrosecondArray, Time64NanosecondArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::temporal_conversions::{
    date32_to_datetime, time32ms_to_time, time32s_to_time, time64ns_to_time, time64us_to_time,
    timestamp_ms_to_datetime, timestamp_ns_to_datetime, timestamp_s_to_datetime,
    timestamp_us_to_datetime,
};
use arrow::util::display::array_value_to_string;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One scalar of a fetched row. Fetched rows are `Vec<Cell>` in column order.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Boolean(v) => write!(f, "{v}"),
            Cell::Int8(v) => write!(f, "{v}"),
            Cell::Int16(v) => write!(f, "{v}"),
            Cell::Int32(v) => write!(f, "{v}"),
            Cell::Int64(v) => write!(f, "{v}"),
            Cell::Float32(v) => write!(f, "{v}"),
            Cell::Float64(v) => write!(f, "{v}"),
            Cell::Utf8(v) => f.write_str(v),
            Cell::Date(v) => write!(f, "{v}"),
            Cell::Time(v) => write!(f, "{v}"),
            Cell::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! primitive_cell {
    ($array:expr, $row:expr, $arrow_ty:ty, $variant:ident) => {{
        let arr = $array
            .as_any()
            .downcast_ref::<$arrow_ty>()
            .expect("array type checked by data_type match");
        Cell::$variant(arr.value($row))
    }};
}

/// Extracts one scalar from an array. Types outside the supported set fall
/// back to their display form as text; this keeps row access total over any
/// table a reader can produce.
pub fn cell_at(array: &dyn Array, row: usize) -> Cell {
    if array.is_null(row) {
        return Cell::Null;
    }
    match array.data_type() {
        DataType::Boolean => primitive_cell!(array, row, BooleanArray, Boolean),
        DataType::Int8 => primitive_cell!(array, row, Int8Array, Int8),
        DataType::Int16 => primitive_cell!(array, row, Int16Array, Int16),
        DataType::Int32 => primitive_cell!(array, row, Int32Array, Int32),
        DataType::Int64 => primitive_cell!(array, row, Int64Array, Int64),
        DataType::Float32 => primitive_cell!(array, row, Float32Array, Float32),
        DataType::Float64 => primitive_cell!(array, row, Float64Array, Float64),
        DataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("array type checked by data_type match");
            Cell::Utf8(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .expect("array type checked by data_type match");
            Cell::Utf8(arr.value(row).to_string())
        }
        DataType::Date32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .expect("array type checked by data_type match");
            match date32_to_datetime(arr.value(row)) {
                Some(dt) => Cell::Date(dt.date()),
                None => Cell::Null,
            }
        }
        DataType::Time32(TimeUnit::Second) => {
            let arr = array
                .as_any()
                .downcast_ref::<Time32SecondArray>()
                .expect("array type checked by data_type match");
            time32s_to_time(arr.value(row)).map_or(Cell::Null, Cell::Time)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            let arr = array
                .as_any()
                .downcast_ref::<Time32MillisecondArray>()
                .expect("array type checked by data_type match");
            time32ms_to_time(arr.value(row)).map_or(Cell::Null, Cell::Time)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let arr = array
                .as_any()
                .downcast_ref::<Time64MicrosecondArray>()
                .expect("array type checked by data_type match");
            time64us_to_time(arr.value(row)).map_or(Cell::Null, Cell::Time)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            let arr = array
                .as_any()
                .downcast_ref::<Time64NanosecondArray>()
                .expect("array type checked by data_type match");
            time64ns_to_time(arr.value(row)).map_or(Cell::Null, Cell::Time)
        }
        DataType::Timestamp(TimeUnit::Second, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<TimestampSecondArray>()
                .expect("array type checked by data_type match");
            timestamp_s_to_datetime(arr.value(row)).map_or(Cell::Null, Cell::Timestamp)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .expect("array type checked by data_type match");
            timestamp_ms_to_datetime(arr.value(row)).map_or(Cell::Null, Cell::Timestamp)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .expect("array type checked by data_type match");
            timestamp_us_to_datetime(arr.value(row)).map_or(Cell::Null, Cell::Timestamp)
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<TimestampNanosecondArray>()
                .expect("array type checked by data_type match");
            timestamp_ns_to_datetime(arr.value(row)).map_or(Cell::Null, Cell::Timestamp)
        }
        DataType::Decimal128(_, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<Decimal128Array>()
                .expect("array type checked by data_type match");
            Cell::Utf8(arr.value_as_string(row))
        }
        _ => match array_value_to_string(array, row) {
            Ok(rendered) => Cell::Utf8(rendered),
            Err(_) => Cell::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::ArrayRef;
    use std::sync::Arc;

    #[test]
    fn cell_at_extracts_primitives_and_nulls() {
        let arr: ArrayRef = Arc::new(Int64Array::from(vec![Some(7), None]));
        assert_eq!(cell_at(arr.as_ref(), 0), Cell::Int64(7));
        assert_eq!(cell_at(arr.as_ref(), 1), Cell::Null);
    }

    #[test]
    fn cell_at_converts_temporal_values() {
        let micros = 11 * 3_600_000_000i64 + 30 * 60_000_000 + 5_000_000;
        let arr: ArrayRef = Arc::new(Time64MicrosecondArray::from(vec![micros]));
        let expected = NaiveTime::from_hms_opt(11, 30, 5).expect("valid time");
        assert_eq!(cell_at(arr.as_ref(), 0), Cell::Time(expected));

        let arr: ArrayRef = Arc::new(Date32Array::from(vec![0]));
        let expected = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date");
        assert_eq!(cell_at(arr.as_ref(), 0), Cell::Date(expected));
    }

    #[test]
    fn cell_at_falls_back_to_display_form() {
        let arr: ArrayRef = Arc::new(arrow::array::UInt64Array::from(vec![42u64]));
        assert_eq!(cell_at(arr.as_ref(), 0), Cell::Utf8("42".to_string()));
    }
}

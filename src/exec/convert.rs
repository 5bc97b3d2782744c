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

use arrow::datatypes::DataType;

use crate::common::types::LogicalType;

/// A value-level conversion applied to raw text cells before the column is
/// materialized. `None` in means a null cell; `None` out keeps it null.
pub type ConvertFn =
    Arc<dyn Fn(Option<&str>) -> Result<Option<String>, String> + Send + Sync>;

/// Injected conversion capability. Registration happens at connection setup,
/// outside this crate; materialization only consumes the three views.
pub trait Converter: Send + Sync {
    /// Target physical type for a recognized logical type (the `types` view).
    fn target_type(&self, logical: &LogicalType) -> Option<DataType>;

    /// Whether a value-level conversion is registered (the `mappings` view).
    fn has_mapping(&self, logical: &LogicalType) -> bool;

    /// The conversion for a logical type. Unregistered types get the identity
    /// passthrough.
    fn get(&self, logical: &LogicalType) -> ConvertFn;
}

fn passthrough() -> ConvertFn {
    Arc::new(|value| Ok(value.map(str::to_string)))
}

fn trimmed() -> ConvertFn {
    Arc::new(|value| Ok(value.map(|v| v.trim().to_string())))
}

/// Stock converter: scalar types map onto Arrow primitives, decimal and the
/// opaque textual types keep their source text.
pub struct StandardConverter {
    types: HashMap<LogicalType, DataType>,
    mappings: HashMap<LogicalType, ConvertFn>,
}

impl StandardConverter {
    pub fn new() -> Self {
        let types = HashMap::from([
            (LogicalType::Boolean, DataType::Boolean),
            (LogicalType::TinyInt, DataType::Int8),
            (LogicalType::SmallInt, DataType::Int16),
            (LogicalType::Integer, DataType::Int32),
            (LogicalType::BigInt, DataType::Int64),
            (LogicalType::Float, DataType::Float32),
            (LogicalType::Double, DataType::Float64),
            (LogicalType::Char, DataType::Utf8),
            (LogicalType::Varchar, DataType::Utf8),
        ]);
        let mappings: HashMap<LogicalType, ConvertFn> = HashMap::from([
            (LogicalType::Decimal, trimmed()),
            (LogicalType::Json, passthrough()),
            (LogicalType::Varbinary, trimmed()),
        ]);
        Self { types, mappings }
    }
}

impl Default for StandardConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for StandardConverter {
    fn target_type(&self, logical: &LogicalType) -> Option<DataType> {
        self.types.get(logical).cloned()
    }

    fn has_mapping(&self, logical: &LogicalType) -> bool {
        self.mappings.contains_key(logical)
    }

    fn get(&self, logical: &LogicalType) -> ConvertFn {
        self.mappings
            .get(logical)
            .cloned()
            .unwrap_or_else(passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_converter_recognizes_scalar_types() {
        let converter = StandardConverter::new();
        assert_eq!(
            converter.target_type(&LogicalType::BigInt),
            Some(DataType::Int64)
        );
        assert_eq!(converter.target_type(&LogicalType::Timestamp), None);
    }

    #[test]
    fn unregistered_types_get_passthrough() {
        let converter = StandardConverter::new();
        assert!(!converter.has_mapping(&LogicalType::Varchar));
        let f = converter.get(&LogicalType::Varchar);
        assert_eq!(f(Some("abc")).expect("convert"), Some("abc".to_string()));
        assert_eq!(f(None).expect("convert"), None);
    }

    #[test]
    fn decimal_mapping_trims_source_text() {
        let converter = StandardConverter::new();
        assert!(converter.has_mapping(&LogicalType::Decimal));
        let f = converter.get(&LogicalType::Decimal);
        assert_eq!(
            f(Some(" 12.50 ")).expect("convert"),
            Some("12.50".to_string())
        );
    }
}

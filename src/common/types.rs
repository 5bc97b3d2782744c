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
use std::fmt;

/// Lifecycle state of the upstream query, as reported by the execution
/// service. Materialization only ever runs for `Succeeded`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Immutable execution descriptor handed over by the polling layer once the
/// query has reached a terminal state.
#[derive(Clone, Debug)]
pub struct QueryExecution {
    pub query_id: String,
    pub query: String,
    pub state: QueryState,
    pub output_location: Option<String>,
}

impl QueryExecution {
    /// The query text starts with `UNLOAD`, ignoring leading whitespace and
    /// letter case. The unload flag on the result set gates whether this
    /// actually selects the columnar path.
    pub fn starts_with_unload(&self) -> bool {
        let head = self.query.trim_start();
        head.len() >= 6
            && head.is_char_boundary(6)
            && head[..6].eq_ignore_ascii_case("UNLOAD")
    }
}

/// The engine's declared column type, distinct from the physical storage
/// representation. Unrecognized declarations are carried verbatim.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum LogicalType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    Char,
    Varchar,
    Varbinary,
    Json,
    Date,
    Time,
    TimeWithTimeZone,
    Timestamp,
    TimestampWithTimeZone,
    Array,
    Map,
    Row,
    Other(String),
}

impl LogicalType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" => LogicalType::Boolean,
            "tinyint" => LogicalType::TinyInt,
            "smallint" => LogicalType::SmallInt,
            "integer" | "int" => LogicalType::Integer,
            "bigint" => LogicalType::BigInt,
            "float" | "real" => LogicalType::Float,
            "double" => LogicalType::Double,
            "decimal" => LogicalType::Decimal,
            "char" => LogicalType::Char,
            "varchar" | "string" => LogicalType::Varchar,
            "varbinary" | "binary" => LogicalType::Varbinary,
            "json" => LogicalType::Json,
            "date" => LogicalType::Date,
            "time" => LogicalType::Time,
            "time with time zone" => LogicalType::TimeWithTimeZone,
            "timestamp" => LogicalType::Timestamp,
            "timestamp with time zone" => LogicalType::TimestampWithTimeZone,
            "array" => LogicalType::Array,
            "map" => LogicalType::Map,
            "row" => LogicalType::Row,
            other => LogicalType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Boolean => "boolean",
            LogicalType::TinyInt => "tinyint",
            LogicalType::SmallInt => "smallint",
            LogicalType::Integer => "integer",
            LogicalType::BigInt => "bigint",
            LogicalType::Float => "float",
            LogicalType::Double => "double",
            LogicalType::Decimal => "decimal",
            LogicalType::Char => "char",
            LogicalType::Varchar => "varchar",
            LogicalType::Varbinary => "varbinary",
            LogicalType::Json => "json",
            LogicalType::Date => "date",
            LogicalType::Time => "time",
            LogicalType::TimeWithTimeZone => "time with time zone",
            LogicalType::Timestamp => "timestamp",
            LogicalType::TimestampWithTimeZone => "timestamp with time zone",
            LogicalType::Array => "array",
            LogicalType::Map => "map",
            LogicalType::Row => "row",
            LogicalType::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// One entry of the column description: name plus declared logical type, in
/// declared order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub logical_type: LogicalType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }
}

/// Connection-side settings consumed solely to construct the storage-read
/// client. Extra client options are forwarded opaquely; well-known keys
/// (`endpoint`, `access_key_id`, ...) are picked up by the object store
/// config, everything else is ignored here.
#[derive(Clone, Debug, Default)]
pub struct ConnectionProfile {
    pub profile_name: Option<String>,
    pub region_name: Option<String>,
    pub client_options: HashMap<String, String>,
}

impl ConnectionProfile {
    pub fn client_option(&self, key: &str) -> Option<&str> {
        self.client_options.get(key).map(String::as_str)
    }
}

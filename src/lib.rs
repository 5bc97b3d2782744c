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
pub mod common;
pub mod error;
pub mod exec;
pub mod formats;
pub mod fs;

// Flat module aliases, matching the folder layout.
pub use common::logging as quarry_logging;
pub use formats::parquet as quarry_format_parquet;
pub use formats::text as quarry_format_text;
pub use fs::local as quarry_fs_local;
pub use fs::object_store as quarry_fs_object_store;
pub use fs::path as quarry_fs_path;

pub use common::types::{ColumnDesc, ConnectionProfile, LogicalType, QueryExecution, QueryState};
pub use error::{QuarryError, Result};
pub use exec::convert::{Converter, StandardConverter};
pub use exec::result_set::{QuoteMode, ResultSet, ResultSetOptions};
pub use exec::table::MaterializedTable;
pub use exec::value::Cell;
pub use formats::parquet::{EngineKind, EnginePreference};

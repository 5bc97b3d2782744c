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

use crate::common::types::{ColumnDesc, ConnectionProfile, QueryExecution, QueryState};
use crate::error::{QuarryError, Result};
use crate::exec::convert::{ConvertFn, Converter};
use crate::exec::schema::SchemaResolver;
use crate::exec::table::{MaterializedTable, RowCursor};
use crate::exec::value::Cell;
use crate::formats::parquet::{
    ColumnarReadOptions, EnginePreference, derive_unload_root, read_columnar, read_data_manifest,
    recover_schema, select_engine,
};
use crate::formats::text::{TextReadOptions, read_text_result};
use crate::quarry_logging::debug;

pub use crate::formats::text::QuoteMode;

pub const DEFAULT_ARRAYSIZE: usize = 1000;

/// Construction-time options for one result set.
#[derive(Clone, Debug)]
pub struct ResultSetOptions {
    pub arraysize: usize,
    pub keep_default_na: bool,
    pub na_values: Vec<String>,
    pub quoting: QuoteMode,
    /// Enables the columnar path for UNLOAD statements. Without it, UNLOAD
    /// output is treated like any other statement without a readable file.
    pub unload: bool,
    /// Explicit read root for the columnar fan-out; derived from the
    /// manifest's first entry when unset.
    pub unload_location: Option<String>,
    pub engine: EnginePreference,
    /// Rows per decoded batch, forwarded to the columnar reader.
    pub batch_size: Option<usize>,
}

impl Default for ResultSetOptions {
    fn default() -> Self {
        Self {
            arraysize: DEFAULT_ARRAYSIZE,
            keep_default_na: false,
            na_values: vec![String::new()],
            quoting: QuoteMode::default(),
            unload: false,
            unload_location: None,
            engine: EnginePreference::default(),
            batch_size: None,
        }
    }
}

impl ResultSetOptions {
    pub fn with_arraysize(mut self, arraysize: usize) -> Self {
        self.arraysize = if arraysize > 0 {
            arraysize
        } else {
            DEFAULT_ARRAYSIZE
        };
        self
    }

    pub fn with_keep_default_na(mut self, keep: bool) -> Self {
        self.keep_default_na = keep;
        self
    }

    pub fn with_na_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.na_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_quoting(mut self, quoting: QuoteMode) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn with_unload(mut self, unload: bool) -> Self {
        self.unload = unload;
        self
    }

    pub fn with_unload_location(mut self, location: impl Into<String>) -> Self {
        self.unload_location = Some(location.into());
        self
    }

    pub fn with_engine(mut self, engine: EnginePreference) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    fn text_options(&self) -> TextReadOptions {
        TextReadOptions {
            quoting: self.quoting,
            keep_default_na: self.keep_default_na,
            na_values: self.na_values.clone(),
        }
    }
}

/// The materialized result of one query execution: the table is built once
/// at construction, then served through a forward-only row cursor and bulk
/// table access over the same immutable data.
pub struct ResultSet {
    profile: ConnectionProfile,
    converter: Arc<dyn Converter>,
    execution: QueryExecution,
    description: Vec<ColumnDesc>,
    options: ResultSetOptions,
    table: MaterializedTable,
    cursor: RowCursor,
    rownumber: usize,
    manifest: Vec<String>,
}

impl ResultSet {
    /// Materializes the execution's output. All read failures surface here,
    /// eagerly; cursor operations never raise afterwards.
    pub fn new(
        profile: ConnectionProfile,
        converter: Arc<dyn Converter>,
        execution: QueryExecution,
        description: Vec<ColumnDesc>,
        options: ResultSetOptions,
    ) -> Result<Self> {
        let mut rs = Self {
            profile,
            converter,
            execution,
            description,
            options,
            table: MaterializedTable::empty(),
            cursor: RowCursor::empty(),
            rownumber: 0,
            manifest: Vec::new(),
        };
        if rs.execution.state == QueryState::Succeeded && rs.output_location().is_some() {
            if rs.is_unload() {
                rs.materialize_columnar()?;
            } else {
                rs.materialize_text()?;
            }
        } else {
            debug!(
                "nothing to materialize: query_id={} state={:?}",
                rs.execution.query_id, rs.execution.state
            );
        }
        rs.cursor = RowCursor::over(&rs.table);
        Ok(rs)
    }

    fn output_location(&self) -> Option<&str> {
        self.execution
            .output_location
            .as_deref()
            .map(str::trim)
            .filter(|loc| !loc.is_empty())
    }

    fn require_output_location(&self) -> Result<&str> {
        self.output_location()
            .ok_or_else(|| QuarryError::InvalidConfig("output location is unset".to_string()))
    }

    fn materialize_text(&mut self) -> Result<()> {
        let location = self.require_output_location()?.to_string();
        self.table = read_text_result(
            &location,
            &self.profile,
            &self.description,
            self.converter.as_ref(),
            &self.options.text_options(),
        )?;
        Ok(())
    }

    fn materialize_columnar(&mut self) -> Result<()> {
        let engine = select_engine(&self.options.engine)?;
        let location = self.require_output_location()?.to_string();
        self.manifest = read_data_manifest(&location, &self.profile)?;
        if self.manifest.is_empty() {
            self.table = MaterializedTable::empty();
            self.description = Vec::new();
            return Ok(());
        }
        let root = self
            .options
            .unload_location
            .clone()
            .unwrap_or_else(|| derive_unload_root(&self.manifest[0]));
        let read_options = ColumnarReadOptions {
            batch_size: self.options.batch_size,
        };
        self.table = read_columnar(&root, &self.profile, engine, &read_options)?;
        if self.table.is_empty() {
            self.description = Vec::new();
            return Ok(());
        }
        let recovered = recover_schema(engine, &root, &self.manifest, &self.profile)?;
        if recovered != self.description {
            debug!(
                "column description replaced by recovered schema: query_id={} columns={}",
                self.execution.query_id,
                recovered.len()
            );
        }
        self.description = recovered;
        Ok(())
    }

    /// Unload flag set and the query text starts with `UNLOAD`.
    pub fn is_unload(&self) -> bool {
        self.options.unload && self.execution.starts_with_unload()
    }

    /// The effective column description: the declared one for the text path,
    /// the recovered one after a columnar read.
    pub fn description(&self) -> &[ColumnDesc] {
        &self.description
    }

    pub fn dtypes(&self) -> HashMap<String, DataType> {
        SchemaResolver::new(&self.description, self.converter.as_ref()).dtypes()
    }

    pub fn converters(&self) -> HashMap<String, ConvertFn> {
        SchemaResolver::new(&self.description, self.converter.as_ref()).converters()
    }

    pub fn parse_dates(&self) -> Vec<String> {
        SchemaResolver::new(&self.description, self.converter.as_ref()).parse_dates()
    }

    /// Part URIs of the UNLOAD fan-out; empty for text results.
    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn rownumber(&self) -> usize {
        self.rownumber
    }

    pub fn arraysize(&self) -> usize {
        self.options.arraysize
    }

    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.options.arraysize = if arraysize > 0 {
            arraysize
        } else {
            DEFAULT_ARRAYSIZE
        };
    }

    /// Next row in description order, or `None` once exhausted. Exhaustion
    /// does not advance `rownumber`.
    pub fn fetch_one(&mut self) -> Option<Vec<Cell>> {
        let row = self.cursor.next_row();
        if row.is_some() {
            self.rownumber += 1;
        }
        row
    }

    /// Up to `size` rows (the configured arraysize when unset or zero).
    pub fn fetch_many(&mut self, size: Option<usize>) -> Vec<Vec<Cell>> {
        let size = size.filter(|n| *n > 0).unwrap_or(self.options.arraysize);
        let mut rows = Vec::with_capacity(size.min(self.table.num_rows()));
        for _ in 0..size {
            match self.fetch_one() {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        rows
    }

    /// Drains every remaining row.
    pub fn fetch_all(&mut self) -> Vec<Vec<Cell>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_one() {
            rows.push(row);
        }
        rows
    }

    /// The one materialized table, independent of cursor position.
    pub fn as_table(&self) -> &MaterializedTable {
        &self.table
    }

    /// Releases the table and resets the cursor. Idempotent; afterwards every
    /// access behaves as if the query returned nothing.
    pub fn close(&mut self) {
        self.table = MaterializedTable::empty();
        self.cursor = RowCursor::empty();
        self.manifest.clear();
    }
}

impl Iterator for ResultSet {
    type Item = Vec<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_one()
    }
}

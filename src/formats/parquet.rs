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

use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use bytes::Bytes;
use opendal::{ErrorKind, Operator};
use parquet::arrow::arrow_reader::{ArrowReaderOptions, ParquetRecordBatchReaderBuilder};

use crate::common::types::{ColumnDesc, ConnectionProfile, LogicalType};
use crate::error::QuarryError;
use crate::exec::table::MaterializedTable;
use crate::fs::io_block_on;
use crate::fs::path::{parent_directory, resolve_dir, resolve_file};
use crate::quarry_logging::debug;

/// The columnar reading engines. `Dataset` reads the whole fan-out with
/// concurrent part reads and merges the parts' schemas; `Glob` sweeps the
/// same directory sequentially and takes its schema from the manifest's
/// first file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineKind {
    Dataset,
    Glob,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Dataset => "dataset",
            EngineKind::Glob => "glob",
        }
    }

    fn availability(&self) -> Result<(), String> {
        match self {
            EngineKind::Dataset => {
                if cfg!(feature = "dataset-engine") {
                    Ok(())
                } else {
                    Err("crate was built without the `dataset-engine` feature".to_string())
                }
            }
            EngineKind::Glob => {
                if cfg!(feature = "glob-engine") {
                    Ok(())
                } else {
                    Err("crate was built without the `glob-engine` feature".to_string())
                }
            }
        }
    }
}

/// Caller preference for the columnar engine. `Auto` probes the known
/// engines in order; a named preference is taken as given, so an invalid
/// name only surfaces once a read actually happens.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum EnginePreference {
    #[default]
    Auto,
    Named(String),
}

impl EnginePreference {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            EnginePreference::Auto
        } else {
            EnginePreference::Named(trimmed.to_string())
        }
    }
}

const PROBE_ORDER: [EngineKind; 2] = [EngineKind::Dataset, EngineKind::Glob];

/// Resolves the concrete engine for a read. `Auto` returns the first
/// available engine; if none is, the availability error enumerates every
/// probed engine with its underlying reason.
pub fn select_engine(preference: &EnginePreference) -> Result<EngineKind, QuarryError> {
    match preference {
        EnginePreference::Auto => {
            let mut reasons = Vec::with_capacity(PROBE_ORDER.len());
            for kind in PROBE_ORDER {
                match kind.availability() {
                    Ok(()) => return Ok(kind),
                    Err(reason) => reasons.push(format!("{}: {}", kind.name(), reason)),
                }
            }
            Err(QuarryError::EngineUnavailable(format!(
                "tried engines `dataset`, `glob`; {}",
                reasons.join("; ")
            )))
        }
        EnginePreference::Named(name) => {
            let kind = match name.as_str() {
                "dataset" => EngineKind::Dataset,
                "glob" => EngineKind::Glob,
                other => {
                    return Err(QuarryError::InvalidConfig(format!(
                        "engine must be one of `dataset`, `glob`, got `{other}`"
                    )));
                }
            };
            kind.availability().map_err(QuarryError::InvalidConfig)?;
            Ok(kind)
        }
    }
}

/// Splits manifest content into part URIs, one per line.
pub fn parse_manifest(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads the data manifest written next to an UNLOAD's output. A missing
/// manifest object means the statement produced nothing: an empty manifest,
/// not an error.
pub fn read_data_manifest(
    location: &str,
    profile: &ConnectionProfile,
) -> Result<Vec<String>, QuarryError> {
    let (op, rel) =
        resolve_file(location, profile).map_err(|e| QuarryError::read_msg(location, e))?;
    let buffer = match io_block_on(op.read(&rel)).map_err(|e| QuarryError::read_msg(location, e))? {
        Ok(buffer) => buffer,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(QuarryError::read(location, err)),
    };
    let content = String::from_utf8(buffer.to_bytes().to_vec())
        .map_err(|e| QuarryError::read(location, e))?;
    Ok(parse_manifest(&content))
}

/// The read root of the whole fan-out: the first manifest entry's parent
/// directory, trailing separator included. The manifest itself is only used
/// to detect emptiness and to derive this root.
pub fn derive_unload_root(first_entry: &str) -> String {
    parent_directory(first_entry)
}

#[derive(Clone, Debug, Default)]
pub struct ColumnarReadOptions {
    /// Rows per decoded batch; passed through to the reader verbatim.
    pub batch_size: Option<usize>,
}

fn reader_builder(
    bytes: Bytes,
    batch_size: Option<usize>,
) -> Result<ParquetRecordBatchReaderBuilder<Bytes>, String> {
    // Embedded Arrow metadata is skipped so type resolution stays under the
    // converter's control rather than the writing engine's inference, and
    // columns come back with one null-sentinel convention per engine.
    let options = ArrowReaderOptions::new().with_skip_arrow_metadata(true);
    let mut builder = ParquetRecordBatchReaderBuilder::try_new_with_options(bytes, options)
        .map_err(|e| e.to_string())?;
    if let Some(batch_size) = batch_size {
        builder = builder.with_batch_size(batch_size);
    }
    Ok(builder)
}

fn decode_part(
    bytes: Bytes,
    batch_size: Option<usize>,
) -> Result<(SchemaRef, Vec<RecordBatch>), String> {
    let builder = reader_builder(bytes, batch_size)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build().map_err(|e| e.to_string())?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    Ok((schema, batches))
}

fn list_part_files(op: &Operator, root_location: &str) -> Result<Vec<String>, QuarryError> {
    let entries = io_block_on(op.list(""))
        .map_err(|e| QuarryError::read_msg(root_location, e))?
        .map_err(|e| QuarryError::read(root_location, e))?;
    let mut paths: Vec<String> = entries
        .iter()
        .map(|entry| entry.path().to_string())
        .filter(|path| !path.ends_with('/'))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Reads the columnar fan-out under the unload root through the selected
/// engine. Part order follows the lexicographic sweep of the directory.
pub fn read_columnar(
    root_location: &str,
    profile: &ConnectionProfile,
    engine: EngineKind,
    options: &ColumnarReadOptions,
) -> Result<MaterializedTable, QuarryError> {
    let op =
        resolve_dir(root_location, profile).map_err(|e| QuarryError::read_msg(root_location, e))?;
    let paths = list_part_files(&op, root_location)?;
    if paths.is_empty() {
        return Ok(MaterializedTable::empty());
    }
    debug!(
        "reading columnar fan-out: root={root_location} engine={} parts={}",
        engine.name(),
        paths.len()
    );

    let batch_size = options.batch_size;
    let parts: Vec<(SchemaRef, Vec<RecordBatch>)> = match engine {
        EngineKind::Dataset => io_block_on(async {
            let handles: Vec<_> = paths
                .iter()
                .map(|path| {
                    let op = op.clone();
                    let path = path.clone();
                    tokio::spawn(async move {
                        let buffer = op.read(&path).await.map_err(|e| format!("{path}: {e}"))?;
                        decode_part(buffer.to_bytes(), batch_size)
                            .map_err(|e| format!("{path}: {e}"))
                    })
                })
                .collect();
            let joined = futures::future::try_join_all(handles)
                .await
                .map_err(|e| format!("part read task failed: {e}"))?;
            joined.into_iter().collect::<Result<Vec<_>, String>>()
        })
        .map_err(|e| QuarryError::read_msg(root_location, e))?
        .map_err(|e| QuarryError::read_msg(root_location, e))?,
        EngineKind::Glob => {
            let mut parts = Vec::with_capacity(paths.len());
            for path in &paths {
                let buffer = io_block_on(op.read(path))
                    .map_err(|e| QuarryError::read_msg(root_location, e))?
                    .map_err(|e| QuarryError::read(format!("{root_location}{path}"), e))?;
                let part = decode_part(buffer.to_bytes(), batch_size)
                    .map_err(|e| QuarryError::read_msg(format!("{root_location}{path}"), e))?;
                parts.push(part);
            }
            parts
        }
    };

    let schema = Arc::clone(&parts[0].0);
    let mut batches = Vec::new();
    for (part_schema, part_batches) in parts {
        if part_schema.fields() != schema.fields() {
            return Err(QuarryError::read_msg(
                root_location,
                format!(
                    "part schema mismatch: expected {:?}, got {:?}",
                    schema.fields(),
                    part_schema.fields()
                ),
            ));
        }
        batches.extend(part_batches);
    }
    Ok(MaterializedTable::new(schema, batches))
}

/// Recovers the true column list from the part files' own embedded schema.
/// The original description may be stale relative to what the UNLOAD
/// actually wrote, so the files win.
pub fn recover_schema(
    engine: EngineKind,
    root_location: &str,
    manifest: &[String],
    profile: &ConnectionProfile,
) -> Result<Vec<ColumnDesc>, QuarryError> {
    match engine {
        EngineKind::Dataset => {
            let op = resolve_dir(root_location, profile)
                .map_err(|e| QuarryError::read_msg(root_location, e))?;
            let paths = list_part_files(&op, root_location)?;
            let mut schemas = Vec::with_capacity(paths.len());
            for path in &paths {
                let buffer = io_block_on(op.read(path))
                    .map_err(|e| QuarryError::read_msg(root_location, e))?
                    .map_err(|e| QuarryError::read(format!("{root_location}{path}"), e))?;
                let builder = reader_builder(buffer.to_bytes(), None)
                    .map_err(|e| QuarryError::read_msg(format!("{root_location}{path}"), e))?;
                schemas.push(builder.schema().as_ref().clone());
            }
            let merged = Schema::try_merge(schemas)
                .map_err(|e| QuarryError::read_msg(root_location, e.to_string()))?;
            Ok(merged.fields().iter().map(|f| column_desc_from_field(f)).collect())
        }
        EngineKind::Glob => {
            let first = manifest.first().ok_or_else(|| {
                QuarryError::InvalidConfig("data manifest is empty".to_string())
            })?;
            let (op, rel) =
                resolve_file(first, profile).map_err(|e| QuarryError::read_msg(first, e))?;
            let buffer = io_block_on(op.read(&rel))
                .map_err(|e| QuarryError::read_msg(first, e))?
                .map_err(|e| QuarryError::read(first.clone(), e))?;
            let builder = reader_builder(buffer.to_bytes(), None)
                .map_err(|e| QuarryError::read_msg(first.clone(), e))?;
            Ok(builder
                .schema()
                .fields()
                .iter()
                .map(|f| column_desc_from_field(f))
                .collect())
        }
    }
}

fn column_desc_from_field(field: &Field) -> ColumnDesc {
    let logical_type = match field.data_type() {
        DataType::Boolean => LogicalType::Boolean,
        DataType::Int8 => LogicalType::TinyInt,
        DataType::Int16 => LogicalType::SmallInt,
        DataType::Int32 => LogicalType::Integer,
        DataType::Int64 => LogicalType::BigInt,
        DataType::Float32 => LogicalType::Float,
        DataType::Float64 => LogicalType::Double,
        DataType::Utf8 | DataType::LargeUtf8 => LogicalType::Varchar,
        DataType::Binary | DataType::LargeBinary => LogicalType::Varbinary,
        DataType::Date32 | DataType::Date64 => LogicalType::Date,
        DataType::Time32(_) | DataType::Time64(_) => LogicalType::Time,
        DataType::Timestamp(_, None) => LogicalType::Timestamp,
        DataType::Timestamp(_, Some(_)) => LogicalType::TimestampWithTimeZone,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => LogicalType::Decimal,
        DataType::List(_) | DataType::LargeList(_) => LogicalType::Array,
        DataType::Map(_, _) => LogicalType::Map,
        DataType::Struct(_) => LogicalType::Row,
        other => LogicalType::Other(format!("{other:?}").to_ascii_lowercase()),
    };
    ColumnDesc::new(field.name().clone(), logical_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_unload_root_is_first_entry_parent() {
        assert_eq!(
            derive_unload_root("s3://bkt/out/part-0000.parquet"),
            "s3://bkt/out/"
        );
    }

    #[test]
    fn parse_manifest_skips_blank_lines() {
        let manifest = parse_manifest("s3://bkt/out/p0\n\ns3://bkt/out/p1\n");
        assert_eq!(manifest, vec!["s3://bkt/out/p0", "s3://bkt/out/p1"]);
        assert!(parse_manifest("").is_empty());
    }

    #[cfg(feature = "dataset-engine")]
    #[test]
    fn auto_preference_resolves_to_first_available_engine() {
        let engine = select_engine(&EnginePreference::Auto).expect("default build has engines");
        assert_eq!(engine, EngineKind::Dataset);
    }

    #[cfg(not(any(feature = "dataset-engine", feature = "glob-engine")))]
    #[test]
    fn auto_with_no_engines_enumerates_probed_engines() {
        let err = select_engine(&EnginePreference::Auto).expect_err("no engines compiled in");
        assert!(matches!(err, QuarryError::EngineUnavailable(_)));
        let message = err.to_string();
        assert!(message.contains("dataset") && message.contains("glob"));
        assert!(message.contains("feature"));
    }

    #[cfg(feature = "glob-engine")]
    #[test]
    fn named_preference_is_taken_as_given() {
        let engine = select_engine(&EnginePreference::parse("glob")).expect("glob engine");
        assert_eq!(engine, EngineKind::Glob);
    }

    #[test]
    fn unknown_engine_name_is_a_configuration_error() {
        let err = select_engine(&EnginePreference::parse("duckdb"))
            .expect_err("unknown engine name must fail");
        assert!(matches!(err, QuarryError::InvalidConfig(_)));
        assert!(err.to_string().contains("duckdb"));
    }

    #[test]
    fn column_desc_from_field_reverse_maps_arrow_types() {
        use arrow::datatypes::TimeUnit;

        let field = Field::new("n", DataType::Int64, true);
        assert_eq!(
            column_desc_from_field(&field),
            ColumnDesc::new("n", LogicalType::BigInt)
        );
        let field = Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            true,
        );
        assert_eq!(
            column_desc_from_field(&field).logical_type,
            LogicalType::TimestampWithTimeZone
        );
    }
}

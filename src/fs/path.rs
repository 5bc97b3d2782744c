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
use opendal::Operator;

use crate::common::types::ConnectionProfile;
use crate::fs::object_store::{ObjectStoreConfig, build_object_store_operator};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocationScheme {
    Local,
    ObjectStore,
}

/// Physical shape of a non-UNLOAD result file, decided once from the output
/// location suffix before any materialization begins.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultShape {
    /// Comma-separated with a header row (`.csv`).
    Csv,
    /// Tab-separated without a header row (`.txt`).
    Tsv,
    /// Anything else: statements that produce no readable file (DDL, CTAS
    /// metadata). Materializes as an empty table, never an error.
    Other,
}

pub fn classify_result_shape(location: &str) -> ResultShape {
    if location.ends_with(".csv") {
        ResultShape::Csv
    } else if location.ends_with(".txt") {
        ResultShape::Tsv
    } else {
        ResultShape::Other
    }
}

pub fn classify_location(location: &str) -> Result<LocationScheme, String> {
    let location = location.trim();
    if location.is_empty() {
        return Err("location is empty".to_string());
    }
    if location.starts_with("s3://") || location.starts_with("oss://") {
        return Ok(LocationScheme::ObjectStore);
    }
    if location.starts_with("file:/")
        || location.starts_with("file://")
        || location.starts_with('/')
        || !location.contains("://")
    {
        return Ok(LocationScheme::Local);
    }
    Err(format!("unsupported location scheme: {location}"))
}

/// Splits `s3://bucket/key` into bucket and key.
pub fn parse_object_location(location: &str) -> Result<(String, String), String> {
    let trimmed = location.trim();
    for scheme in ["s3://", "oss://"] {
        if let Some(rest) = trimmed.strip_prefix(scheme) {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| format!("invalid object url: {location}"))?;
            if bucket.is_empty() {
                return Err(format!("invalid object url: {location}"));
            }
            return Ok((bucket.to_string(), key.to_string()));
        }
    }
    Err(format!("not an object store url: {location}"))
}

/// Parent directory of a location, with a trailing separator. The manifest's
/// first entry goes through this to become the read root of the fan-out.
pub fn parent_directory(location: &str) -> String {
    match location.trim().rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => String::new(),
    }
}

/// Resolves one file location into an operator plus the path to read through
/// it. Local locations get an Fs operator rooted at the parent directory;
/// object store locations get the bucket operator from the connection
/// profile.
pub fn resolve_file(
    location: &str,
    profile: &ConnectionProfile,
) -> Result<(Operator, String), String> {
    match classify_location(location)? {
        LocationScheme::Local => {
            let normalized = crate::fs::local::normalize_local_location(location)?;
            let (dir, name) = normalized
                .rsplit_once('/')
                .ok_or_else(|| format!("local location has no parent directory: {location}"))?;
            let root = if dir.is_empty() { "/" } else { dir };
            let op = crate::fs::local::build_fs_operator(root).map_err(|e| e.to_string())?;
            Ok((op, name.to_string()))
        }
        LocationScheme::ObjectStore => {
            let (bucket, key) = parse_object_location(location)?;
            let cfg = ObjectStoreConfig::from_profile(profile, &bucket, "");
            let op = build_object_store_operator(&cfg).map_err(|e| e.to_string())?;
            Ok((op, key))
        }
    }
}

/// Resolves a directory location (trailing separator expected) into an
/// operator rooted at that directory, so listing `""` enumerates the
/// fan-out.
pub fn resolve_dir(location: &str, profile: &ConnectionProfile) -> Result<Operator, String> {
    match classify_location(location)? {
        LocationScheme::Local => {
            let normalized = crate::fs::local::normalize_local_location(location)?;
            crate::fs::local::build_fs_operator(&normalized).map_err(|e| e.to_string())
        }
        LocationScheme::ObjectStore => {
            let (bucket, key) = parse_object_location(location)?;
            let cfg = ObjectStoreConfig::from_profile(profile, &bucket, &key);
            build_object_store_operator(&cfg).map_err(|e| e.to_string())
        }
    }
}

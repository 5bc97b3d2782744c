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
use anyhow::{Context, Result};
use opendal::Operator;

pub fn build_fs_operator(root: &str) -> Result<Operator> {
    let builder = opendal::services::Fs::default().root(root);
    let op = Operator::new(builder)
        .context("init opendal fs operator")?
        .finish();
    Ok(op)
}

/// Strips `file:` URI decoration down to a plain absolute path. Plain paths
/// pass through untouched.
pub fn normalize_local_location(raw: &str) -> Result<String, String> {
    let path = raw.trim();
    if let Some(rest) = path.strip_prefix("file://") {
        if rest.is_empty() {
            return Err("invalid file URI: empty path".to_string());
        }
        if let Some(abs) = rest.strip_prefix('/') {
            return Ok(format!("/{}", abs));
        }
        if let Some(host_path) = rest.strip_prefix("localhost/") {
            return Ok(format!("/{}", host_path));
        }
        return Err(format!("unsupported file URI host in local path: {path}"));
    }
    if let Some(rest) = path.strip_prefix("file:/") {
        return Ok(format!("/{}", rest.trim_start_matches('/')));
    }
    Ok(path.to_string())
}

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
use std::future::Future;
use std::sync::OnceLock;

pub mod local;
pub mod object_store;
pub mod path;

static IO_RUNTIME: OnceLock<Result<tokio::runtime::Runtime, String>> = OnceLock::new();

fn io_runtime() -> Result<&'static tokio::runtime::Runtime, String> {
    match IO_RUNTIME.get_or_init(|| {
        tokio::runtime::Runtime::new().map_err(|e| format!("init tokio runtime failed: {e}"))
    }) {
        Ok(rt) => Ok(rt),
        Err(err) => Err(err.clone()),
    }
}

/// Drives an async storage call to completion from synchronous code. All
/// operator I/O in this crate funnels through the one shared runtime.
pub fn io_block_on<F>(future: F) -> Result<F::Output, String>
where
    F: Future,
{
    let rt = io_runtime()?;
    Ok(rt.block_on(future))
}

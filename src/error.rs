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
use thiserror::Error;

use crate::quarry_logging::error;

pub type Result<T> = std::result::Result<T, QuarryError>;

#[derive(Error, Debug)]
pub enum QuarryError {
    /// Caller-side mistakes: unset output location at read time, an unknown
    /// engine name used for an actual read, a malformed part URI. Not
    /// retryable; the inputs must be fixed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No usable columnar engine was compiled in while auto-selecting. The
    /// message enumerates every probed engine and its unavailability reason.
    #[error("no usable columnar engine: {0}")]
    EngineUnavailable(String),

    /// A failure while reading the text file, the columnar fan-out, or
    /// recovering columnar schema. Wraps the originating failure.
    #[error("failed to read {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

impl QuarryError {
    /// Builds a read error, logging the attempted location before the error
    /// propagates so failed paths are always diagnosable from the log.
    pub fn read<E>(location: impl Into<String>, source: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        let location = location.into();
        let source = source.into();
        error!("failed to read {location}: {source}");
        QuarryError::Read { location, source }
    }

    pub fn read_msg(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::read(location, anyhow::anyhow!(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_carries_location_and_cause() {
        let err = QuarryError::read_msg("s3://bkt/out/part-0000", "connection reset");
        let rendered = err.to_string();
        assert!(rendered.contains("s3://bkt/out/part-0000"));
        assert!(rendered.contains("connection reset"));
    }
}

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
use std::net::IpAddr;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use opendal::Operator;
use opendal::layers::RetryLayer;

use crate::common::types::ConnectionProfile;

const DEFAULT_RETRY_MAX_TIMES: usize = 6;
const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 100;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Storage/auth settings for one bucket. Always derived from the connection
/// profile; callers cannot override these through reader options.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub root: String,
    pub region: Option<String>,
    pub profile_name: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub enable_path_style_access: Option<bool>,
}

impl ObjectStoreConfig {
    /// Builds the per-bucket config from the connection profile. `root` is
    /// the key prefix all reads are resolved against (may be empty).
    pub fn from_profile(profile: &ConnectionProfile, bucket: &str, root: &str) -> Self {
        let region = profile
            .client_option("region_name")
            .map(str::to_string)
            .or_else(|| profile.region_name.clone());
        let endpoint = profile
            .client_option("endpoint_url")
            .or_else(|| profile.client_option("endpoint"))
            .map(str::to_string)
            .unwrap_or_else(|| match region.as_deref() {
                Some(region) => format!("s3.{region}.amazonaws.com"),
                None => "s3.amazonaws.com".to_string(),
            });
        let enable_path_style_access = profile
            .client_option("enable_path_style_access")
            .map(|v| v.eq_ignore_ascii_case("true"));
        Self {
            endpoint,
            bucket: bucket.to_string(),
            root: root.to_string(),
            region,
            profile_name: profile.profile_name.clone(),
            access_key_id: profile.client_option("access_key_id").map(str::to_string),
            secret_access_key: profile
                .client_option("secret_access_key")
                .map(str::to_string),
            session_token: profile.client_option("session_token").map(str::to_string),
            enable_path_style_access,
        }
    }
}

static OPERATOR_CACHE: OnceLock<Mutex<HashMap<ObjectStoreConfig, Operator>>> = OnceLock::new();

fn operator_cache() -> &'static Mutex<HashMap<ObjectStoreConfig, Operator>> {
    OPERATOR_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn build_retry_layer() -> RetryLayer {
    RetryLayer::new()
        .with_jitter()
        .with_min_delay(Duration::from_millis(DEFAULT_RETRY_MIN_DELAY_MS))
        .with_max_delay(Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS))
        .with_max_times(DEFAULT_RETRY_MAX_TIMES)
}

fn build_raw_operator(cfg: &ObjectStoreConfig) -> Result<Operator> {
    let endpoint = normalize_s3_endpoint(&cfg.endpoint)?;
    let local_endpoint = is_local_endpoint(&endpoint);
    let use_path_style = should_use_path_style(cfg);

    let mut builder = opendal::services::S3::default()
        .endpoint(&endpoint)
        .bucket(&cfg.bucket)
        .region(cfg.region.as_deref().unwrap_or("us-east-1"));
    if !use_path_style {
        builder = builder.enable_virtual_host_style();
    }
    match (cfg.access_key_id.as_deref(), cfg.secret_access_key.as_deref()) {
        (Some(ak), Some(sk)) => {
            builder = builder.access_key_id(ak).secret_access_key(sk);
            if let Some(token) = cfg.session_token.as_deref() {
                builder = builder.session_token(token);
            }
        }
        _ => {
            // Credentials come from the ambient environment (profile, env
            // vars, instance metadata) when the profile carries none.
            builder = builder.disable_config_load();
        }
    }
    if local_endpoint {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .context("build reqwest client without proxy for local object endpoint")?;
        builder = builder.http_client(opendal::raw::HttpClient::with(client));
    }
    if !cfg.root.is_empty() {
        builder = builder.root(&cfg.root);
    }
    let op = Operator::new(builder)
        .context("init opendal s3 operator")?
        .finish()
        .layer(build_retry_layer());
    Ok(op)
}

/// Builds or reuses the operator for this config. Operators are cached
/// process-wide because construction validates endpoints and spawns an HTTP
/// client pool.
pub fn build_object_store_operator(cfg: &ObjectStoreConfig) -> Result<Operator> {
    if let Some(op) = {
        let guard = operator_cache()
            .lock()
            .map_err(|_| anyhow!("lock object store operator cache failed"))?;
        guard.get(cfg).cloned()
    } {
        return Ok(op);
    }

    let op = build_raw_operator(cfg)?;
    let mut guard = operator_cache()
        .lock()
        .map_err(|_| anyhow!("lock object store operator cache failed"))?;
    let cached = guard.entry(cfg.clone()).or_insert_with(|| op.clone());
    Ok(cached.clone())
}

fn endpoint_host(endpoint: &str) -> String {
    let mut view = endpoint.trim();
    if let Some(rest) = view.strip_prefix("http://") {
        view = rest;
    } else if let Some(rest) = view.strip_prefix("https://") {
        view = rest;
    }
    if let Some((authority, _)) = view.split_once('/') {
        view = authority;
    }
    view.split(':').next().unwrap_or(view).to_ascii_lowercase()
}

fn is_local_endpoint(endpoint: &str) -> bool {
    let host = endpoint_host(endpoint);
    host == "localhost" || host.parse::<IpAddr>().is_ok()
}

fn prefer_virtual_host_style(endpoint: &str) -> bool {
    let host = endpoint_host(endpoint);
    host.ends_with(".amazonaws.com") || host.ends_with("storage.googleapis.com")
}

fn should_use_path_style(cfg: &ObjectStoreConfig) -> bool {
    if let Some(v) = cfg.enable_path_style_access {
        return v;
    }
    !prefer_virtual_host_style(&cfg.endpoint)
}

fn normalize_s3_endpoint(raw_endpoint: &str) -> Result<String> {
    let endpoint = raw_endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(anyhow!("empty object store endpoint"));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }
    let scheme = if is_local_endpoint(endpoint) {
        "http"
    } else {
        "https"
    };
    Ok(format!("{scheme}://{endpoint}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, path_style: Option<bool>) -> ObjectStoreConfig {
        ObjectStoreConfig {
            endpoint: endpoint.to_string(),
            bucket: "bucket".to_string(),
            root: String::new(),
            region: None,
            profile_name: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            enable_path_style_access: path_style,
        }
    }

    #[test]
    fn default_to_path_style_for_local_endpoint() {
        assert!(should_use_path_style(&config("http://localhost:9000", None)));
    }

    #[test]
    fn prefer_virtual_host_style_for_aws_endpoint() {
        assert!(!should_use_path_style(&config(
            "https://s3.us-east-1.amazonaws.com",
            None
        )));
    }

    #[test]
    fn explicit_path_style_flag_overrides_default() {
        assert!(should_use_path_style(&config(
            "https://s3.us-east-1.amazonaws.com",
            Some(true)
        )));
    }

    #[test]
    fn normalize_s3_endpoint_defaults_local_to_http() {
        let endpoint = normalize_s3_endpoint("localhost:9000").expect("normalize endpoint");
        assert_eq!(endpoint, "http://localhost:9000");
    }

    #[test]
    fn from_profile_prefers_explicit_endpoint_option() {
        let mut profile = ConnectionProfile::default();
        profile.region_name = Some("eu-west-1".to_string());
        let cfg = ObjectStoreConfig::from_profile(&profile, "bkt", "out/");
        assert_eq!(cfg.endpoint, "s3.eu-west-1.amazonaws.com");

        profile
            .client_options
            .insert("endpoint_url".to_string(), "http://localhost:9000".to_string());
        let cfg = ObjectStoreConfig::from_profile(&profile, "bkt", "out/");
        assert_eq!(cfg.endpoint, "http://localhost:9000");
    }
}

use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use client_core::CountRefresh;
use url::Url;
use wallet_rpc::RpcSettings;

pub const DEFAULT_CONFIG_PATH: &str = "counter.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: Option<String>,
    pub log_filter: String,
    pub count_refresh: CountRefresh,
    pub receipt_poll_ms: u64,
    pub receipt_timeout_secs: u64,
    pub event_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            log_filter: "info".into(),
            count_refresh: CountRefresh::default(),
            receipt_poll_ms: 1_000,
            receipt_timeout_secs: 120,
            event_poll_ms: 2_000,
        }
    }
}

impl Settings {
    /// Builds provider settings, or `None` when no wallet endpoint is configured.
    pub fn rpc_settings(&self) -> Result<Option<RpcSettings>> {
        let Some(raw) = self.rpc_url.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let rpc_url =
            Url::parse(raw).with_context(|| format!("invalid wallet rpc url '{raw}'"))?;
        let mut settings = RpcSettings::new(rpc_url);
        settings.receipt_poll_interval = Duration::from_millis(self.receipt_poll_ms);
        settings.receipt_timeout = Duration::from_secs(self.receipt_timeout_secs);
        Ok(Some(settings))
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms.max(1))
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_values(&mut settings, &file_cfg),
            Err(err) => eprintln!(
                "ignoring malformed config file '{}': {err}",
                config_path.display()
            ),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("rpc_url").and_then(toml::Value::as_str) {
        settings.rpc_url = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("log_filter").and_then(toml::Value::as_str) {
        settings.log_filter = v.to_string();
    }
    if let Some(v) = file_cfg.get("count_refresh").and_then(toml::Value::as_str) {
        if let Ok(parsed) = v.parse() {
            settings.count_refresh = parsed;
        }
    }
    if let Some(v) = file_cfg.get("receipt_poll_ms").and_then(as_u64) {
        settings.receipt_poll_ms = v;
    }
    if let Some(v) = file_cfg.get("receipt_timeout_secs").and_then(as_u64) {
        settings.receipt_timeout_secs = v;
    }
    if let Some(v) = file_cfg.get("event_poll_ms").and_then(as_u64) {
        settings.event_poll_ms = v;
    }
}

fn as_u64(value: &toml::Value) -> Option<u64> {
    value.as_integer().and_then(|v| u64::try_from(v).ok())
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("COUNTER_RPC_URL") {
        settings.rpc_url = Some(v);
    }
    if let Some(v) = var("APP__RPC_URL") {
        settings.rpc_url = Some(v);
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__COUNT_REFRESH") {
        if let Ok(parsed) = v.parse() {
            settings.count_refresh = parsed;
        }
    }

    if let Some(v) = var("APP__RECEIPT_POLL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_poll_ms = parsed;
        }
    }
    if let Some(v) = var("APP__RECEIPT_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_timeout_secs = parsed;
        }
    }
    if let Some(v) = var("APP__EVENT_POLL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.event_poll_ms = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

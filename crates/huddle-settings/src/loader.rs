//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HuddleSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `HUDDLE_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::HuddleSettings;

/// Resolve the default settings file (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; a malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUDDLE_*` process environment overrides.
///
/// Unparseable or out-of-range values are logged and ignored.
pub fn apply_env_overrides(settings: &mut HuddleSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides_from<F>(settings: &mut HuddleSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("HUDDLE_PORT", 1, 65535) {
        settings.server.port = v;
    }

    // ── Gateway ─────────────────────────────────────────────────────
    if let Some(v) = env.usize("HUDDLE_QUEUE_CAPACITY", 1, 1_000_000) {
        settings.gateway.queue_capacity = v;
    }
    if let Some(v) = env.u64("HUDDLE_WRITE_WAIT_MS", 1, 600_000) {
        settings.gateway.write_wait_ms = v;
    }
    if let Some(v) = env.u64("HUDDLE_PONG_WAIT_MS", 10, 3_600_000) {
        settings.gateway.pong_wait_ms = v;
    }
    if let Some(v) = env.usize("HUDDLE_MAX_MESSAGE_SIZE", 64, 16_777_216) {
        settings.gateway.max_message_size = v;
    }
    if let Some(v) = env.u64("HUDDLE_TOKEN_TTL_MS", 1_000, 86_400_000) {
        settings.gateway.token_ttl_ms = v;
    }

    // ── Bus ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_BUS_URL") {
        settings.bus.url = v;
    }
    if let Some(v) = env.usize("HUDDLE_BUS_CAPACITY", 1, 1_000_000) {
        settings.bus.subscription_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("HUDDLE_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

/// Reject settings the gateway cannot run with.
pub fn validate(settings: &HuddleSettings) -> Result<()> {
    let g = &settings.gateway;
    if g.queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.queueCapacity must be at least 1".into(),
        ));
    }
    if g.pong_wait_ms < 10 {
        return Err(SettingsError::InvalidValue(
            "gateway.pongWaitMs must be at least 10".into(),
        ));
    }
    if g.write_wait_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.writeWaitMs must be positive".into(),
        ));
    }
    if g.token_ttl_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.tokenTtlMs must be positive".into(),
        ));
    }
    if settings.bus.subscription_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "bus.subscriptionCapacity must be at least 1".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, |v| parse_usize_range(v, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 9999, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 8080}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 8080);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.gateway, crate::GatewaySettings::default());
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 8088}, "gateway": {"pongWaitMs": 1000}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.gateway.pong_wait_ms, 1000);
        assert_eq!(settings.gateway.queue_capacity, 200);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn load_rejects_zero_queue_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gateway": {"queueCapacity": 0}}"#).unwrap();
        assert!(matches!(
            read_file_layer(&path).map(|s| validate(&s)),
            Ok(Err(SettingsError::InvalidValue(_)))
        ));
    }

    #[test]
    fn zero_token_ttl_is_rejected() {
        let mut settings = HuddleSettings::default();
        settings.gateway.token_ttl_ms = 0;
        assert!(matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("tokenTtlMs")
        ));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win() {
        let mut settings = HuddleSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("HUDDLE_PORT", "7000"),
                ("HUDDLE_HOST", "127.0.0.1"),
                ("HUDDLE_PONG_WAIT_MS", "500"),
                ("HUDDLE_BUS_URL", "local://test"),
                ("HUDDLE_LOG_FORMAT", "json"),
                ("HUDDLE_TOKEN_TTL_MS", "5000"),
                ("HUDDLE_MAX_MESSAGE_SIZE", "1048576"),
            ]),
        );
        assert_eq!(settings.gateway.token_ttl_ms, 5_000);
        assert_eq!(settings.gateway.max_message_size, 1_048_576);
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.gateway.pong_wait_ms, 500);
        assert_eq!(settings.bus.url, "local://test");
        assert_eq!(settings.logging.format, "json");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = HuddleSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("HUDDLE_PORT", "0"),
                ("HUDDLE_QUEUE_CAPACITY", "lots"),
                ("HUDDLE_HOST", ""),
            ]),
        );
        assert_eq!(settings, HuddleSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn range_parsers() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range("9", 10, 100), None);
        assert_eq!(parse_usize_range("200", 1, 1000), Some(200));
        assert_eq!(parse_usize_range("-1", 1, 1000), None);
    }
}

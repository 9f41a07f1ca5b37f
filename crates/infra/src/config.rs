//! Pipeline configuration.
//!
//! Every setting has a default; the environment overrides individual values.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `RENDITION_TRANSFORM_IMAGES` | `none` | `image` option passed to the transform |
//! | `RENDITION_TRANSFORM_LANGUAGE` | `en` | `language` option passed to the transform |
//! | `RENDITION_WORKERS` | `4` | worker threads (minimum 1) |
//! | `RENDITION_QUEUE_CAPACITY` | `64` | jobs waiting for a worker before callers run them |
//! | `RENDITION_TX_MAX_ATTEMPTS` | `20` | executions per job transaction (minimum 1) |
//!
//! Unparseable numbers are ignored with a warning.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::jobs::WorkerPoolConfig;
use crate::transaction::RetryPolicy;
use crate::transform::{OPTION_IMAGE, OPTION_LANGUAGE};

pub const ENV_TRANSFORM_IMAGES: &str = "RENDITION_TRANSFORM_IMAGES";
pub const ENV_TRANSFORM_LANGUAGE: &str = "RENDITION_TRANSFORM_LANGUAGE";
pub const ENV_WORKERS: &str = "RENDITION_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "RENDITION_QUEUE_CAPACITY";
pub const ENV_TX_MAX_ATTEMPTS: &str = "RENDITION_TX_MAX_ATTEMPTS";

/// Options handed to the transform service on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub image_mode: String,
    pub language: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            image_mode: "none".to_string(),
            language: "en".to_string(),
        }
    }
}

impl TransformConfig {
    pub fn options(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (OPTION_IMAGE.to_string(), self.image_mode.clone()),
            (OPTION_LANGUAGE.to_string(), self.language.clone()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenditionConfig {
    pub transform: TransformConfig,
    pub pool: WorkerPoolConfig,
    pub retry: RetryPolicy,
}

impl RenditionConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(images) = lookup(ENV_TRANSFORM_IMAGES) {
            config.transform.image_mode = images;
        }
        if let Some(language) = lookup(ENV_TRANSFORM_LANGUAGE) {
            config.transform.language = language;
        }
        if let Some(workers) = parse::<usize>(&lookup, ENV_WORKERS) {
            config.pool.workers = workers.max(1);
        }
        if let Some(capacity) = parse::<usize>(&lookup, ENV_QUEUE_CAPACITY) {
            config.pool.queue_capacity = capacity;
        }
        if let Some(attempts) = parse::<u32>(&lookup, ENV_TX_MAX_ATTEMPTS) {
            config.retry.max_attempts = attempts.max(1);
        }

        config
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = RenditionConfig::from_lookup(lookup(&[]));

        assert_eq!(config, RenditionConfig::default());
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.pool.queue_capacity, 64);
        assert_eq!(config.retry.max_attempts, 20);
        assert_eq!(
            config.transform.options(),
            BTreeMap::from([
                ("image".to_string(), "none".to_string()),
                ("language".to_string(), "en".to_string()),
            ])
        );
    }

    #[test]
    fn environment_overrides_individual_settings() {
        let config = RenditionConfig::from_lookup(lookup(&[
            (ENV_TRANSFORM_IMAGES, "embed"),
            (ENV_TRANSFORM_LANGUAGE, "de"),
            (ENV_WORKERS, " 8 "),
            (ENV_QUEUE_CAPACITY, "0"),
            (ENV_TX_MAX_ATTEMPTS, "3"),
        ]));

        assert_eq!(config.transform.image_mode, "embed");
        assert_eq!(config.transform.language, "de");
        assert_eq!(config.pool.workers, 8);
        assert_eq!(config.pool.queue_capacity, 0);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn invalid_and_zero_values_are_clamped_or_ignored() {
        let config = RenditionConfig::from_lookup(lookup(&[
            (ENV_WORKERS, "0"),
            (ENV_TX_MAX_ATTEMPTS, "0"),
            (ENV_QUEUE_CAPACITY, "lots"),
        ]));

        assert_eq!(config.pool.workers, 1);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.pool.queue_capacity, 64);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RenditionConfig =
            serde_json::from_str(r#"{ "transform": { "language": "fr" }, "pool": { "workers": 2 } }"#).unwrap();

        assert_eq!(config.transform.language, "fr");
        assert_eq!(config.transform.image_mode, "none");
        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.pool.queue_capacity, 64);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}

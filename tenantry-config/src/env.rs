// Environment variable overrides

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;

/// Default prefix for tenancy environment variables.
pub const ENV_PREFIX: &str = "TENANCY";

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Bool,
    Int,
    List,
}

/// Recognized variables (without prefix) and where they land in the tree.
const KEYS: &[(&str, &[&str], Kind)] = &[
    ("mode", &["mode"], Kind::Str),
    ("base_domain", &["base_domain"], Kind::Str),
    ("central_domains", &["central_domains"], Kind::List),
    ("reserved_subdomains", &["reserved_subdomains"], Kind::List),
    ("central_connection", &["central_connection"], Kind::Str),
    ("database_tenant_connection", &["database", "tenant_connection"], Kind::Str),
    ("database_prefix", &["database", "prefix"], Kind::Str),
    ("database_suffix", &["database", "suffix"], Kind::Str),
    (
        "provisioning_auto_create_database",
        &["provisioning", "auto_create_database"],
        Kind::Bool,
    ),
    ("provisioning_auto_migrate", &["provisioning", "auto_migrate"], Kind::Bool),
    ("provisioning_auto_seed", &["provisioning", "auto_seed"], Kind::Bool),
    ("provisioning_queue", &["provisioning", "queue"], Kind::Bool),
    ("provisioning_queue_name", &["provisioning", "queue_name"], Kind::Str),
    ("provisioning_seeder", &["provisioning", "seeder"], Kind::Str),
    ("provisioning_migration_path", &["provisioning", "migration_path"], Kind::Str),
    ("provisioning_max_attempts", &["provisioning", "max_attempts"], Kind::Int),
    ("cache_enabled", &["cache", "enabled"], Kind::Bool),
    ("cache_ttl", &["cache", "ttl"], Kind::Int),
    ("cache_prefix", &["cache", "prefix"], Kind::Str),
    ("models_tenant_table", &["models", "tenant_table"], Kind::Str),
    ("models_domain_table", &["models", "domain_table"], Kind::Str),
];

/// Environment variable loader
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load all variables carrying the prefix, keyed by the lowercased
    /// remainder (`TENANCY_CACHE_TTL` -> `cache_ttl`).
    pub fn load(&self) -> HashMap<String, String> {
        self.collect(env::vars())
    }

    /// Same as [`load`](Self::load) over an explicit variable set.
    pub fn collect<I, K, V>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let marker = format!("{}_", self.prefix);
        vars.into_iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(&marker)
                    .map(|rest| (rest.to_lowercase(), value.into()))
            })
            .collect()
    }

    /// Turn collected variables into a JSON overlay for the config tree.
    ///
    /// Unknown variables are ignored; malformed values are errors.
    pub fn overlay(&self, vars: &HashMap<String, String>) -> Result<Value> {
        let mut root = Map::new();

        for (name, path, kind) in KEYS {
            let Some(raw) = vars.get(*name) else {
                continue;
            };
            let value = convert(&format!("{}_{}", self.prefix, name.to_uppercase()), raw, *kind)?;
            insert_path(&mut root, path, value);
        }

        Ok(Value::Object(root))
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

fn convert(key: &str, raw: &str, kind: Kind) -> Result<Value> {
    let raw = raw.trim();
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    };

    Ok(match kind {
        Kind::Str => Value::String(raw.to_string()),
        Kind::Bool => Value::Bool(parse_bool(raw).ok_or_else(invalid)?),
        Kind::Int => Value::from(raw.parse::<u64>().map_err(|_| invalid())?),
        Kind::List => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    // std::env::set_var is unsafe under edition 2024, so these tests feed
    // variables through `collect` instead of the process environment.

    #[test]
    fn test_collect_strips_prefix() {
        let loader = EnvLoader::default();
        let vars = loader.collect([
            ("TENANCY_BASE_DOMAIN", "example.com"),
            ("OTHER_BASE_DOMAIN", "ignored.com"),
        ]);

        assert_eq!(vars.get("base_domain"), Some(&"example.com".to_string()));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_overlay_types() {
        let loader = EnvLoader::default();
        let vars = loader.collect([
            ("TENANCY_CACHE_TTL", "120"),
            ("TENANCY_PROVISIONING_QUEUE", "yes"),
            ("TENANCY_RESERVED_SUBDOMAINS", "www, api,,admin"),
        ]);

        let overlay = loader.overlay(&vars).unwrap();
        assert_eq!(overlay["cache"]["ttl"], 120);
        assert_eq!(overlay["provisioning"]["queue"], true);
        assert_eq!(
            overlay["reserved_subdomains"],
            serde_json::json!(["www", "api", "admin"])
        );
    }

    #[test]
    fn test_overlay_rejects_bad_bool() {
        let loader = EnvLoader::default();
        let vars = loader.collect([("TENANCY_CACHE_ENABLED", "maybe")]);

        let err = loader.overlay(&vars).unwrap_err();
        assert!(err.to_string().contains("TENANCY_CACHE_ENABLED"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let loader = EnvLoader::default();
        let vars = loader.collect([("TENANCY_SOMETHING_ELSE", "1")]);

        let overlay = loader.overlay(&vars).unwrap();
        assert_eq!(overlay, serde_json::json!({}));
    }
}

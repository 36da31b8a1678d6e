// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Configuration file loader
///
/// Produces a JSON tree that is merged over the defaults before the
/// final [`TenancyConfig`](crate::TenancyConfig) is deserialized.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))?;

        Ok(Self::new(format))
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
            FileFormat::Toml => {
                let toml_value: toml::Value =
                    toml::from_str(content).map_err(|e| ConfigError::Parse {
                        format: "TOML",
                        message: e.to_string(),
                    })?;
                serde_json::to_value(toml_value)
                    .map_err(|e| ConfigError::Malformed(e.to_string()))?
            }
        };

        // Files may nest everything under a `[tenancy]` table
        match value {
            Value::Object(mut map) if map.len() == 1 && map.contains_key("tenancy") => {
                Ok(map.remove("tenancy").unwrap_or(Value::Null))
            }
            Value::Object(map) => Ok(Value::Object(map)),
            other => Err(ConfigError::Parse {
                format: self.format.name(),
                message: format!("expected a table at the top level, found {}", kind_of(&other)),
            }),
        }
    }
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let result = loader
            .parse(r#"{"mode": "multi", "base_domain": "example.com"}"#)
            .unwrap();
        assert_eq!(result["base_domain"], "example.com");
    }

    #[test]
    fn test_parse_toml_with_tenancy_table() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let toml = r#"
            [tenancy]
            base_domain = "example.com"

            [tenancy.cache]
            ttl = 60
        "#;

        let result = loader.parse(toml).unwrap();
        assert_eq!(result["base_domain"], "example.com");
        assert_eq!(result["cache"]["ttl"], 60);
    }

    #[test]
    fn test_parse_rejects_non_table() {
        let loader = ConfigLoader::new(FileFormat::Json);
        assert!(loader.parse("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert!(ConfigLoader::auto("tenancy").is_err());
    }

    #[test]
    fn test_merge_nested() {
        let mut base = json!({"cache": {"enabled": true, "ttl": 3600}, "mode": "multi"});
        merge(&mut base, json!({"cache": {"ttl": 60}}));

        assert_eq!(base["cache"]["enabled"], true);
        assert_eq!(base["cache"]["ttl"], 60);
        assert_eq!(base["mode"], "multi");
    }
}

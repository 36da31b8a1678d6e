//! Integration tests for tenantry-config

use std::io::Write;
use tempfile::Builder;
use tenantry_config::*;

fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_toml_file_then_env_vars() {
    let file = write_file(
        ".toml",
        r#"
mode = "multi-database"
base_domain = "example.com"
central_domains = ["example.com"]

[provisioning]
queue = true
queue_name = "tenancy"
seeder = "TenantSeeder"

[cache]
ttl = 600
"#,
    );

    let config = TenancyConfig::builder()
        .add_file(file.path())
        .with_env_vars([
            ("TENANCY_CACHE_TTL", "30"),
            ("TENANCY_RESERVED_SUBDOMAINS", "www, status"),
            ("UNRELATED_VAR", "ignored"),
        ])
        .build()
        .unwrap();

    assert!(config.is_multi_database());
    assert_eq!(config.base_domain, "example.com");
    assert!(config.provisioning.queue);
    assert_eq!(config.provisioning.queue_name, "tenancy");
    assert_eq!(config.provisioning.seeder.as_deref(), Some("TenantSeeder"));
    assert_eq!(config.cache.ttl, 30);
    assert_eq!(config.reserved_subdomains, vec!["www", "status"]);
    // Untouched sections keep their defaults.
    assert_eq!(config.database.prefix, "tenant_");
    assert_eq!(config.models.tenant_table, "tenants");
}

#[test]
fn test_json_file() {
    let file = write_file(
        ".json",
        r#"{"mode": "single", "base_domain": "saas.test", "central_domains": ["saas.test"]}"#,
    );

    let config = TenancyConfig::builder().add_file(file.path()).build().unwrap();

    assert_eq!(config.mode, TenancyMode::Single);
    assert!(config.is_central_domain("SAAS.test"));
}

#[test]
fn test_unsupported_extension() {
    let file = write_file(".yaml", "mode: single\n");

    let err = TenancyConfig::builder()
        .add_file(file.path())
        .build()
        .unwrap_err();

    assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "yaml"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = TenancyConfig::builder()
        .with_env_vars([("TENANCY_PROVISIONING_MAX_ATTEMPTS", "0")])
        .build()
        .unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { ref field, .. } if field == "provisioning.max_attempts")
    );

    let err = TenancyConfig::builder()
        .with_env_vars([("TENANCY_RESERVED_SUBDOMAINS", "www,bad.label")])
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "reserved_subdomains"));

    let err = TenancyConfig::builder()
        .with_env_vars([("TENANCY_CACHE_ENABLED", "perhaps")])
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TENANCY_CACHE_ENABLED"));
}

#[test]
fn test_custom_prefix() {
    let config = TenancyConfig::builder()
        .env_prefix("APP_TENANCY")
        .with_env_vars([
            ("APP_TENANCY_BASE_DOMAIN", "corp.example"),
            ("TENANCY_BASE_DOMAIN", "ignored.example"),
        ])
        .build()
        .unwrap();

    assert_eq!(config.base_domain, "corp.example");
}

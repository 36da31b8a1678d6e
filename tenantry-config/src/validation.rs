// Configuration validation

use crate::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static DNS_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").ok());

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(field, "cannot be empty"));
        }
        Ok(())
    }

    /// Validate that a number is at least `min`
    pub fn at_least<T: PartialOrd + std::fmt::Display>(value: T, min: T, field: &str) -> Result<()> {
        if value < min {
            return Err(ConfigError::invalid(field, format!("must be at least {min}")));
        }
        Ok(())
    }

    /// Validate that a number lies within `min..=max`
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::invalid(
                field,
                format!("must be between {min} and {max}"),
            ));
        }
        Ok(())
    }

    /// Validate a single lowercase DNS label (`acme`, `my-shop`)
    pub fn is_label(value: &str, field: &str) -> Result<()> {
        let valid = DNS_LABEL
            .as_ref()
            .map(|re| re.is_match(value))
            .unwrap_or(false);

        if !valid {
            return Err(ConfigError::invalid(
                field,
                format!("must be a single DNS label, got '{value}'"),
            ));
        }
        Ok(())
    }

    /// Validate a host name made of DNS labels, or an IPv4 address.
    pub fn is_host(value: &str, field: &str) -> Result<()> {
        let invalid = || ConfigError::invalid(field, format!("must be a valid host name, got '{value}'"));

        if value.is_empty() || value.len() > 253 {
            return Err(invalid());
        }
        if value.parse::<std::net::Ipv4Addr>().is_ok() {
            return Ok(());
        }

        for label in value.split('.') {
            Self::is_label(label, field).map_err(|_| invalid())?;
        }
        Ok(())
    }
}

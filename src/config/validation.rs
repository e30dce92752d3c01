//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and that
//! addresses and URLs are usable. Every problem is reported, not just the
//! first one.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Highest backoff exponent accepted; keeps 2^tier well inside u64.
pub const MAX_BACKOFF_CAP_TIER: u32 = 16;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.base_url: '{0}' must be an absolute http(s) URL")]
    InvalidUpstreamUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("queue.backoff_cap_tier: {0} exceeds the maximum of {MAX_BACKOFF_CAP_TIER}")]
    BackoffTierTooLarge(u32),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidUpstreamUrl(
            config.upstream.base_url.clone(),
        )),
    }

    let positives = [
        ("upstream.timeout_secs", config.upstream.timeout_secs == 0),
        ("upstream.max_response_bytes", config.upstream.max_response_bytes == 0),
        ("timeouts.request_secs", config.timeouts.request_secs == 0),
        ("security.max_body_size", config.security.max_body_size == 0),
        ("queue.max_active_calls", config.queue.max_active_calls == 0),
        ("queue.backoff_unit_ms", config.queue.backoff_unit_ms == 0),
    ];
    errors.extend(
        positives
            .into_iter()
            .filter(|(_, is_zero)| *is_zero)
            .map(|(field, _)| ValidationError::Zero(field)),
    );

    if config.queue.backoff_cap_tier > MAX_BACKOFF_CAP_TIER {
        errors.push(ValidationError::BackoffTierTooLarge(config.queue.backoff_cap_tier));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.upstream.base_url = "ftp://example.com".into();
        config.queue.max_active_calls = 0;
        config.queue.backoff_cap_tier = 40;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("queue.max_active_calls")));
        assert!(errors.contains(&ValidationError::BackoffTierTooLarge(40)));
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_relative_upstream_rejected() {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "/just/a/path".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidUpstreamUrl("/just/a/path".into())]
        );
    }
}

use crate::error::{AppError, Result};

use super::{Config, ExecutionMode, FetchPolicy, ProviderConfig, SymbolSourceConfig};

/// Validate a run configuration and surface every problem in one error.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    if config.output_path.as_os_str().is_empty() {
        issues.push("output path must not be empty".to_string());
    }

    validate_source(&config.source, &mut issues);
    validate_provider(&config.provider, &mut issues);
    validate_policy(&config.policy, &mut issues);
    validate_execution(config, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "run config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_source(source: &SymbolSourceConfig, issues: &mut Vec<String>) {
    match source {
        SymbolSourceConfig::Classification => {}
        SymbolSourceConfig::Hosted {
            store,
            fallback_file,
        } => {
            if store.url_env.trim().is_empty() {
                issues.push("source.url_env must name an environment variable".to_string());
            }
            if store.table.trim().is_empty() {
                issues.push("source.table must not be empty".to_string());
            }
            if store.column.trim().is_empty() {
                issues.push("source.column must not be empty".to_string());
            }
            if fallback_file.as_os_str().is_empty() {
                issues.push("source.fallback_file must not be empty".to_string());
            }
        }
        SymbolSourceConfig::File { path } => {
            if path.as_os_str().is_empty() {
                issues.push("source.path must not be empty".to_string());
            }
        }
    }
}

fn validate_provider(provider: &ProviderConfig, issues: &mut Vec<String>) {
    if provider.listing.url.trim().is_empty() {
        issues.push("provider.listing_url must not be empty".to_string());
    }
    if provider.listing.data_path.is_empty() {
        issues.push("provider.listing_path must contain at least one key".to_string());
    }
    if provider.listing.symbol_field.trim().is_empty()
        || provider.listing.industry_field.trim().is_empty()
    {
        issues.push("provider listing field names must not be empty".to_string());
    }
    if provider.history.url.trim().is_empty() {
        issues.push("provider.history_url must not be empty".to_string());
    }
    if provider.request_timeout.is_zero() {
        issues.push("provider.request_timeout_secs must be greater than zero".to_string());
    }
}

fn validate_policy(policy: &FetchPolicy, issues: &mut Vec<String>) {
    if !policy.price_scale.is_finite() || policy.price_scale <= 0.0 {
        issues.push(format!(
            "policy.price_scale must be a positive number, got {}",
            policy.price_scale
        ));
    }
    if policy.lookback_days == 0 {
        issues.push("policy.lookback_days must be at least 1".to_string());
    }
}

fn validate_execution(config: &Config, issues: &mut Vec<String>) {
    if let ExecutionMode::Parallel { workers: 0 } = config.execution {
        issues.push("execution.workers must be at least 1".to_string());
    }
    if config.progress_every == Some(0) {
        issues.push("execution.progress_every must be at least 1".to_string());
    }
}

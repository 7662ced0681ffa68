use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{AppError, Context, Result};

use super::{
    validator, Config, ExecutionMode, FetchPolicy, HostedStoreConfig, ProviderConfig,
    SymbolSourceConfig, DEFAULT_SYMBOLS_FILE, DEFAULT_WORKERS,
};

/// Load a JSON run configuration on top of `Config::builtin()`.
///
/// The path is tried as given, next to the executable, then under the
/// current directory. Relative paths inside the file resolve against the
/// directory holding it.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();

    let search_paths = vec![
        path.to_path_buf(),
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.join(path)))
            .unwrap_or_else(|| path.to_path_buf()),
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    ];

    let mut last_error = None;

    for search_path in search_paths {
        match fs::read_to_string(&search_path) {
            Ok(content) => {
                let root = search_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                let config = parse_config(&content, &root).with_context(|| {
                    format!("failed to parse run config at {}", search_path.display())
                })?;
                return Ok(config);
            }
            Err(err) => {
                last_error = Some(format!("failed to read {}: {}", search_path.display(), err));
            }
        }
    }

    Err(AppError::message(format!(
        "could not find run config. Last error: {}",
        last_error.unwrap_or_else(|| "no search paths".to_string())
    )))
}

/// Parse a config document and apply it over the builtin defaults.
pub fn parse_config(json: &str, root: &Path) -> Result<Config> {
    let raw: RawConfig = serde_json::from_str(json)?;
    let config = raw.into_config(root)?;
    validator::validate_config(&config)?;
    Ok(config)
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    source: Option<RawSourceConfig>,
    #[serde(default)]
    execution: RawExecutionConfig,
    #[serde(default)]
    policy: RawPolicyConfig,
    #[serde(default)]
    provider: RawProviderConfig,
    #[serde(default)]
    dry_run: bool,
}

impl RawConfig {
    fn into_config(self, root: &Path) -> Result<Config> {
        let mut config = Config::builtin();

        if let Some(output) = self.output {
            config.output_path = normalize_path(root, output);
        }
        if let Some(source) = self.source {
            config.source = source.into_source(root);
        }

        config.execution = self.execution.mode()?;
        config.progress_every = self.execution.progress_every;
        config.policy = self.policy.into_policy(config.policy);
        self.provider.apply(&mut config.provider);
        config.dry_run = self.dry_run;

        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSourceConfig {
    Classification,
    Hosted {
        #[serde(default)]
        url_env: Option<String>,
        #[serde(default)]
        table: Option<String>,
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        filter: Option<String>,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        fallback_file: Option<String>,
    },
    File {
        path: String,
    },
}

impl RawSourceConfig {
    fn into_source(self, root: &Path) -> SymbolSourceConfig {
        match self {
            RawSourceConfig::Classification => SymbolSourceConfig::Classification,
            RawSourceConfig::Hosted {
                url_env,
                table,
                column,
                filter,
                headers,
                fallback_file,
            } => {
                let defaults = HostedStoreConfig::default();
                SymbolSourceConfig::Hosted {
                    store: HostedStoreConfig {
                        url_env: url_env.unwrap_or(defaults.url_env),
                        table: table.unwrap_or(defaults.table),
                        column: column.unwrap_or(defaults.column),
                        filter: filter.filter(|f| !f.trim().is_empty()),
                        headers: headers.unwrap_or(defaults.headers),
                    },
                    fallback_file: normalize_path(
                        root,
                        fallback_file.unwrap_or_else(|| DEFAULT_SYMBOLS_FILE.to_string()),
                    ),
                }
            }
            RawSourceConfig::File { path } => SymbolSourceConfig::File {
                path: normalize_path(root, path),
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawExecutionConfig {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default)]
    progress_every: Option<usize>,
}

impl RawExecutionConfig {
    fn mode(&self) -> Result<ExecutionMode> {
        let workers = self.workers.unwrap_or(DEFAULT_WORKERS);
        match self.mode.as_deref().map(str::trim) {
            None | Some("sequential") => Ok(ExecutionMode::Sequential),
            Some("parallel") => Ok(ExecutionMode::Parallel { workers }),
            Some(other) => Err(AppError::message(format!(
                "unsupported execution mode `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawPolicyConfig {
    #[serde(default)]
    cooldown_secs: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    inter_request_delay_ms: Option<u64>,
    #[serde(default)]
    lookback_days: Option<u32>,
    #[serde(default)]
    price_scale: Option<f64>,
}

impl RawPolicyConfig {
    fn into_policy(self, base: FetchPolicy) -> FetchPolicy {
        FetchPolicy {
            cooldown: self
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(base.cooldown),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            inter_request_delay: self
                .inter_request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.inter_request_delay),
            lookback_days: self.lookback_days.unwrap_or(base.lookback_days),
            price_scale: self.price_scale.unwrap_or(base.price_scale),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawProviderConfig {
    #[serde(default)]
    listing_url: Option<String>,
    #[serde(default)]
    listing_query: Option<String>,
    #[serde(default)]
    listing_path: Option<Vec<String>>,
    #[serde(default)]
    symbol_field: Option<String>,
    #[serde(default)]
    industry_field: Option<String>,
    #[serde(default)]
    history_url: Option<String>,
    #[serde(default)]
    time_frame: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

impl RawProviderConfig {
    fn apply(self, provider: &mut ProviderConfig) {
        if let Some(url) = self.listing_url {
            provider.listing.url = url;
        }
        if let Some(query) = self.listing_query {
            provider.listing.query = query;
        }
        if let Some(path) = self.listing_path {
            provider.listing.data_path = path;
        }
        if let Some(field) = self.symbol_field {
            provider.listing.symbol_field = field;
        }
        if let Some(field) = self.industry_field {
            provider.listing.industry_field = field;
        }
        if let Some(url) = self.history_url {
            provider.history.url = url;
        }
        if let Some(frame) = self.time_frame {
            provider.history.time_frame = frame;
        }
        // Extra headers extend the builtin set, same-name entries win.
        provider.headers.extend(self.headers);
        if let Some(secs) = self.request_timeout_secs {
            provider.request_timeout = Duration::from_secs(secs);
        }
    }
}

fn normalize_path(root: &Path, value: String) -> PathBuf {
    let path = PathBuf::from(&value);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_keeps_builtin_defaults() {
        let config = parse_config("{}", Path::new("")).expect("parse");
        assert_eq!(config.execution, ExecutionMode::Sequential);
        assert_eq!(config.output_path, PathBuf::from("prices.json"));
        assert!(matches!(config.source, SymbolSourceConfig::Classification));
        assert_eq!(config.policy, FetchPolicy::default());
    }

    #[test]
    fn parses_hosted_parallel_config() {
        let json = r#"{
            "output": "site/prices.json",
            "source": {
                "type": "hosted",
                "table": "portfolio",
                "column": "ticker",
                "filter": "active=eq.true",
                "fallback_file": "symbols.json"
            },
            "execution": { "mode": "parallel", "workers": 4 },
            "policy": { "cooldown_secs": 5, "max_retries": 1, "inter_request_delay_ms": 0 },
            "provider": { "request_timeout_secs": 10 }
        }"#;

        let config = parse_config(json, Path::new("/srv/job")).expect("parse");
        assert_eq!(config.output_path, PathBuf::from("/srv/job/site/prices.json"));
        assert_eq!(config.execution, ExecutionMode::Parallel { workers: 4 });
        assert_eq!(config.progress_every(), 100);
        assert_eq!(config.policy.cooldown, Duration::from_secs(5));
        assert_eq!(config.policy.max_retries, 1);
        assert_eq!(config.policy.inter_request_delay, Duration::ZERO);
        assert_eq!(config.provider.request_timeout, Duration::from_secs(10));

        match config.source {
            SymbolSourceConfig::Hosted {
                store,
                fallback_file,
            } => {
                assert_eq!(store.table, "portfolio");
                assert_eq!(store.column, "ticker");
                assert_eq!(store.filter.as_deref(), Some("active=eq.true"));
                assert_eq!(store.url_env, "SUPABASE_URL");
                assert_eq!(fallback_file, PathBuf::from("/srv/job/symbols.json"));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn hosted_source_defaults_fallback_next_to_config() {
        let json = r#"{"source": {"type": "hosted"}}"#;
        let config = parse_config(json, Path::new("/srv/job")).expect("parse");
        match config.source {
            SymbolSourceConfig::Hosted { fallback_file, .. } => {
                assert_eq!(fallback_file, PathBuf::from("/srv/job/symbols.json"))
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = parse_config(r#"{"execution": {"mode": "turbo"}}"#, Path::new(""))
            .expect_err("mode should be rejected");
        assert!(err.to_string().contains("turbo"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_invalid_policy() {
        let err = parse_config(r#"{"policy": {"price_scale": 0}}"#, Path::new(""))
            .expect_err("scale should be rejected");
        assert!(
            err.to_string().contains("price_scale"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn loads_config_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("job.json");
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(br#"{"source": {"type": "file", "path": "list.txt"}}"#)
            .expect("write");

        let config = load_config(&path).expect("load");
        match config.source {
            SymbolSourceConfig::File { path } => assert_eq!(path, dir.path().join("list.txt")),
            other => panic!("unexpected source {other:?}"),
        }
    }
}

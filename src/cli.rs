use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use price_snapshot::config::{
    Config, ExecutionMode, HostedStoreConfig, SymbolSourceConfig, DEFAULT_SYMBOLS_FILE,
    DEFAULT_WORKERS,
};

#[derive(Parser)]
#[command(name = "price-snapshot")]
#[command(about = "Refresh the latest closing prices and industries into a JSON snapshot")]
#[command(version)]
pub struct Cli {
    /// JSON run config applied over the builtin defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Snapshot file to read and replace
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Pool size for parallel mode; without `--mode` it selects parallel
    #[arg(short, long)]
    pub workers: Option<usize>,

    #[arg(short, long, value_enum)]
    pub source: Option<Source>,

    /// Static symbol list (JSON `{"symbols": [...]}` or one symbol per line)
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Pause between two requests of the same worker
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Wait after a rate-limit response
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Fetch and merge but do not write the snapshot
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    Sequential,
    Parallel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Source {
    Classification,
    Hosted,
    File,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }

        let workers = self.workers.or(match config.execution {
            ExecutionMode::Parallel { workers } => Some(workers),
            ExecutionMode::Sequential => None,
        });
        match self.mode {
            Some(Mode::Sequential) => config.execution = ExecutionMode::Sequential,
            Some(Mode::Parallel) => {
                config.execution = ExecutionMode::Parallel {
                    workers: workers.unwrap_or(DEFAULT_WORKERS),
                }
            }
            None => {
                if let Some(workers) = self.workers {
                    config.execution = ExecutionMode::Parallel { workers };
                }
            }
        }

        match self.source {
            Some(Source::Classification) => config.source = SymbolSourceConfig::Classification,
            Some(Source::Hosted) => {
                if !matches!(config.source, SymbolSourceConfig::Hosted { .. }) {
                    config.source = SymbolSourceConfig::Hosted {
                        store: HostedStoreConfig::default(),
                        fallback_file: PathBuf::from(DEFAULT_SYMBOLS_FILE),
                    };
                }
            }
            Some(Source::File) => {
                if !matches!(config.source, SymbolSourceConfig::File { .. }) {
                    config.source = SymbolSourceConfig::File {
                        path: PathBuf::from(DEFAULT_SYMBOLS_FILE),
                    };
                }
            }
            None => {}
        }

        // --symbols-file is the static list for `file`, the fallback for `hosted`.
        if let Some(path) = &self.symbols_file {
            match &mut config.source {
                SymbolSourceConfig::File { path: current } => *current = path.clone(),
                SymbolSourceConfig::Hosted { fallback_file, .. } => {
                    *fallback_file = path.clone()
                }
                SymbolSourceConfig::Classification => {
                    if self.source.is_none() {
                        config.source = SymbolSourceConfig::File { path: path.clone() };
                    }
                }
            }
        }

        if let Some(ms) = self.delay_ms {
            config.policy.inter_request_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.cooldown_secs {
            config.policy.cooldown = Duration::from_secs(secs);
        }
        if let Some(retries) = self.max_retries {
            config.policy.max_retries = retries;
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("price-snapshot").chain(args.iter().copied()))
    }

    #[test]
    fn parallel_mode_uses_default_pool() {
        let mut config = Config::builtin();
        parse(&["--mode", "parallel"]).apply(&mut config);
        assert_eq!(config.execution, ExecutionMode::Parallel { workers: 10 });
    }

    #[test]
    fn workers_override_existing_parallel_config() {
        let mut config = Config::builtin();
        config.execution = ExecutionMode::Parallel { workers: 4 };
        parse(&["--workers", "6"]).apply(&mut config);
        assert_eq!(config.execution, ExecutionMode::Parallel { workers: 6 });
    }

    #[test]
    fn workers_alone_switch_to_parallel() {
        let mut config = Config::builtin();
        parse(&["--workers", "3"]).apply(&mut config);
        assert_eq!(config.execution, ExecutionMode::Parallel { workers: 3 });
    }

    #[test]
    fn explicit_sequential_mode_wins_over_workers() {
        let mut config = Config::builtin();
        parse(&["--mode", "sequential", "--workers", "3"]).apply(&mut config);
        assert_eq!(config.execution, ExecutionMode::Sequential);
    }

    #[test]
    fn symbols_file_becomes_hosted_fallback() {
        let mut config = Config::builtin();
        parse(&["--source", "hosted", "--symbols-file", "list.json"]).apply(&mut config);
        match config.source {
            SymbolSourceConfig::Hosted { fallback_file, .. } => {
                assert_eq!(fallback_file, PathBuf::from("list.json"))
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn hosted_source_falls_back_to_default_symbols_file() {
        let mut config = Config::builtin();
        parse(&["--source", "hosted"]).apply(&mut config);
        match config.source {
            SymbolSourceConfig::Hosted { fallback_file, .. } => {
                assert_eq!(fallback_file, PathBuf::from("symbols.json"))
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn pacing_overrides_apply() {
        let mut config = Config::builtin();
        parse(&["--delay-ms", "0", "--cooldown-secs", "1", "--max-retries", "5", "--dry-run"])
            .apply(&mut config);
        assert_eq!(config.policy.inter_request_delay, Duration::ZERO);
        assert_eq!(config.policy.cooldown, Duration::from_secs(1));
        assert_eq!(config.policy.max_retries, 5);
        assert!(config.dry_run);
    }
}

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;
pub mod validator;

pub use loader::load_config;
pub use validator::validate_config;

pub const DEFAULT_OUTPUT_FILE: &str = "prices.json";
pub const DEFAULT_SYMBOLS_FILE: &str = "symbols.json";
pub const DEFAULT_INTER_REQUEST_DELAY: Duration = Duration::from_millis(1_500);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(65);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
/// Provider closes are quoted in thousands of the currency unit.
pub const DEFAULT_PRICE_SCALE: f64 = 1000.0;
pub const DEFAULT_WORKERS: usize = 10;
pub const SEQUENTIAL_PROGRESS_EVERY: usize = 50;
pub const PARALLEL_PROGRESS_EVERY: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const VCI_GRAPHQL_ENDPOINT: &str = "https://trading.vietcap.com.vn/data-mt/graphql";
const VCI_CHART_ENDPOINT: &str = "https://trading.vietcap.com.vn/api/chart/OHLCChart/gap";
const VCI_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const VCI_LISTING_QUERY: &str =
    "{CompaniesListingInfo {ticker organName icbName3 enIcbName3 __typename}}";

/// Rate-limit and pacing knobs shared by every price request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Sleep applied after a rate-limit response before retrying.
    pub cooldown: Duration,
    pub max_retries: u32,
    /// Minimum spacing between two requests issued by the same worker.
    pub inter_request_delay: Duration,
    pub lookback_days: u32,
    pub price_scale: f64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            max_retries: DEFAULT_MAX_RETRIES,
            inter_request_delay: DEFAULT_INTER_REQUEST_DELAY,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            price_scale: DEFAULT_PRICE_SCALE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionMode {
    pub fn default_progress_every(&self) -> usize {
        match self {
            ExecutionMode::Sequential => SEQUENTIAL_PROGRESS_EVERY,
            ExecutionMode::Parallel { .. } => PARALLEL_PROGRESS_EVERY,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel { workers } => write!(f, "parallel ({workers} workers)"),
        }
    }
}

/// Remote table queried for the hosted symbol universe.
#[derive(Debug, Clone)]
pub struct HostedStoreConfig {
    /// Environment variable holding the store base URL.
    pub url_env: String,
    pub table: String,
    pub column: String,
    /// Extra PostgREST-style filter appended to the query, e.g. `quantity=gt.0`.
    pub filter: Option<String>,
    /// Header templates; `${VAR}` placeholders are expanded from the environment.
    pub headers: HashMap<String, String>,
}

impl Default for HostedStoreConfig {
    fn default() -> Self {
        let headers = HashMap::from([
            ("apikey".to_string(), "${SUPABASE_KEY}".to_string()),
            (
                "Authorization".to_string(),
                "Bearer ${SUPABASE_KEY}".to_string(),
            ),
        ]);

        Self {
            url_env: "SUPABASE_URL".to_string(),
            table: "holdings".to_string(),
            column: "symbol".to_string(),
            filter: None,
            headers,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SymbolSourceConfig {
    /// Every symbol the provider classifies.
    Classification,
    /// Hosted table, with a static list read whenever it yields nothing.
    Hosted {
        store: HostedStoreConfig,
        fallback_file: PathBuf,
    },
    File {
        path: PathBuf,
    },
}

impl SymbolSourceConfig {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolSourceConfig::Classification => "classification",
            SymbolSourceConfig::Hosted { .. } => "hosted",
            SymbolSourceConfig::File { .. } => "file",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingEndpoint {
    pub url: String,
    pub query: String,
    /// Keys leading from the response root to the array of listing rows.
    pub data_path: Vec<String>,
    pub symbol_field: String,
    pub industry_field: String,
}

#[derive(Debug, Clone)]
pub struct HistoryEndpoint {
    pub url: String,
    pub time_frame: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub listing: ListingEndpoint,
    pub history: HistoryEndpoint,
    pub headers: HashMap<String, String>,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let headers = HashMap::from([
            (
                "User-Agent".to_string(),
                VCI_USER_AGENT.to_string(),
            ),
            (
                "Referer".to_string(),
                "https://trading.vietcap.com.vn/".to_string(),
            ),
            (
                "Origin".to_string(),
                "https://trading.vietcap.com.vn".to_string(),
            ),
            (
                "Accept-Language".to_string(),
                "en-US,en;q=0.9,vi;q=0.8".to_string(),
            ),
        ]);

        Self {
            listing: ListingEndpoint {
                url: VCI_GRAPHQL_ENDPOINT.to_string(),
                query: VCI_LISTING_QUERY.to_string(),
                data_path: vec!["data".to_string(), "CompaniesListingInfo".to_string()],
                symbol_field: "ticker".to_string(),
                industry_field: "icbName3".to_string(),
            },
            history: HistoryEndpoint {
                url: VCI_CHART_ENDPOINT.to_string(),
                time_frame: "ONE_DAY".to_string(),
            },
            headers,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Everything one refresh run needs, assembled from defaults, the optional
/// config file and command-line overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub output_path: PathBuf,
    pub source: SymbolSourceConfig,
    pub provider: ProviderConfig,
    pub policy: FetchPolicy,
    pub execution: ExecutionMode,
    /// Completions between progress lines; `None` picks the mode default.
    pub progress_every: Option<usize>,
    pub dry_run: bool,
}

impl Config {
    pub fn builtin() -> Self {
        Config {
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            source: SymbolSourceConfig::Classification,
            provider: ProviderConfig::default(),
            policy: FetchPolicy::default(),
            execution: ExecutionMode::Sequential,
            progress_every: None,
            dry_run: false,
        }
    }

    pub fn progress_every(&self) -> usize {
        self.progress_every
            .unwrap_or_else(|| self.execution.default_progress_every())
            .max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

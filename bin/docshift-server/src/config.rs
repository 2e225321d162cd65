//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use docshift_core::Programs;

/// Runtime configuration for docshift-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; unset means wildcard.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_openapi: bool,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// Directory task workspaces are created under.
    pub workspace_root: PathBuf,

    /// Delay between a download and the retirement of its task.
    pub cleanup_delay: Duration,

    /// Retire terminal tasks older than this; `None` disables the sweeper.
    pub task_ttl: Option<Duration>,

    /// How often the sweeper looks for expired tasks.
    pub sweep_interval: Duration,

    /// External programs used by the conversion operations.
    pub programs: Programs,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("DOCSHIFT_BIND", &defaults.bind_address),
            log_level: env_or("DOCSHIFT_LOG", &defaults.log_level),
            log_json: bool_env("DOCSHIFT_LOG_JSON", defaults.log_json),
            cors_allowed_origins: std::env::var("DOCSHIFT_CORS_ORIGINS").ok(),
            enable_openapi: bool_env("DOCSHIFT_ENABLE_OPENAPI", defaults.enable_openapi),
            max_upload_bytes: std::env::var("DOCSHIFT_MAX_UPLOAD_MB")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map_or(defaults.max_upload_bytes, |mb| mb.saturating_mul(1024 * 1024)),
            workspace_root: path_env("DOCSHIFT_WORKSPACE_ROOT", defaults.workspace_root),
            cleanup_delay: secs_env("DOCSHIFT_CLEANUP_DELAY_SECS", defaults.cleanup_delay),
            task_ttl: match parse_env::<u64>("DOCSHIFT_TASK_TTL_SECS", 0) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            sweep_interval: secs_env("DOCSHIFT_SWEEP_INTERVAL_SECS", defaults.sweep_interval)
                .max(Duration::from_secs(1)),
            programs: Programs {
                ghostscript: path_env("DOCSHIFT_GS_BIN", defaults.programs.ghostscript),
                qpdf: path_env("DOCSHIFT_QPDF_BIN", defaults.programs.qpdf),
                pdftoppm: path_env("DOCSHIFT_PDFTOPPM_BIN", defaults.programs.pdftoppm),
                soffice: path_env("DOCSHIFT_SOFFICE_BIN", defaults.programs.soffice),
                magick: path_env("DOCSHIFT_MAGICK_BIN", defaults.programs.magick),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_openapi: true,
            max_upload_bytes: 100 * 1024 * 1024,
            workspace_root: std::env::temp_dir(),
            cleanup_delay: Duration::from_secs(10),
            task_ttl: None,
            sweep_interval: Duration::from_secs(60),
            programs: Programs::default(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn secs_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

fn path_env(key: &str, default: PathBuf) -> PathBuf {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

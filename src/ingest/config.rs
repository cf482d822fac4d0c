//! Ingestion configuration
//!
//! An [`IngestConfig`] is built once (from defaults, a TOML file and CLI
//! overrides), validated, and then handed by reference to each component's
//! constructor. Nothing reads configuration after construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default REST endpoint of the public Apache Jira instance.
pub const DEFAULT_BASE_URL: &str = "https://issues.apache.org/jira/rest/api/2";

/// Default sustained request rate.
/// Two requests per second stays well inside the public instance's throttle.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 2.0;

/// Default total attempts per remote call (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base backoff delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Default backoff ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

/// Default upper bound of the random jitter added to each backoff.
pub const DEFAULT_MAX_JITTER_MS: u64 = 250;

/// Default number of issues requested per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default safety cap on completed issues per project.
pub const DEFAULT_MAX_ISSUES_PER_PROJECT: u64 = 10_000;

/// Default whole-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of records between durable sink syncs.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Slowest accepted request rate (one request every 1000 seconds).
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Largest page the search endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 1_000;

/// Issue fields requested from the API unless overridden.
pub const DEFAULT_ISSUE_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "priority",
    "assignee",
    "reporter",
    "created",
    "updated",
    "resolutiondate",
    "labels",
    "components",
    "fixVersions",
    "issuetype",
    "project",
    "comment",
];

/// Immutable configuration for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// REST API root, without a trailing `/search` or `/issue`
    pub base_url: String,
    /// Project keys processed in order
    pub projects: Vec<String>,
    /// Sustained request ceiling shared by every call
    pub requests_per_second: f64,
    /// Attempts per remote call, first try included
    pub max_attempts: u32,
    /// Base of the exponential backoff
    pub base_delay_ms: u64,
    /// Ceiling of the exponential backoff (server hints may exceed it)
    pub max_delay_ms: u64,
    /// Upper bound of the uniform jitter added to computed delays
    pub max_jitter_ms: u64,
    /// Issues requested per search page
    pub page_size: u32,
    /// Safety cap on completed issues per project, across runs
    pub max_issues_per_project: u64,
    /// Whole-request timeout
    pub request_timeout_secs: u64,
    /// TCP connect timeout
    pub connect_timeout_secs: u64,
    /// Checkpoint file location
    pub checkpoint_path: PathBuf,
    /// JSON-lines output file location
    pub output_path: PathBuf,
    /// Records between durable sink syncs
    pub batch_size: usize,
    /// Fields requested for pages and details
    pub issue_fields: Vec<String>,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            projects: vec!["SPARK".to_string(), "KAFKA".to_string(), "HADOOP".to_string()],
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
            page_size: DEFAULT_PAGE_SIZE,
            max_issues_per_project: DEFAULT_MAX_ISSUES_PER_PROJECT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            checkpoint_path: PathBuf::from("data/checkpoint.json"),
            output_path: PathBuf::from("data/issues.jsonl"),
            batch_size: DEFAULT_BATCH_SIZE,
            issue_fields: DEFAULT_ISSUE_FIELDS.iter().map(|f| f.to_string()).collect(),
            user_agent: format!("jira-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl IngestConfig {
    /// Load a configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Check every value before any component is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("base_url '{}' is not a URL: {e}", self.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "base_url must use http or https, got '{}'",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(invalid(format!("base_url '{}' cannot be a base", self.base_url)));
        }

        if self.projects.is_empty() {
            return Err(invalid("at least one project is required"));
        }
        for project in &self.projects {
            if project.trim().is_empty() {
                return Err(invalid("project ids must not be blank"));
            }
            if !project
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(invalid(format!(
                    "project id '{project}' may only contain ASCII letters, digits and '_'"
                )));
            }
        }

        if !self.requests_per_second.is_finite()
            || self.requests_per_second < MIN_REQUESTS_PER_SECOND
        {
            return Err(invalid(format!(
                "requests_per_second must be a number of at least {MIN_REQUESTS_PER_SECOND}, got {}",
                self.requests_per_second
            )));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be at least 1"));
        }
        if self.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms must be greater than zero"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(format!(
                "max_delay_ms ({}) must not be smaller than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.max_issues_per_project == 0 {
            return Err(invalid("max_issues_per_project must be at least 1"));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(invalid("timeouts must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(invalid("checkpoint_path must not be empty"));
        }
        if self.issue_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(invalid("issue_fields must not contain blank entries"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent must not be blank"));
        }
        Ok(())
    }

    /// Base backoff delay
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff ceiling
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Jitter upper bound
    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    /// Whole-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// TCP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Comma-separated field list for the `fields` query parameter
    pub fn fields_param(&self) -> String {
        self.issue_fields.join(",")
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Configuration errors. All of them are fatal before any request is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

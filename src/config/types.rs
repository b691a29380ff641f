use serde::Deserialize;

/// Main configuration structure for Static-Mirror
///
/// Every section is optional; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Worker pool and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Number of parallel download workers (1-100)
    pub workers: u32,

    /// Maximum number of attempts per asset, the first one included
    pub max_attempts: u32,

    /// Base retry delay; attempt N waits N times this value (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Bound of the job queue, 0 means `workers * 4`
    pub queue_capacity: usize,

    /// Bound of concurrently sleeping retry timers, 0 means `workers`
    pub max_pending_retries: usize,

    /// How often the progress sink is called (milliseconds)
    pub progress_interval_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            max_attempts: 3,
            retry_base_delay_ms: 200,
            request_timeout_secs: 30,
            queue_capacity: 0,
            max_pending_retries: 0,
            progress_interval_ms: 1000,
        }
    }
}

impl ScraperConfig {
    /// Queue capacity with the `0 => workers * 4` rule applied
    pub fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            self.workers as usize * 4
        } else {
            self.queue_capacity
        }
    }

    /// Retry timer bound with the `0 => workers` rule applied
    pub fn effective_pending_retries(&self) -> usize {
        if self.max_pending_retries == 0 {
            self.workers as usize
        } else {
            self.max_pending_retries
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name sent in the User-Agent header
    pub name: String,

    /// Version sent in the User-Agent header
    pub version: String,

    /// Optional URL with information about the mirror operator
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "static-mirror".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.name, self.version)
        } else {
            format!("{}/{} (+{})", self.name, self.version, self.contact_url)
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory of the mirror
    pub directory: String,

    /// File name of the rewritten document inside `directory`
    pub document: String,

    /// Remove a previous mirror before starting
    pub clean: bool,

    /// Insert the offline error-suppression script into the document
    pub inject_error_suppression: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            document: "index.html".to_string(),
            clean: true,
            inject_error_suppression: true,
        }
    }
}

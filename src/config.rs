//! Configuration management with serde serialization/deserialization
//!
//! One `Config` is built at batch start from an optional JSON file plus CLI
//! overrides and passed by reference into every component; no component reads
//! ambient global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the capture batch
///
/// # Examples
///
/// ```rust
/// use evidence_capture::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     retry_attempts: 5,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding the pre-imported input tables to merge
    pub input_dir: PathBuf,

    /// Directory where the merged master datasets are written
    pub work_dir: PathBuf,

    /// Root directory for run-scoped capture output trees
    pub output_root: PathBuf,

    /// 0-based index of the dedup-key column (default: 4)
    ///
    /// A negative value disables deduplication entirely (pass-through merge).
    pub key_column: i64,

    /// 0-based index of the URL column in the master dataset (default: 2)
    pub url_column: usize,

    /// 0-based index of the display-domain column (default: 4)
    ///
    /// Distinct from the dedup key; used in output filenames.
    pub domain_column: usize,

    /// Run Chrome headless (default: true)
    pub headless: bool,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Timeout for the lightweight preflight probe (default: 10 seconds)
    pub probe_timeout: Duration,

    /// Preflight retry budget (default: 3 attempts)
    pub retry_attempts: usize,

    /// Fixed delay between preflight attempts (default: 5 seconds)
    ///
    /// Deliberately fixed rather than exponential; the probe is cheap and the
    /// budget is small.
    pub retry_delay: Duration,

    /// Timeout for one full page capture (default: 30 seconds)
    pub capture_timeout: Duration,

    /// Fixed wait after navigation so dynamic content can render
    /// (default: 3 seconds)
    ///
    /// This is a deliberate fixed-wait policy, not a DOM-ready signal; target
    /// pages are adversarial and a readiness signal could be evaded.
    pub settle_delay: Duration,

    /// Wait after the banner/zoom injection for re-layout (default: 2 seconds)
    pub relayout_delay: Duration,

    /// Cooldown after every row, success or failure (default: 5 seconds)
    pub cooldown: Duration,

    /// Page zoom applied before a screenshot, in percent (default: 80)
    pub zoom_percent: u32,

    /// Desktop device profile viewport
    pub desktop_viewport: Viewport,

    /// Mobile device profile viewport
    pub mobile_viewport: Viewport,

    /// User-Agent sent under the mobile device profile
    pub mobile_user_agent: String,

    /// Host substrings identifying high-value platforms whose blocked URLs
    /// are escalated to a dedicated list instead of just the error log
    pub platform_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("all_csv"),
            work_dir: PathBuf::from("csv_stuff"),
            output_root: PathBuf::from("output"),
            key_column: 4,
            url_column: 2,
            domain_column: 4,
            headless: true,
            chrome_path: None,
            probe_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            capture_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            relayout_delay: Duration::from_secs(2),
            cooldown: Duration::from_secs(5),
            zoom_percent: 80,
            desktop_viewport: Viewport::default(),
            mobile_viewport: Viewport::mobile(),
            mobile_user_agent: concat!(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) ",
                "AppleWebKit/605.1.15 (KHTML, like Gecko) ",
                "Version/16.6 Mobile/15E148 Safari/604.1"
            )
            .to_string(),
            platform_patterns: vec![
                "facebook.com".to_string(),
                "instagram.com".to_string(),
                "x.com".to_string(),
                "twitter.com".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), crate::CaptureError> {
        use crate::CaptureError::ConfigurationError;

        if self.retry_attempts == 0 {
            return Err(ConfigurationError(
                "Retry attempts must be greater than 0".into(),
            ));
        }
        if self.zoom_percent == 0 || self.zoom_percent > 100 {
            return Err(ConfigurationError(
                "Zoom percent must be in 1..=100".into(),
            ));
        }
        if self.desktop_viewport.width == 0 || self.desktop_viewport.height == 0 {
            return Err(ConfigurationError(
                "Desktop viewport dimensions must be greater than 0".into(),
            ));
        }
        if self.mobile_viewport.width == 0 || self.mobile_viewport.height == 0 {
            return Err(ConfigurationError(
                "Mobile viewport dimensions must be greater than 0".into(),
            ));
        }
        if self.capture_timeout.as_secs() == 0 {
            return Err(ConfigurationError(
                "Capture timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn viewport(&self, profile: DeviceProfile) -> &Viewport {
        match profile {
            DeviceProfile::Desktop => &self.desktop_viewport,
            DeviceProfile::Mobile => &self.mobile_viewport,
        }
    }
}

/// Browser viewport configuration for one device profile
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels
    pub width: u32,

    /// Viewport height in pixels
    pub height: u32,

    /// Device pixel ratio for high-DPI displays
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        // Tall desktop window so a zoomed-out screenshot covers more of the page
        Self {
            width: 1280,
            height: 2000,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

impl Viewport {
    pub fn mobile() -> Self {
        Self {
            width: 390,
            height: 844,
            device_scale_factor: 2.0,
            mobile: true,
        }
    }
}

/// Device profile a capture pass runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DeviceProfile {
    Desktop,
    Mobile,
}

impl DeviceProfile {
    /// Directory segment for this profile in the output tree
    pub fn dir_name(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "laptop",
            DeviceProfile::Mobile => "mobile",
        }
    }
}

/// What a capture pass produces for each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutputMode {
    Screenshot,
    Html,
}

impl OutputMode {
    pub fn dir_name(&self) -> &'static str {
        match self {
            OutputMode::Screenshot => "png",
            OutputMode::Html => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Screenshot => "png",
            OutputMode::Html => "html",
        }
    }
}

/// Which master dataset variant a pass consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DatasetKind {
    /// Full URLs, subdomains preserved
    Subdomain,
    /// Key column rewritten to canonical `https://www.<domain>` form
    Domain,
}

impl DatasetKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetKind::Subdomain => "total.csv",
            DatasetKind::Domain => "domain.csv",
        }
    }

    /// Extra filename segment so both variants can share an output folder
    pub fn discriminator(&self) -> Option<&'static str> {
        match self {
            DatasetKind::Subdomain => None,
            DatasetKind::Domain => Some("domain"),
        }
    }
}

/// Generate Chrome command-line arguments for one capture pass
///
/// `pass_label` keys the unique user-data directory so concurrent passes
/// never share a Chrome profile.
pub fn get_chrome_args(config: &Config, profile: DeviceProfile, pass_label: &str) -> Vec<String> {
    let viewport = config.viewport(profile);

    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--allow-running-insecure-content".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
        format!(
            "--user-data-dir=/tmp/evidence-capture-{}-{}",
            std::process::id(),
            pass_label
        ),
    ];

    if profile == DeviceProfile::Mobile {
        args.push(format!("--user-agent={}", config.mobile_user_agent));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    profile: DeviceProfile,
    pass_label: &str,
) -> Result<chromiumoxide::browser::BrowserConfig, crate::CaptureError> {
    use chromiumoxide::browser::BrowserConfig;

    let viewport = config.viewport(profile);

    let mut builder = BrowserConfig::builder()
        .window_size(viewport.width, viewport.height)
        .args(get_chrome_args(config, profile, pass_label));

    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(crate::CaptureError::BrowserLaunchFailed)
}

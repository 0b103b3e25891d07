//! Lightweight reachability probe run before committing to a browser capture
//!
//! A header-only request with a fixed timeout and a fixed retry budget. A 429
//! is acceptable-to-proceed: the server is alive, a full page load will still
//! render something worth evidencing. Non-2xx responses and connection faults
//! are retried with a fixed inter-attempt delay before the final verdict.

use crate::{utils, CaptureError, Config};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Final classification of one preflight probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightVerdict {
    /// 2xx or 429; safe to proceed to capture
    Proceed,
    /// Non-2xx on a recognized high-value platform; escalated for manual
    /// follow-up, not just logged
    BlockedKnownPlatform { status: u16 },
    /// Non-2xx elsewhere
    Rejected { status: u16 },
    /// Retry budget exhausted with no response at all
    NetworkFault { detail: String },
}

impl PreflightVerdict {
    pub fn is_proceed(&self) -> bool {
        matches!(self, PreflightVerdict::Proceed)
    }

    pub fn detail(&self) -> String {
        match self {
            PreflightVerdict::Proceed => "ok".to_string(),
            PreflightVerdict::BlockedKnownPlatform { status } => {
                format!("blocked by platform (status {status})")
            }
            PreflightVerdict::Rejected { status } => format!("rejected (status {status})"),
            PreflightVerdict::NetworkFault { detail } => format!("network fault: {detail}"),
        }
    }
}

pub struct PreflightChecker {
    client: reqwest::Client,
    retry_attempts: usize,
    retry_delay: Duration,
    platform_patterns: Vec<String>,
}

impl PreflightChecker {
    pub fn new(config: &Config) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| CaptureError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            platform_patterns: config.platform_patterns.clone(),
        })
    }

    /// Probe one URL; never errors past this boundary
    pub async fn check(&self, url: &str) -> PreflightVerdict {
        let mut last_status: Option<StatusCode> = None;
        let mut last_fault = String::new();

        for attempt in 0..self.retry_attempts {
            match self.client.head(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::TOO_MANY_REQUESTS {
                        return PreflightVerdict::Proceed;
                    }
                    last_status = Some(status);
                }
                Err(e) => {
                    last_fault = e.to_string();
                    last_status = None;
                }
            }

            if attempt + 1 < self.retry_attempts {
                debug!(
                    "Preflight retry for {} after {:?} (attempt {}/{})",
                    url,
                    self.retry_delay,
                    attempt + 1,
                    self.retry_attempts
                );
                sleep(self.retry_delay).await;
            }
        }

        match last_status {
            Some(status) => self.classify_status(url, status.as_u16()),
            None => PreflightVerdict::NetworkFault { detail: last_fault },
        }
    }

    /// Map a final non-2xx status to its verdict class
    fn classify_status(&self, url: &str, status: u16) -> PreflightVerdict {
        if self.is_known_platform(url) {
            PreflightVerdict::BlockedKnownPlatform { status }
        } else {
            PreflightVerdict::Rejected { status }
        }
    }

    fn is_known_platform(&self, url: &str) -> bool {
        let Some(host) = utils::extract_host(url) else {
            return false;
        };
        self.platform_patterns
            .iter()
            .any(|pattern| host.contains(pattern.as_str()))
    }
}

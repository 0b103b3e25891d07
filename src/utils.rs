use std::time::Duration;
use url::Url;

/// Strip filesystem-illegal characters from a filename segment
pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse a URL, tolerating a missing scheme by assuming https
pub fn parse_lenient(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.host_str().is_some() => Some(parsed),
        _ => Url::parse(&format!("https://{trimmed}")).ok(),
    }
}

/// Host of a URL, for display and platform matching
pub fn extract_host(url: &str) -> Option<String> {
    parse_lenient(url).and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Registrable domain of a URL, subdomains stripped
///
/// Uses the public suffix list, so `sub.example.co.uk` resolves to
/// `example.co.uk` rather than `co.uk`.
pub fn registrable_domain(url: &str) -> Option<String> {
    let host = extract_host(url)?;
    psl::domain_str(&host).map(|d| d.to_string())
}

/// Rewrite a URL to the canonical `https://www.<domain>` form used by the
/// domain-oriented dataset variant
///
/// Returns `None` when no registrable domain can be extracted; callers empty
/// the field rather than leave it stale.
pub fn canonical_domain_url(url: &str) -> Option<String> {
    let domain = registrable_domain(url)?;
    if domain.starts_with("www.") {
        Some(format!("https://{domain}"))
    } else {
        Some(format!("https://www.{domain}"))
    }
}

/// `MMDDHHMM` timestamp segment carried in every evidence filename
pub fn evidence_timestamp() -> String {
    chrono::Local::now().format("%m%d%H%M").to_string()
}

/// `YYYYMMDD_HHMMSS` slug for the run-scoped output directory
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

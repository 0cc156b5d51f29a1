//! Utility functions for URL validation, tokens and text handling

use crate::error::{Error, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of the random part of an output token
const TOKEN_RANDOM_LEN: usize = 10;

/// Validate that a submitted URL is safe to hand to the external tool
///
/// Only absolute http(s) URLs with a public host are accepted. Loopback,
/// link-local and RFC 1918 hosts are rejected so the tool cannot be pointed
/// at internal services.
///
/// # Examples
///
/// ```
/// use media_dl::utils::validate_media_url;
///
/// assert!(validate_media_url("https://www.youtube.com/watch?v=abc").is_ok());
/// assert!(validate_media_url("file:///etc/passwd").is_err());
/// assert!(validate_media_url("http://127.0.0.1:8080/").is_err());
/// ```
pub fn validate_media_url(url_str: &str) -> Result<()> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL is empty".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("'{}' is not a valid URL: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(Error::InvalidUrl(format!(
                "URL scheme '{}' is not allowed; only http and https are supported",
                scheme
            )));
        }
    }

    let Some(host) = parsed.host_str() else {
        return Err(Error::InvalidUrl("URL has no host".to_string()));
    };

    let host_lower = host.to_lowercase();
    if host_lower == "localhost"
        || host_lower == "127.0.0.1"
        || host_lower == "[::1]"
        || host_lower == "0.0.0.0"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
        || host_lower.starts_with("169.254.")
        || host_lower.ends_with(".internal")
        || host_lower.ends_with(".local")
    {
        return Err(Error::InvalidUrl(
            "URL targets a private/internal address".to_string(),
        ));
    }
    // 172.16.0.0/12
    if let Some(rest) = host_lower.strip_prefix("172.")
        && let Some(second_octet) = rest.split('.').next()
        && let Ok(octet) = second_octet.parse::<u8>()
        && (16..=31).contains(&octet)
    {
        return Err(Error::InvalidUrl(
            "URL targets a private/internal address".to_string(),
        ));
    }

    Ok(())
}

/// Generate the unique token embedded in every file a job produces
///
/// The job id keeps tokens unique within a process; the random suffix keeps
/// them unique across restarts sharing one output directory.
pub fn generate_token(job_id: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("job{}-{}", job_id, suffix)
}

/// Keep at most the last `max_chars` characters of `text`, trimmed
///
/// Tool output puts the decisive error at the end, so truncation keeps the tail.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    let skip = count - max_chars;
    let tail: String = trimmed.chars().skip(skip).collect();
    format!("…{}", tail)
}

/// Relative URL under which an artifact in the output directory is served
pub fn download_url_for(files_route: &str, filename: &str) -> String {
    format!(
        "{}/{}",
        files_route.trim_end_matches('/'),
        urlencoding::encode(filename)
    )
}

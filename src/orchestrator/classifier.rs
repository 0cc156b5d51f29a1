//! Failure classification of external tool runs
//!
//! yt-dlp sometimes exits 0 after printing a fatal error, so stderr is
//! matched against an ordered pattern table before the exit code is consulted.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::SupervisorError;
use crate::platform::Platform;
use crate::utils::truncate_tail;

/// Characters of tool output kept in a generic failure message
pub const OUTPUT_TAIL_CHARS: usize = 500;

/// Semantic failure category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    /// The platform throttled us (HTTP 429 and friends)
    RateLimited,
    /// Content needs a logged-in session
    AuthenticationRequired,
    /// Access denied, including region blocks
    Forbidden,
    /// Content deleted, private or never existed
    NotFound,
    /// The tool has no extractor for the URL
    UnsupportedUrl,
    /// The extractor ran but could not get at the media
    ExtractionFailed,
    /// Non-zero exit with no recognizable pattern
    GenericNonzeroExit,
    /// The tool binary is missing or could not be started
    ToolUnavailable,
    /// The tool was killed after exceeding its timeout
    TimedOut,
    /// The tool reported success but no artifact was found
    NoOutput,
    /// Any other failure inside the pipeline
    Internal,
}

impl FailureCategory {
    /// Kebab-case code, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::RateLimited => "rate-limited",
            FailureCategory::AuthenticationRequired => "authentication-required",
            FailureCategory::Forbidden => "forbidden",
            FailureCategory::NotFound => "not-found",
            FailureCategory::UnsupportedUrl => "unsupported-url",
            FailureCategory::ExtractionFailed => "extraction-failed",
            FailureCategory::GenericNonzeroExit => "generic-nonzero-exit",
            FailureCategory::ToolUnavailable => "tool-unavailable",
            FailureCategory::TimedOut => "timed-out",
            FailureCategory::NoOutput => "no-output",
            FailureCategory::Internal => "internal",
        }
    }

    /// User-facing message for categories detected from tool output
    fn template(&self, platform: Platform) -> String {
        match self {
            FailureCategory::RateLimited => format!(
                "{} is rate limiting requests right now. Please try again in a few minutes.",
                platform
            ),
            FailureCategory::AuthenticationRequired => format!(
                "This {} content requires a logged-in session. Provide a cookies file and try again.",
                platform
            ),
            FailureCategory::Forbidden => format!(
                "Access to this {} content is forbidden or blocked in this region.",
                platform
            ),
            FailureCategory::NotFound => format!(
                "This {} content could not be found. It may have been deleted or made private.",
                platform
            ),
            FailureCategory::UnsupportedUrl => "This URL is not supported.".to_string(),
            FailureCategory::ExtractionFailed => format!(
                "Could not extract media from {}. The page may have changed or the media is unavailable.",
                platform
            ),
            other => format!("Download failed ({})", other.as_str()),
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No failure pattern and a zero exit
    Success,
    /// The run failed
    Failure {
        /// Semantic category
        category: FailureCategory,
        /// User-facing message stored on the job
        message: String,
    },
}

impl Outcome {
    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure with an explicit category and message
    pub fn failure(category: FailureCategory, message: impl Into<String>) -> Self {
        Outcome::Failure {
            category,
            message: message.into(),
        }
    }

    /// Category of a failure, `None` on success
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Outcome::Success => None,
            Outcome::Failure { category, .. } => Some(*category),
        }
    }
}

/// Ordered (pattern, category) table; first match wins, case-sensitive
const PATTERNS: &[(&str, FailureCategory)] = &[
    ("HTTP Error 429", FailureCategory::RateLimited),
    ("Too Many Requests", FailureCategory::RateLimited),
    ("rate-limit reached", FailureCategory::RateLimited),
    ("Please wait a few minutes", FailureCategory::RateLimited),
    ("Sign in to confirm", FailureCategory::AuthenticationRequired),
    ("login required", FailureCategory::AuthenticationRequired),
    ("Login required", FailureCategory::AuthenticationRequired),
    ("requires authentication", FailureCategory::AuthenticationRequired),
    ("use --cookies", FailureCategory::AuthenticationRequired),
    ("Private video", FailureCategory::AuthenticationRequired),
    ("This video is private", FailureCategory::AuthenticationRequired),
    ("HTTP Error 403", FailureCategory::Forbidden),
    ("not available in your country", FailureCategory::Forbidden),
    ("geo restriction", FailureCategory::Forbidden),
    ("blocked it in your country", FailureCategory::Forbidden),
    ("HTTP Error 404", FailureCategory::NotFound),
    ("Video unavailable", FailureCategory::NotFound),
    ("This video has been removed", FailureCategory::NotFound),
    ("does not exist", FailureCategory::NotFound),
    ("Unsupported URL", FailureCategory::UnsupportedUrl),
    ("is not a valid URL", FailureCategory::UnsupportedUrl),
    ("Unable to extract", FailureCategory::ExtractionFailed),
    ("No video formats found", FailureCategory::ExtractionFailed),
    ("Requested format is not available", FailureCategory::ExtractionFailed),
    ("Unable to download webpage", FailureCategory::ExtractionFailed),
    ("ExtractorError", FailureCategory::ExtractionFailed),
];

/// Classify one finished run
///
/// `exit_code` is `None` when the process was terminated by a signal, which
/// counts as non-zero. Only stderr is pattern matched; stdout is used for the
/// generic failure message when stderr is empty.
pub fn classify(exit_code: Option<i32>, stdout: &str, stderr: &str, platform: Platform) -> Outcome {
    if let Some((_, category)) = PATTERNS.iter().find(|(pattern, _)| stderr.contains(pattern)) {
        return Outcome::failure(*category, category.template(platform));
    }

    if exit_code == Some(0) {
        return Outcome::Success;
    }

    let output = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };
    let tail = truncate_tail(output, OUTPUT_TAIL_CHARS);
    let code = exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());

    let message = if tail.is_empty() {
        format!("Download failed (exit code {})", code)
    } else {
        format!("Download failed (exit code {}): {}", code, tail)
    };

    Outcome::failure(FailureCategory::GenericNonzeroExit, message)
}

/// Classify a run that never produced an exit status
pub fn classify_supervisor_error(error: &SupervisorError) -> Outcome {
    match error {
        SupervisorError::BinaryNotFound { tool, .. } => Outcome::failure(
            FailureCategory::ToolUnavailable,
            format!("The download tool ({}) is not installed on this server.", tool),
        ),
        SupervisorError::Spawn { source, .. } => Outcome::failure(
            FailureCategory::ToolUnavailable,
            format!("The download tool could not be started: {}", source),
        ),
        SupervisorError::TimedOut { timeout } => Outcome::failure(
            FailureCategory::TimedOut,
            format!(
                "Download timed out after {}s and was stopped.",
                timeout.as_secs()
            ),
        ),
        SupervisorError::Io(e) => Outcome::failure(
            FailureCategory::Internal,
            format!("Download failed while reading tool output: {}", e),
        ),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_limit_with_zero_exit_is_failure() {
        let outcome = classify(
            Some(0),
            "",
            "ERROR: [Instagram] abc: HTTP Error 429: Too Many Requests",
            Platform::Instagram,
        );
        assert_eq!(outcome.category(), Some(FailureCategory::RateLimited));
        match outcome {
            Outcome::Failure { message, .. } => assert!(message.contains("Instagram")),
            Outcome::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn empty_stderr_zero_exit_is_success() {
        assert_eq!(classify(Some(0), "", "", Platform::YouTube), Outcome::Success);
    }

    #[test]
    fn warnings_alone_do_not_fail_a_zero_exit() {
        let stderr = "WARNING: [youtube] Falling back to generic n function search";
        assert!(classify(Some(0), "", stderr, Platform::YouTube).is_success());
    }

    #[test]
    fn first_matching_row_wins() {
        // 403 and "Private video" both present: auth rows come first
        let stderr = "ERROR: Private video. HTTP Error 403: Forbidden";
        assert_eq!(
            classify(Some(1), "", stderr, Platform::YouTube).category(),
            Some(FailureCategory::AuthenticationRequired)
        );
    }

    #[test]
    fn table_categories() {
        let cases = [
            ("ERROR: Sign in to confirm you're not a bot", FailureCategory::AuthenticationRequired),
            ("ERROR: HTTP Error 403: Forbidden", FailureCategory::Forbidden),
            (
                "ERROR: This video is not available in your country",
                FailureCategory::Forbidden,
            ),
            ("ERROR: [youtube] x: Video unavailable", FailureCategory::NotFound),
            ("ERROR: HTTP Error 404: Not Found", FailureCategory::NotFound),
            ("ERROR: Unsupported URL: https://example.com", FailureCategory::UnsupportedUrl),
            ("ERROR: Unable to extract video url", FailureCategory::ExtractionFailed),
            ("ERROR: No video formats found!", FailureCategory::ExtractionFailed),
        ];
        for (stderr, expected) in cases {
            assert_eq!(
                classify(Some(1), "", stderr, Platform::Generic).category(),
                Some(expected),
                "{stderr}"
            );
        }
    }

    #[test]
    fn patterns_are_case_sensitive() {
        let outcome = classify(Some(0), "", "http error 429", Platform::Generic);
        assert!(outcome.is_success());
    }

    #[test]
    fn unmatched_nonzero_exit_carries_stderr_tail() {
        let noise = "x".repeat(2000);
        let stderr = format!("{}\nERROR: something odd happened", noise);
        let outcome = classify(Some(2), "", &stderr, Platform::Vimeo);

        match outcome {
            Outcome::Failure { category, message } => {
                assert_eq!(category, FailureCategory::GenericNonzeroExit);
                assert!(message.starts_with("Download failed (exit code 2): "));
                assert!(message.ends_with("something odd happened"));
                assert!(message.chars().count() < OUTPUT_TAIL_CHARS + 40);
            }
            Outcome::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn signal_exit_is_failure() {
        let outcome = classify(None, "", "", Platform::Generic);
        match outcome {
            Outcome::Failure { category, message } => {
                assert_eq!(category, FailureCategory::GenericNonzeroExit);
                assert_eq!(message, "Download failed (exit code signal)");
            }
            Outcome::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn stdout_used_when_stderr_empty() {
        let outcome = classify(Some(1), "fatal: boom", "", Platform::Generic);
        match outcome {
            Outcome::Failure { message, .. } => assert!(message.ends_with("fatal: boom")),
            Outcome::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn category_codes_are_kebab_case() {
        assert_eq!(FailureCategory::AuthenticationRequired.as_str(), "authentication-required");
        assert_eq!(
            serde_json::to_string(&FailureCategory::GenericNonzeroExit).unwrap(),
            "\"generic-nonzero-exit\""
        );
    }

    #[test]
    fn supervisor_errors_map_to_distinct_categories() {
        let missing = SupervisorError::BinaryNotFound {
            tool: "yt-dlp".to_string(),
            searched: 4,
        };
        let spawn = SupervisorError::Spawn {
            binary: "/usr/bin/yt-dlp".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let timeout = SupervisorError::TimedOut {
            timeout: Duration::from_secs(900),
        };

        assert_eq!(
            classify_supervisor_error(&missing).category(),
            Some(FailureCategory::ToolUnavailable)
        );
        assert_eq!(
            classify_supervisor_error(&spawn).category(),
            Some(FailureCategory::ToolUnavailable)
        );
        match classify_supervisor_error(&timeout) {
            Outcome::Failure { category, message } => {
                assert_eq!(category, FailureCategory::TimedOut);
                assert!(message.contains("900s"));
            }
            Outcome::Success => panic!("expected failure"),
        }
    }
}

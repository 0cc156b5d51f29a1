//! Invocation planning for the external extraction tool
//!
//! [`StrategySelector::select`] turns a URL, its platform and the requested
//! format/quality into an [`InvocationPlan`]: the ordered yt-dlp argument
//! list plus the token-prefixed output template the artifact locator relies on.

use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::platform::{Platform, is_direct_media_url};
use crate::types::MediaFormat;

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
const NEUTRAL_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Best video plus best audio, falling back to the best combined stream
const BEST_VIDEO_SELECTOR: &str = "bv*+ba/b";

const RETRIES: &str = "3";
const SOCKET_TIMEOUT_SECS: &str = "30";

/// Per-platform invocation policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformPolicy {
    /// User agent presented to the platform
    pub user_agent: &'static str,
    /// Extra request headers as (name, value)
    pub headers: &'static [(&'static str, &'static str)],
    /// Format selector used for video when no height ceiling applies
    pub format_selector: Option<&'static str>,
    /// Seconds to sleep between requests during extraction
    pub sleep_requests: u32,
    /// Minimum seconds to sleep before each download
    pub sleep_min: u32,
    /// Maximum seconds to sleep before each download
    pub sleep_max: u32,
    /// Whether `height<=N` format filters work for this platform
    pub height_constraints: bool,
    /// Whether cookies are passed to the tool
    pub uses_credentials: bool,
}

impl PlatformPolicy {
    /// Policy for `platform`; unknown sources get the generic policy
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::YouTube => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[],
                format_selector: None,
                sleep_requests: 1,
                sleep_min: 1,
                sleep_max: 3,
                height_constraints: true,
                uses_credentials: false,
            },
            Platform::Instagram => Self {
                user_agent: MOBILE_USER_AGENT,
                headers: &[
                    ("Referer", "https://www.instagram.com/"),
                    ("X-IG-App-ID", "936619743392459"),
                ],
                format_selector: Some("best"),
                sleep_requests: 2,
                sleep_min: 3,
                sleep_max: 8,
                height_constraints: false,
                uses_credentials: true,
            },
            Platform::TikTok => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[("Referer", "https://www.tiktok.com/")],
                format_selector: Some("best"),
                sleep_requests: 1,
                sleep_min: 1,
                sleep_max: 4,
                height_constraints: false,
                uses_credentials: false,
            },
            Platform::Twitter => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[("Referer", "https://x.com/")],
                format_selector: None,
                sleep_requests: 1,
                sleep_min: 1,
                sleep_max: 3,
                height_constraints: true,
                uses_credentials: true,
            },
            Platform::Facebook => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[("Referer", "https://www.facebook.com/")],
                format_selector: Some("best"),
                sleep_requests: 2,
                sleep_min: 2,
                sleep_max: 5,
                height_constraints: false,
                uses_credentials: true,
            },
            Platform::Reddit | Platform::Vimeo | Platform::Twitch | Platform::Dailymotion => {
                Self {
                    user_agent: DESKTOP_USER_AGENT,
                    headers: &[],
                    format_selector: None,
                    sleep_requests: 1,
                    sleep_min: 1,
                    sleep_max: 3,
                    height_constraints: true,
                    uses_credentials: false,
                }
            }
            Platform::SoundCloud => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[],
                format_selector: Some("bestaudio/best"),
                sleep_requests: 1,
                sleep_min: 1,
                sleep_max: 3,
                height_constraints: false,
                uses_credentials: false,
            },
            Platform::Pinterest => Self {
                user_agent: DESKTOP_USER_AGENT,
                headers: &[("Referer", "https://www.pinterest.com/")],
                format_selector: Some("best"),
                sleep_requests: 1,
                sleep_min: 1,
                sleep_max: 3,
                height_constraints: false,
                uses_credentials: false,
            },
            Platform::Generic => Self::generic(),
        }
    }

    /// Neutral user agent and conservative spacing
    pub fn generic() -> Self {
        Self {
            user_agent: NEUTRAL_USER_AGENT,
            headers: &[],
            format_selector: None,
            sleep_requests: 2,
            sleep_min: 2,
            sleep_max: 5,
            height_constraints: true,
            uses_credentials: false,
        }
    }
}

/// Everything needed for one external tool execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationPlan {
    /// Ordered arguments, ending with `--` and the URL
    pub args: Vec<String>,
    /// Output template passed with `-o`
    pub output_template: String,
    /// Unique token embedded in every produced filename
    pub token: String,
    /// Platform the plan was built for
    pub platform: Platform,
}

impl InvocationPlan {
    /// Whether `flag` occurs in the argument list
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following `flag`, if present
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Builds invocation plans from platform policies and format rules
#[derive(Clone, Debug)]
pub struct StrategySelector {
    output_dir: PathBuf,
    cookies_file: PathBuf,
    cookies_browser: String,
}

impl StrategySelector {
    /// Create a selector writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, tools: &ToolsConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            cookies_file: tools.cookies_file.clone(),
            cookies_browser: tools.cookies_browser.clone(),
        }
    }

    /// Output directory plans write into
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Build the plan for one job
    ///
    /// Never fails. The cookies file is checked on every call, so a file
    /// dropped in place later is picked up by the next plan.
    pub fn select(
        &self,
        url: &str,
        platform: Platform,
        format: MediaFormat,
        quality: Option<&str>,
        token: &str,
    ) -> InvocationPlan {
        let direct = is_direct_media_url(url);
        let policy = if direct {
            PlatformPolicy::generic()
        } else {
            PlatformPolicy::for_platform(platform)
        };

        let output_template = self
            .output_dir
            .join(format!("{}_%(title).100B.%(ext)s", token))
            .to_string_lossy()
            .into_owned();

        let mut args: Vec<String> = [
            "--no-playlist",
            "--newline",
            "--no-progress",
            "--restrict-filenames",
            "--write-info-json",
            "--retries",
            RETRIES,
            "--socket-timeout",
            SOCKET_TIMEOUT_SECS,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("-o".to_string());
        args.push(output_template.clone());

        args.push("--user-agent".to_string());
        args.push(policy.user_agent.to_string());
        for (name, value) in policy.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if policy.sleep_requests > 0 {
            args.push("--sleep-requests".to_string());
            args.push(policy.sleep_requests.to_string());
        }
        if policy.sleep_max > 0 {
            args.push("--sleep-interval".to_string());
            args.push(policy.sleep_min.to_string());
            args.push("--max-sleep-interval".to_string());
            args.push(policy.sleep_max.max(policy.sleep_min).to_string());
        }

        if policy.uses_credentials {
            if self.cookies_file.is_file() {
                args.push("--cookies".to_string());
                args.push(self.cookies_file.to_string_lossy().into_owned());
            } else {
                args.push("--cookies-from-browser".to_string());
                args.push(self.cookies_browser.clone());
            }
        }

        match format {
            MediaFormat::Audio => {
                args.extend(["-x", "--audio-format", "mp3"].map(String::from));
            }
            MediaFormat::Image => {
                args.extend(
                    [
                        "--write-thumbnail",
                        "--skip-download",
                        "--convert-thumbnails",
                        "jpg",
                    ]
                    .map(String::from),
                );
            }
            MediaFormat::Video if direct => {}
            MediaFormat::Video => {
                let selector = match parse_height(quality) {
                    Some(height) if policy.height_constraints => format!(
                        "bv*[height<={h}]+ba/b[height<={h}]/{best}",
                        h = height,
                        best = BEST_VIDEO_SELECTOR
                    ),
                    _ => policy
                        .format_selector
                        .unwrap_or(BEST_VIDEO_SELECTOR)
                        .to_string(),
                };
                args.push("-f".to_string());
                args.push(selector);
                args.push("--merge-output-format".to_string());
                args.push("mp4".to_string());
            }
        }

        args.push("--".to_string());
        args.push(url.trim().to_string());

        tracing::debug!(
            platform = %platform,
            format = %format,
            direct,
            args = ?args,
            "Built invocation plan"
        );

        InvocationPlan {
            args,
            output_template,
            token: token.to_string(),
            platform,
        }
    }
}

/// Height ceiling from a quality string
///
/// `"720"`, `"720p"` and `"1080P"` parse; `"best"`, empty and anything else
/// mean no ceiling.
pub fn parse_height(quality: Option<&str>) -> Option<u32> {
    let q = quality?.trim();
    let digits = q
        .strip_suffix('p')
        .or_else(|| q.strip_suffix('P'))
        .unwrap_or(q);
    digits.parse::<u32>().ok().filter(|h| *h > 0)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn selector(dir: &TempDir) -> StrategySelector {
        let tools = ToolsConfig {
            cookies_file: dir.path().join("cookies.txt"),
            cookies_browser: "firefox".to_string(),
            ..Default::default()
        };
        StrategySelector::new(dir.path().join("out"), &tools)
    }

    #[test]
    fn instagram_without_cookies_file_uses_browser_fallback() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://www.instagram.com/reel/abc/",
            Platform::Instagram,
            MediaFormat::Video,
            None,
            "job1-tok",
        );

        assert!(!plan.has_arg("--cookies"));
        assert_eq!(plan.arg_value("--cookies-from-browser"), Some("firefox"));
    }

    #[test]
    fn instagram_with_cookies_file_passes_it() {
        let dir = TempDir::new().unwrap();
        let cookies = dir.path().join("cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

        let plan = selector(&dir).select(
            "https://www.instagram.com/reel/abc/",
            Platform::Instagram,
            MediaFormat::Video,
            None,
            "job1-tok",
        );

        assert_eq!(
            plan.arg_value("--cookies"),
            Some(&*cookies.to_string_lossy())
        );
        assert!(!plan.has_arg("--cookies-from-browser"));
    }

    #[test]
    fn platforms_without_credentials_get_no_cookie_flags() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://vimeo.com/1",
            Platform::Vimeo,
            MediaFormat::Video,
            None,
            "t",
        );
        assert!(!plan.has_arg("--cookies"));
        assert!(!plan.has_arg("--cookies-from-browser"));
    }

    #[test]
    fn output_template_carries_token() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://youtu.be/xyz",
            Platform::YouTube,
            MediaFormat::Video,
            Some("best"),
            "job9-abcdefghij",
        );

        assert!(
            plan.output_template
                .ends_with("job9-abcdefghij_%(title).100B.%(ext)s")
        );
        assert_eq!(plan.arg_value("-o"), Some(plan.output_template.as_str()));
        assert_eq!(plan.token, "job9-abcdefghij");
        assert!(plan.has_arg("--write-info-json"));
        assert!(plan.has_arg("--no-playlist"));
    }

    #[test]
    fn url_is_last_after_separator() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://youtu.be/-dash-id",
            Platform::YouTube,
            MediaFormat::Video,
            None,
            "t",
        );
        let n = plan.args.len();
        assert_eq!(plan.args[n - 2], "--");
        assert_eq!(plan.args[n - 1], "https://youtu.be/-dash-id");
    }

    #[test]
    fn video_quality_applies_height_ceiling_when_supported() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://youtu.be/xyz",
            Platform::YouTube,
            MediaFormat::Video,
            Some("720p"),
            "t",
        );
        assert_eq!(
            plan.arg_value("-f"),
            Some("bv*[height<=720]+ba/b[height<=720]/bv*+ba/b")
        );
    }

    #[test]
    fn best_quality_uses_generic_selector() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://youtu.be/xyz",
            Platform::YouTube,
            MediaFormat::Video,
            Some("best"),
            "t",
        );
        assert_eq!(plan.arg_value("-f"), Some("bv*+ba/b"));
    }

    #[test]
    fn height_ignored_where_platform_does_not_support_it() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://www.tiktok.com/@u/video/1",
            Platform::TikTok,
            MediaFormat::Video,
            Some("1080"),
            "t",
        );
        assert_eq!(plan.arg_value("-f"), Some("best"));
    }

    #[test]
    fn audio_forces_extraction() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://soundcloud.com/a/b",
            Platform::SoundCloud,
            MediaFormat::Audio,
            Some("720"),
            "t",
        );
        assert!(plan.has_arg("-x"));
        assert_eq!(plan.arg_value("--audio-format"), Some("mp3"));
        assert!(!plan.has_arg("-f"));
    }

    #[test]
    fn image_forces_thumbnail_only() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://www.instagram.com/p/abc/",
            Platform::Instagram,
            MediaFormat::Image,
            None,
            "t",
        );
        assert!(plan.has_arg("--write-thumbnail"));
        assert!(plan.has_arg("--skip-download"));
        assert_eq!(plan.arg_value("--convert-thumbnails"), Some("jpg"));
        assert!(!plan.has_arg("-f"));
    }

    #[test]
    fn instagram_policy_sends_platform_headers() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://www.instagram.com/p/abc/",
            Platform::Instagram,
            MediaFormat::Video,
            None,
            "t",
        );
        assert!(
            plan.args
                .iter()
                .any(|a| a == "Referer:https://www.instagram.com/")
        );
        assert_eq!(plan.arg_value("--user-agent"), Some(MOBILE_USER_AGENT));
        assert_eq!(plan.arg_value("--sleep-interval"), Some("3"));
        assert_eq!(plan.arg_value("--max-sleep-interval"), Some("8"));
    }

    #[test]
    fn unknown_platform_gets_generic_policy() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://example.com/watch/1",
            Platform::Generic,
            MediaFormat::Video,
            None,
            "t",
        );
        assert_eq!(plan.arg_value("--user-agent"), Some(NEUTRAL_USER_AGENT));
        assert_eq!(plan.arg_value("-f"), Some("bv*+ba/b"));
    }

    #[test]
    fn direct_media_url_skips_format_selector() {
        let dir = TempDir::new().unwrap();
        let plan = selector(&dir).select(
            "https://cdn.example.com/clip.mp4",
            Platform::Generic,
            MediaFormat::Video,
            Some("720"),
            "t",
        );
        assert!(!plan.has_arg("-f"));
        assert_eq!(plan.arg_value("--user-agent"), Some(NEUTRAL_USER_AGENT));
    }

    #[test]
    fn quality_parsing() {
        assert_eq!(parse_height(Some("720")), Some(720));
        assert_eq!(parse_height(Some("1080p")), Some(1080));
        assert_eq!(parse_height(Some("1080P")), Some(1080));
        assert_eq!(parse_height(Some(" 480 ")), Some(480));
        assert_eq!(parse_height(Some("best")), None);
        assert_eq!(parse_height(Some("0")), None);
        assert_eq!(parse_height(Some("hd")), None);
        assert_eq!(parse_height(None), None);
    }
}

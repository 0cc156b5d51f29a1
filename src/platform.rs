//! Platform and URL classification
//!
//! Pure functions that map a submitted URL to the [`Platform`] whose
//! download policy applies, and recognize URLs that point straight at a
//! media file.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use utoipa::ToSchema;

/// Source platform of a media URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Platform {
    /// youtube.com, youtu.be, music.youtube.com
    YouTube,
    /// instagram.com
    Instagram,
    /// tiktok.com
    TikTok,
    /// twitter.com, x.com
    Twitter,
    /// facebook.com, fb.watch
    Facebook,
    /// reddit.com, redd.it
    Reddit,
    /// vimeo.com
    Vimeo,
    /// soundcloud.com
    SoundCloud,
    /// twitch.tv
    Twitch,
    /// pinterest.com, pin.it
    Pinterest,
    /// dailymotion.com, dai.ly
    Dailymotion,
    /// Anything else; handled by the tool's generic extractor
    #[default]
    Generic,
}

/// Host suffixes per platform, matched against the URL host
const HOSTS: &[(Platform, &[&str])] = &[
    (
        Platform::YouTube,
        &["youtube.com", "youtu.be", "youtube-nocookie.com"],
    ),
    (Platform::Instagram, &["instagram.com", "instagr.am"]),
    (Platform::TikTok, &["tiktok.com"]),
    (Platform::Twitter, &["twitter.com", "x.com"]),
    (Platform::Facebook, &["facebook.com", "fb.watch", "fb.com"]),
    (Platform::Reddit, &["reddit.com", "redd.it"]),
    (Platform::Vimeo, &["vimeo.com"]),
    (Platform::SoundCloud, &["soundcloud.com"]),
    (Platform::Twitch, &["twitch.tv"]),
    (Platform::Pinterest, &["pinterest.com", "pin.it"]),
    (Platform::Dailymotion, &["dailymotion.com", "dai.ly"]),
];

static DIRECT_MEDIA_EXT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\.(mp4|m4v|mov|webm|mkv|avi|flv|mp3|m4a|aac|ogg|oga|opus|wav|flac|jpe?g|png|gif|webp)$",
    )
    .ok()
});

impl Platform {
    /// Display name, also the stored representation
    pub fn name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Reddit => "Reddit",
            Platform::Vimeo => "Vimeo",
            Platform::SoundCloud => "SoundCloud",
            Platform::Twitch => "Twitch",
            Platform::Pinterest => "Pinterest",
            Platform::Dailymotion => "Dailymotion",
            Platform::Generic => "Generic",
        }
    }

    /// Parse a display name (case-insensitive); unknown names map to `Generic`
    pub fn from_name(name: &str) -> Self {
        HOSTS
            .iter()
            .map(|(p, _)| *p)
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .unwrap_or(Platform::Generic)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the platform of a URL
///
/// Never fails: unparseable URLs and unknown hosts resolve to
/// [`Platform::Generic`].
pub fn detect_platform(url: &str) -> Platform {
    let Ok(parsed) = url::Url::parse(url.trim()) else {
        return Platform::Generic;
    };
    let Some(host) = parsed.host_str() else {
        return Platform::Generic;
    };
    let host = host.to_ascii_lowercase();

    HOSTS
        .iter()
        .find(|(_, suffixes)| suffixes.iter().any(|s| host_matches(&host, s)))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Generic)
}

/// Whether the URL is an http(s) link straight to a media file
pub fn is_direct_media_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match DIRECT_MEDIA_EXT.as_ref() {
        Some(re) => re.is_match(parsed.path()),
        None => false,
    }
}

// "x.com" must match "x.com" and "mobile.x.com" but not "netflix.com"
fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix
        || host
            .strip_suffix(suffix)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

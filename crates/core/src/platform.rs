//! Recognizing short-form video pages from their URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::model::VideoId;

/// Short-form feeds we know how to spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    YoutubeShorts,
    TikTok,
    InstagramReels,
}

impl Platform {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Platform::YoutubeShorts => "YouTube Shorts",
            Platform::TikTok => "TikTok",
            Platform::InstagramReels => "Instagram Reels",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A URL that resolved to a single short video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPage {
    pub platform: Platform,
    pub video: VideoId,
}

impl ShortPage {
    /// Classifies a page URL. Returns `None` for anything that is not
    /// a recognized short-video page, including regular watch pages on
    /// the same sites.
    #[must_use]
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

        if host_matches(&host, "youtube.com") {
            if let ["shorts", id] = segments.as_slice() {
                return ShortPage::build(Platform::YoutubeShorts, id);
            }
        } else if host_matches(&host, "tiktok.com") {
            if let [user, "video", id] = segments.as_slice() {
                if user.starts_with('@') {
                    return ShortPage::build(Platform::TikTok, id);
                }
            }
        } else if host_matches(&host, "instagram.com") {
            if let ["reel", id] | ["reels", id] = segments.as_slice() {
                return ShortPage::build(Platform::InstagramReels, id);
            }
        }
        None
    }

    fn build(platform: Platform, id: &str) -> Option<Self> {
        VideoId::new(id).ok().map(|video| ShortPage { platform, video })
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

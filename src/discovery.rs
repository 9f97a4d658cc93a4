use std::io::ErrorKind;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_YT_DLP: &str = "yt-dlp";
const UNTITLED: &str = "untitled";
const TAB_EXTRACTOR: &str = "YoutubeTab";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("{0} not found. Install it: https://github.com/yt-dlp/yt-dlp")]
    YtDlpNotFound(String),
    #[error("yt-dlp failed: {0}")]
    YtDlpFailed(String),
    #[error("yt-dlp returned a video without an id")]
    MissingId,
    #[error("could not parse yt-dlp output: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub title: String,
}

impl Video {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.unwrap_or_else(|| UNTITLED.to_string()),
        }
    }
}

/// Videos found behind a link, in extractor order.
#[derive(Debug, Default, PartialEq)]
pub struct Discovery {
    pub videos: Vec<Video>,
    /// Private, deleted or non-video entries that were left out.
    pub skipped: usize,
}

/// Subset of the yt-dlp info dict we care about. Playlists and channels
/// carry `entries`; null entries are unavailable videos.
#[derive(Debug, Deserialize)]
struct InfoDict {
    id: Option<String>,
    title: Option<String>,
    ie_key: Option<String>,
    entries: Option<Vec<Option<InfoDict>>>,
}

/// Video discovery backed by the `yt-dlp` executable.
pub struct YtDlp {
    binary: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// List the videos behind a video, playlist or channel link.
    ///
    /// Without yt-dlp installed a plain single-video link still resolves,
    /// using the id as the title.
    pub fn discover(&self, link: &str) -> Result<Discovery, DiscoveryError> {
        if let Err(e) = self.check_installed() {
            return match extract_video_id(link) {
                Some(id) => {
                    warn!("{e}; treating the link as a single video");
                    Ok(Discovery {
                        videos: vec![Video::new(id.clone(), Some(id))],
                        skipped: 0,
                    })
                }
                None => Err(e),
            };
        }

        let url = to_full_url(link);
        debug!(%url, binary = %self.binary, "running flat extraction");

        let output = Command::new(&self.binary)
            .args([
                "--flat-playlist",
                "--skip-download",
                "--dump-single-json",
                "--quiet",
                "--no-warnings",
            ])
            .arg(&url)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiscoveryError::YtDlpFailed(stderr.trim().to_string()));
        }

        parse_info(&String::from_utf8_lossy(&output.stdout))
    }

    fn check_installed(&self) -> Result<(), DiscoveryError> {
        match Command::new(&self.binary).arg("--version").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(_) => Err(DiscoveryError::YtDlpNotFound(self.binary.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DiscoveryError::YtDlpNotFound(self.binary.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Turn yt-dlp's `--dump-single-json` output into a flat video list.
pub fn parse_info(json: &str) -> Result<Discovery, DiscoveryError> {
    let info: InfoDict = serde_json::from_str(json)?;
    let mut discovery = Discovery::default();

    match info.entries {
        Some(entries) => collect_entries(entries, &mut discovery),
        None => {
            let id = info.id.ok_or(DiscoveryError::MissingId)?;
            discovery.videos.push(Video::new(id, info.title));
        }
    }

    Ok(discovery)
}

fn collect_entries(entries: Vec<Option<InfoDict>>, out: &mut Discovery) {
    for entry in entries {
        let Some(entry) = entry else {
            out.skipped += 1;
            continue;
        };

        // channel tabs come back as nested playlists
        if let Some(nested) = entry.entries {
            collect_entries(nested, out);
            continue;
        }

        if entry.ie_key.as_deref() == Some(TAB_EXTRACTOR) {
            debug!(id = ?entry.id, "skipping unexpanded tab reference");
            out.skipped += 1;
            continue;
        }

        match entry.id {
            Some(id) => out.videos.push(Video::new(id, entry.title)),
            None => out.skipped += 1,
        }
    }
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the video ID from a single-video YouTube link or bare ID.
/// Playlist and channel links yield `None`.
pub fn extract_video_id(link: &str) -> Option<String> {
    let link = link.trim();
    if is_video_id(link) {
        return Some(link.to_string());
    }

    // Try to find v= parameter
    if let Some(pos) = link.find("v=") {
        let id = &link[pos + 2..];
        let id = id.split(['&', '#']).next().unwrap_or(id);
        if is_video_id(id) {
            return Some(id.to_string());
        }
    }

    for marker in ["youtu.be/", "/shorts/", "/embed/", "/live/"] {
        if let Some(pos) = link.find(marker) {
            let id = &link[pos + marker.len()..];
            let id = id.split(['?', '&', '#', '/']).next().unwrap_or(id);
            if is_video_id(id) {
                return Some(id.to_string());
            }
        }
    }

    None
}

/// Build a URL yt-dlp understands from a link, bare video ID or `@handle`.
pub fn to_full_url(link: &str) -> String {
    let link = link.trim();
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('@') {
        format!("https://www.youtube.com/{link}/videos")
    } else if link.contains("youtube.com") || link.contains("youtu.be") {
        format!("https://{link}")
    } else if is_video_id(link) {
        format!("https://www.youtube.com/watch?v={link}")
    } else {
        link.to_string()
    }
}

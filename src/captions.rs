use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use html_escape::decode_html_entities;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::srt::CaptionFragment;

pub const DEFAULT_LANGUAGES: &str = "pt,pt-BR,en";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?key=";
const CONSENT_FORM: &str = "action=\"https://consent.youtube.com/s\"";
const GENERATED_KIND: &str = "asr";

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("captions are disabled for {0}")]
    TranscriptsDisabled(String),
    #[error("no captions for {video_id} in any of: {}", .languages.join(", "))]
    NoTranscriptFound {
        video_id: String,
        languages: Vec<String>,
    },
    #[error("video {0} is unavailable")]
    VideoUnavailable(String),
    #[error("video {0} is age restricted")]
    AgeRestricted(String),
    #[error("video {0} is unplayable: {1}")]
    VideoUnplayable(String, String),
    #[error("YouTube is blocking requests (video {0})")]
    RequestBlocked(String),
    #[error("captions for {0} require a proof-of-origin token")]
    PoTokenRequired(String),
    #[error("could not get past the cookie consent page for {0}")]
    ConsentFailed(String),
    #[error("could not parse the YouTube page for {0}")]
    Unparsable(String),
    #[error("HTTP {status} for {video_id}")]
    Status { status: StatusCode, video_id: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaptionError {
    /// Expected outcomes that mean "this video has no usable captions",
    /// as opposed to a transport or parsing failure.
    pub fn is_no_captions(&self) -> bool {
        matches!(
            self,
            CaptionError::TranscriptsDisabled(_) | CaptionError::NoTranscriptFound { .. }
        )
    }
}

/// A caption track advertised by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub language: String,
    pub is_generated: bool,
    pub base_url: String,
}

// ── Player response ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    base_url: String,
    language_code: String,
    name: Option<TrackName>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    text: String,
}

impl From<RawTrack> for CaptionTrack {
    fn from(raw: RawTrack) -> Self {
        let language = raw
            .name
            .and_then(|n| n.simple_text.or_else(|| n.runs.into_iter().next().map(|r| r.text)))
            .unwrap_or_else(|| raw.language_code.clone());

        CaptionTrack {
            is_generated: raw.kind.as_deref() == Some(GENERATED_KIND),
            base_url: raw.base_url.replace("&fmt=srv3", ""),
            language_code: raw.language_code,
            language,
        }
    }
}

fn tracks_from_player(video_id: &str, player: PlayerResponse) -> Result<Vec<CaptionTrack>, CaptionError> {
    check_playability(video_id, player.playability_status.as_ref())?;

    let tracks: Vec<CaptionTrack> = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .map(|r| r.caption_tracks.into_iter().map(CaptionTrack::from).collect())
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(CaptionError::TranscriptsDisabled(video_id.to_string()));
    }
    Ok(tracks)
}

fn check_playability(video_id: &str, status: Option<&PlayabilityStatus>) -> Result<(), CaptionError> {
    let Some(status) = status else {
        return Ok(());
    };
    let code = status.status.as_deref().unwrap_or("OK");
    let reason = status.reason.as_deref().unwrap_or("");

    match code {
        "OK" => Ok(()),
        "LOGIN_REQUIRED" if reason.contains("not a bot") => {
            Err(CaptionError::RequestBlocked(video_id.to_string()))
        }
        "LOGIN_REQUIRED" if reason.contains("inappropriate") => {
            Err(CaptionError::AgeRestricted(video_id.to_string()))
        }
        "ERROR" if reason.contains("unavailable") => {
            Err(CaptionError::VideoUnavailable(video_id.to_string()))
        }
        _ => Err(CaptionError::VideoUnplayable(
            video_id.to_string(),
            reason.to_string(),
        )),
    }
}

/// Pick the first track matching the preference list. For each language
/// code an uploaded track beats a generated one.
pub fn find_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages.iter().find_map(|code| {
        let mut matching = tracks.iter().filter(|t| &t.language_code == code);
        let first = matching.next()?;
        if !first.is_generated {
            return Some(first);
        }
        matching.find(|t| !t.is_generated).or(Some(first))
    })
}

/// Split a comma separated preference list, dropping blanks.
pub fn parse_languages(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

// ── Timedtext ───────────────────────────────────────────────────────────

static TEXT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)").expect("valid text element regex")
});
static START_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sstart="([^"]*)""#).expect("valid start regex"));
static DUR_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sdur="([^"]*)""#).expect("valid dur regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Parse the timedtext XML served at a track's base URL.
pub fn parse_timedtext(xml: &str) -> Vec<CaptionFragment> {
    TEXT_ELEMENT
        .captures_iter(xml)
        .filter_map(|cap| {
            let attrs = cap.get(1).map_or("", |m| m.as_str());
            let raw = cap.get(2).map_or("", |m| m.as_str());
            if raw.is_empty() {
                return None;
            }

            let start = attr(&START_ATTR, attrs)?.parse::<f64>().ok()?;
            let duration = attr(&DUR_ATTR, attrs)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);

            Some(CaptionFragment {
                start,
                duration,
                text: decode_cue_text(raw),
            })
        })
        .collect()
}

fn attr<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    re.captures(attrs).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Cue text is escaped twice, once for XML and once for HTML. Inline
/// formatting tags are dropped after decoding.
fn decode_cue_text(raw: &str) -> String {
    let xml = decode_html_entities(raw);
    let html = decode_html_entities(&xml);
    TAG.replace_all(&html, "").into_owned()
}

// ── Client ──────────────────────────────────────────────────────────────

/// Caption retrieval from YouTube's player API, no API key required.
pub struct YouTubeCaptions {
    client: Client,
    delay: Duration,
}

impl YouTubeCaptions {
    pub fn new(user_agent: &str, delay: Duration) -> Result<Self, CaptionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, delay })
    }

    /// Captions for `video_id` in the first available preferred language.
    /// `Ok(None)` means the video has no matching captions.
    pub fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Option<Vec<CaptionFragment>>, CaptionError> {
        let result = self.list_tracks(video_id).and_then(|tracks| {
            let track = find_track(&tracks, languages).ok_or_else(|| {
                CaptionError::NoTranscriptFound {
                    video_id: video_id.to_string(),
                    languages: languages.to_vec(),
                }
            })?;
            debug!(
                video_id,
                language = %track.language_code,
                generated = track.is_generated,
                "selected caption track"
            );
            self.fetch_fragments(video_id, track)
        });

        no_captions_as_none(video_id, result)
    }

    /// All caption tracks the player advertises for a video.
    pub fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, CaptionError> {
        let html = self.fetch_watch_page(video_id)?;
        let api_key = extract_api_key(&html, video_id)?;

        self.pause();
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video_id
        });
        let resp = self
            .client
            .post(format!("{PLAYER_URL}{api_key}"))
            .json(&body)
            .send()?;
        let resp = check_status(resp, video_id)?;
        let player: PlayerResponse = serde_json::from_str(&resp.text()?)?;

        tracks_from_player(video_id, player)
    }

    /// Download and parse one caption track.
    pub fn fetch_fragments(
        &self,
        video_id: &str,
        track: &CaptionTrack,
    ) -> Result<Vec<CaptionFragment>, CaptionError> {
        if track.base_url.contains("&exp=xpe") {
            return Err(CaptionError::PoTokenRequired(video_id.to_string()));
        }

        self.pause();
        let resp = self.client.get(&track.base_url).send()?;
        let xml = check_status(resp, video_id)?.text()?;

        Ok(parse_timedtext(&xml))
    }

    fn fetch_watch_page(&self, video_id: &str) -> Result<String, CaptionError> {
        let url = format!("{WATCH_URL}{video_id}");
        self.pause();
        let html = check_status(self.client.get(&url).send()?, video_id)?.text()?;

        if !html.contains(CONSENT_FORM) {
            return Ok(html);
        }

        debug!(video_id, "consent page, retrying with consent cookie");
        let value = capture(&CONSENT_VALUE, &html)
            .ok_or_else(|| CaptionError::ConsentFailed(video_id.to_string()))?;
        let cookie = HeaderValue::from_str(&format!("CONSENT=YES+{value}"))
            .map_err(|_| CaptionError::ConsentFailed(video_id.to_string()))?;

        let html = check_status(
            self.client.get(&url).header(COOKIE, cookie).send()?,
            video_id,
        )?
        .text()?;

        if html.contains(CONSENT_FORM) {
            return Err(CaptionError::ConsentFailed(video_id.to_string()));
        }
        Ok(html)
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

fn check_status(resp: Response, video_id: &str) -> Result<Response, CaptionError> {
    match resp.status() {
        StatusCode::TOO_MANY_REQUESTS => Err(CaptionError::RequestBlocked(video_id.to_string())),
        status if !status.is_success() => Err(CaptionError::Status {
            status,
            video_id: video_id.to_string(),
        }),
        _ => Ok(resp),
    }
}

/// Fold the expected "nothing to show" outcomes into `Ok(None)`: captions
/// disabled, no track in a preferred language, or a track without cues.
fn no_captions_as_none(
    video_id: &str,
    result: Result<Vec<CaptionFragment>, CaptionError>,
) -> Result<Option<Vec<CaptionFragment>>, CaptionError> {
    match result {
        Ok(fragments) if fragments.is_empty() => {
            debug!(video_id, "caption track has no cues");
            Ok(None)
        }
        Ok(fragments) => Ok(Some(fragments)),
        Err(e) if e.is_no_captions() => {
            debug!(video_id, "{e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

static API_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex")
});
static CONSENT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("valid consent regex"));

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_api_key(html: &str, video_id: &str) -> Result<String, CaptionError> {
    if html.contains("g-recaptcha") {
        return Err(CaptionError::RequestBlocked(video_id.to_string()));
    }
    capture(&API_KEY, html).ok_or_else(|| CaptionError::Unparsable(video_id.to_string()))
}

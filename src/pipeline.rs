//! The extraction command: link → videos → captions → SubRip documents.
//!
//! Discovery and caption retrieval sit behind [`VideoSource`] and
//! [`CaptionSource`] so the flow can run against any backend. Per-video
//! failures are reported and skipped; only an empty link, an empty video
//! list or an empty result stop the run.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::captions::{CaptionError, YouTubeCaptions};
use crate::discovery::{Discovery, DiscoveryError, Video, YtDlp};
use crate::srt::{self, CaptionFragment};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no link given")]
    EmptyLink,
    #[error("no language codes given")]
    NoLanguages,
    #[error("no videos found behind the link")]
    NoVideos,
    #[error("no captions could be retrieved for any video")]
    NoDocuments,
    #[error("video discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
}

pub trait VideoSource {
    fn discover(&self, link: &str) -> Result<Discovery, DiscoveryError>;
}

pub trait CaptionSource {
    /// `Ok(None)` when the video has no captions in any preferred language.
    fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Option<Vec<CaptionFragment>>, CaptionError>;
}

impl VideoSource for YtDlp {
    fn discover(&self, link: &str) -> Result<Discovery, DiscoveryError> {
        YtDlp::discover(self, link)
    }
}

impl CaptionSource for YouTubeCaptions {
    fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Option<Vec<CaptionFragment>>, CaptionError> {
        YouTubeCaptions::fetch(self, video_id, languages)
    }
}

/// A rendered SubRip document for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub video_id: String,
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn file_name(&self) -> String {
        format!("{}.srt", self.video_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Captioned { cues: usize },
    NoCaptions,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub documents: Vec<Document>,
    /// One entry per discovered video, in discovery order.
    pub outcomes: Vec<(Video, Outcome)>,
    /// Entries discovery left out as unavailable or private.
    pub skipped: usize,
    /// Repeated listings of a video already seen earlier in the list.
    pub duplicates: usize,
}

/// Run the whole extraction for one link.
pub fn extract(
    link: &str,
    languages: &[String],
    videos: &dyn VideoSource,
    captions: &dyn CaptionSource,
) -> Result<Extraction, PipelineError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(PipelineError::EmptyLink);
    }
    if languages.is_empty() {
        return Err(PipelineError::NoLanguages);
    }

    eprintln!("[1/3] looking up videos...");
    let discovery = videos.discover(link)?;
    if discovery.skipped > 0 {
        warn!("skipped {} unavailable or private entries", discovery.skipped);
    }
    if discovery.videos.is_empty() {
        return Err(PipelineError::NoVideos);
    }

    // documents are keyed by video id, so each id is fetched once
    let listed = discovery.videos.len();
    let mut seen = HashSet::new();
    let videos: Vec<Video> = discovery
        .videos
        .into_iter()
        .filter(|v| seen.insert(v.id.clone()))
        .collect();
    let duplicates = listed - videos.len();
    if duplicates > 0 {
        debug!(duplicates, "dropped repeated playlist entries");
    }
    info!("{} video(s) found", videos.len());

    eprintln!("[2/3] fetching captions ({})...", languages.join(","));
    let total = videos.len();
    let mut extraction = Extraction {
        skipped: discovery.skipped,
        duplicates,
        ..Extraction::default()
    };

    for (i, video) in videos.into_iter().enumerate() {
        eprintln!("       ({}/{total}) {}", i + 1, video.title);
        let outcome = match captions.fetch(&video.id, languages) {
            Ok(Some(fragments)) if !fragments.is_empty() => {
                extraction.documents.push(Document {
                    video_id: video.id.clone(),
                    title: video.title.clone(),
                    content: srt::build_document(&fragments),
                });
                Outcome::Captioned {
                    cues: fragments.len(),
                }
            }
            Ok(_) => {
                warn!("no captions available for {}", video.title);
                Outcome::NoCaptions
            }
            Err(e) => {
                error!("failed to fetch captions for {} ({}): {e}", video.title, video.id);
                Outcome::Failed(e.to_string())
            }
        };
        extraction.outcomes.push((video, outcome));
    }

    if extraction.documents.is_empty() {
        return Err(PipelineError::NoDocuments);
    }

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeVideos(Result<Discovery, ()>);

    impl VideoSource for FakeVideos {
        fn discover(&self, _link: &str) -> Result<Discovery, DiscoveryError> {
            match &self.0 {
                Ok(d) => Ok(Discovery {
                    videos: d.videos.clone(),
                    skipped: d.skipped,
                }),
                Err(()) => Err(DiscoveryError::YtDlpFailed("boom".into())),
            }
        }
    }

    enum Canned {
        Cues(Vec<CaptionFragment>),
        Missing,
        Broken,
    }

    #[derive(Default)]
    struct FakeCaptions {
        canned: HashMap<String, Canned>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeCaptions {
        fn with(mut self, id: &str, canned: Canned) -> Self {
            self.canned.insert(id.to_string(), canned);
            self
        }
    }

    impl CaptionSource for FakeCaptions {
        fn fetch(
            &self,
            video_id: &str,
            _languages: &[String],
        ) -> Result<Option<Vec<CaptionFragment>>, CaptionError> {
            self.calls.borrow_mut().push(video_id.to_string());
            match self.canned.get(video_id) {
                Some(Canned::Cues(c)) => Ok(Some(c.clone())),
                Some(Canned::Broken) => Err(CaptionError::Unparsable(video_id.to_string())),
                Some(Canned::Missing) | None => Ok(None),
            }
        }
    }

    fn videos(ids: &[&str]) -> FakeVideos {
        FakeVideos(Ok(Discovery {
            videos: ids
                .iter()
                .map(|id| Video::new(*id, Some(format!("title {id}"))))
                .collect(),
            skipped: 0,
        }))
    }

    fn langs() -> Vec<String> {
        vec!["pt".to_string(), "en".to_string()]
    }

    #[test]
    fn blank_link_halts_before_discovery() {
        let captions = FakeCaptions::default();
        let err = extract("   ", &langs(), &videos(&["a"]), &captions).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyLink));
        assert!(captions.calls.borrow().is_empty());
    }

    #[test]
    fn empty_language_list_is_rejected() {
        let err = extract("x", &[], &videos(&["a"]), &FakeCaptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoLanguages));
    }

    #[test]
    fn zero_videos_is_an_error() {
        let err = extract("x", &langs(), &videos(&[]), &FakeCaptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoVideos));
    }

    #[test]
    fn discovery_failure_propagates() {
        let err = extract("x", &langs(), &FakeVideos(Err(())), &FakeCaptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Discovery(_)));
    }

    #[test]
    fn per_video_failures_do_not_abort_the_batch() {
        let captions = FakeCaptions::default()
            .with("a", Canned::Missing)
            .with("b", Canned::Broken)
            .with("c", Canned::Cues(vec![CaptionFragment::new(0.0, 1.5, "Hello\nworld")]));

        let out = extract("x", &langs(), &videos(&["a", "b", "c"]), &captions).unwrap();

        assert_eq!(*captions.calls.borrow(), ["a", "b", "c"]);
        assert_eq!(
            out.documents,
            vec![Document {
                video_id: "c".into(),
                title: "title c".into(),
                content: "1\n0:00:00,000 --> 0:00:01,500\nHello world\n\n".into(),
            }]
        );
        let outcomes: Vec<&Outcome> = out.outcomes.iter().map(|(_, o)| o).collect();
        assert_eq!(outcomes[0], &Outcome::NoCaptions);
        assert!(matches!(outcomes[1], Outcome::Failed(_)));
        assert_eq!(outcomes[2], &Outcome::Captioned { cues: 1 });
    }

    #[test]
    fn empty_caption_track_counts_as_no_captions() {
        let captions = FakeCaptions::default().with("a", Canned::Cues(Vec::new()));
        let err = extract("x", &langs(), &videos(&["a"]), &captions).unwrap_err();
        assert!(matches!(err, PipelineError::NoDocuments));

        let captions = FakeCaptions::default()
            .with("a", Canned::Cues(Vec::new()))
            .with("b", Canned::Cues(vec![CaptionFragment::new(0.0, 1.0, "x")]));
        let out = extract("x", &langs(), &videos(&["a", "b"]), &captions).unwrap();
        assert_eq!(out.documents.len(), 1);
        assert_eq!(out.documents[0].video_id, "b");
        assert_eq!(out.outcomes[0].1, Outcome::NoCaptions);
    }

    #[test]
    fn repeated_videos_are_fetched_once() {
        let cue = || Canned::Cues(vec![CaptionFragment::new(0.0, 1.0, "x")]);
        let captions = FakeCaptions::default().with("a", cue()).with("b", cue());

        let out = extract("x", &langs(), &videos(&["a", "b", "a"]), &captions).unwrap();
        assert_eq!(*captions.calls.borrow(), ["a", "b"]);
        assert_eq!(out.documents.len(), 2);
        assert_eq!(out.outcomes.len(), 2);
        assert_eq!(out.duplicates, 1);

        let pkg = Package::from_documents(&out.documents, "x.zip").unwrap();
        assert!(matches!(pkg, Package::Archive { .. }));
    }

    #[test]
    fn one_distinct_video_listed_twice_is_a_single_file() {
        let captions = FakeCaptions::default()
            .with("a", Canned::Cues(vec![CaptionFragment::new(0.0, 1.0, "x")]));

        let out = extract("x", &langs(), &videos(&["a", "a"]), &captions).unwrap();
        let pkg = Package::from_documents(&out.documents, "x.zip").unwrap();
        assert_eq!(pkg.file_name(), "a.srt");
    }

    #[test]
    fn no_documents_is_an_error() {
        let captions = FakeCaptions::default().with("a", Canned::Broken);
        let err = extract("x", &langs(), &videos(&["a", "b"]), &captions).unwrap_err();
        assert!(matches!(err, PipelineError::NoDocuments));
    }

    #[test]
    fn documents_keep_discovery_order() {
        let cue = || Canned::Cues(vec![CaptionFragment::new(1.0, 1.0, "x")]);
        let captions = FakeCaptions::default().with("z", cue()).with("a", cue());
        let mut source = videos(&["z", "a"]);
        if let Ok(d) = &mut source.0 {
            d.skipped = 2;
        }

        let out = extract("x", &langs(), &source, &captions).unwrap();
        let names: Vec<String> = out.documents.iter().map(Document::file_name).collect();
        assert_eq!(names, ["z.srt", "a.srt"]);
        assert_eq!(out.skipped, 2);
    }
}

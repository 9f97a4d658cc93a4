use std::fmt;

/// One caption cue as delivered by the captions source.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionFragment {
    /// Seconds from the start of the media.
    pub start: f64,
    /// Seconds the cue stays visible.
    pub duration: f64,
    pub text: String,
}

impl CaptionFragment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A single numbered SubRip block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub sequence_number: usize,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// An ordered list of numbered blocks, one per fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleDocument {
    pub blocks: Vec<Block>,
}

impl SubtitleDocument {
    /// Numbers fragments from 1 in the order given. Nothing is sorted,
    /// merged or dropped.
    pub fn from_fragments(fragments: &[CaptionFragment]) -> Self {
        let blocks = fragments
            .iter()
            .enumerate()
            .map(|(i, frag)| Block {
                sequence_number: i + 1,
                start: format_timestamp(frag.start),
                end: format_timestamp(frag.end()),
                text: frag.text.replace('\n', " "),
            })
            .collect();

        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sequence_number)?;
        writeln!(f, "{} --> {}", self.start, self.end)?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

impl fmt::Display for SubtitleDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

/// Render fragments as a SubRip document.
pub fn build_document(fragments: &[CaptionFragment]) -> String {
    SubtitleDocument::from_fragments(fragments).to_string()
}

/// Format seconds as `H:MM:SS,mmm`.
///
/// Hours are unpadded and unbounded. The input is resolved to whole
/// microseconds before the milliseconds are truncated, so `59.999` stays
/// `,999` instead of falling to `,998` through float error. Negative and NaN
/// input saturate to zero.
pub fn format_timestamp(seconds: f64) -> String {
    let micros = (seconds * 1_000_000.0).round() as u64;
    let millis = micros / 1_000;

    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let secs = (millis % 60_000) / 1_000;
    let ms = millis % 1_000;

    format!("{hours}:{minutes:02}:{secs:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_format_ts {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;
                assert_eq!(format_timestamp(input), expected);
            }
        )*
        }
    }

    test_format_ts! {
        format_ts_zero: (0.0, "0:00:00,000"),
        format_ts_integral_seconds: (1.0, "0:00:01,000"),
        format_ts_half_second: (1.5, "0:00:01,500"),
        format_ts_truncates_not_rounds: (1.0009, "0:00:01,000"),
        format_ts_just_under_minute: (59.999, "0:00:59,999"),
        format_ts_one_minute: (60.0, "0:01:00,000"),
        format_ts_hour_minute_second: (3661.25, "1:01:01,250"),
        format_ts_ten_hours: (36_000.0, "10:00:00,000"),
        format_ts_past_a_day: (90_061.007, "25:01:01,007"),
        format_ts_hundred_hours: (360_000.001, "100:00:00,001"),
        format_ts_negative_saturates: (-3.0, "0:00:00,000"),
    }

    #[test]
    fn timestamps_match_fixed_pattern() {
        let re = regex::Regex::new(r"^\d+:\d{2}:\d{2},\d{3}$").unwrap();
        let mut s = 0.0;
        while s < 400_000.0 {
            let ts = format_timestamp(s);
            assert!(re.is_match(&ts), "{s} -> {ts}");
            s = s * 1.7 + 0.123;
        }
    }

    #[test]
    fn format_is_repeatable() {
        assert_eq!(format_timestamp(12.345), format_timestamp(12.345));
    }

    #[test]
    fn empty_input_builds_empty_document() {
        assert_eq!(build_document(&[]), "");
        assert!(SubtitleDocument::from_fragments(&[]).is_empty());
    }

    #[test]
    fn single_fragment_newlines_become_spaces() {
        let doc = build_document(&[CaptionFragment::new(0.0, 1.5, "Hello\nworld")]);
        assert_eq!(doc, "1\n0:00:00,000 --> 0:00:01,500\nHello world\n\n");
    }

    #[test]
    fn redundant_spaces_are_kept() {
        let doc = build_document(&[CaptionFragment::new(2.0, 1.0, "a \n b")]);
        assert_eq!(doc, "1\n0:00:02,000 --> 0:00:03,000\na   b\n\n");
    }

    #[test]
    fn blocks_follow_input_order_without_sorting() {
        let frags = vec![
            CaptionFragment::new(10.0, 2.0, "later"),
            CaptionFragment::new(1.0, 2.0, "earlier"),
        ];
        let doc = build_document(&frags);
        assert_eq!(
            doc,
            "1\n0:00:10,000 --> 0:00:12,000\nlater\n\n\
             2\n0:00:01,000 --> 0:00:03,000\nearlier\n\n"
        );

        let parsed = SubtitleDocument::from_fragments(&frags);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.blocks[0].sequence_number, 1);
        assert_eq!(parsed.blocks[1].text, "earlier");
    }

    #[test]
    fn duplicate_fragments_are_not_merged() {
        let frag = CaptionFragment::new(0.0, 1.0, "same");
        let doc = SubtitleDocument::from_fragments(&[frag.clone(), frag]);
        assert_eq!(doc.len(), 2);
    }
}

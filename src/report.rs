use crate::discovery::Video;
use crate::pipeline::{Extraction, Outcome};

/// Per-video outcome table printed at the end of a run.
pub fn format_table(outcomes: &[(Video, Outcome)]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.set_header(["#", "Video", "Title", "Captions"]);

    for (i, (video, outcome)) in outcomes.iter().enumerate() {
        table.add_row([
            (i + 1).to_string(),
            video.id.clone(),
            video.title.clone(),
            describe(outcome),
        ]);
    }

    table
}

/// One-line tally printed under the table.
pub fn summary(extraction: &Extraction) -> String {
    let mut line = format!(
        "{} of {} video(s) captioned",
        extraction.documents.len(),
        extraction.outcomes.len()
    );
    if extraction.skipped > 0 {
        line.push_str(&format!(", {} unavailable entr(ies) skipped", extraction.skipped));
    }
    if extraction.duplicates > 0 {
        line.push_str(&format!(", {} repeated entr(ies) ignored", extraction.duplicates));
    }
    line
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Captioned { cues } => format!("{cues} cue(s)"),
        Outcome::NoCaptions => "none available".to_string(),
        Outcome::Failed(reason) => format!("error: {reason}"),
    }
}

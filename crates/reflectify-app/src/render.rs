//! Plain-text rendering of engine results for the terminal.

use reflectify_core::{AnalysisRecord, ScoreBand, Speaker, Turn};
use reflectify_engine::UserNotice;

pub fn render_turn(turn: &Turn) -> String {
    match turn.speaker() {
        Speaker::User => format!("you> {}", turn.text()),
        Speaker::Assistant => format!("reflectify> {}", turn.text()),
    }
}

fn band_label(band: ScoreBand) -> &'static str {
    match band {
        ScoreBand::Low => "low",
        ScoreBand::Moderate => "moderate",
        ScoreBand::High => "high",
    }
}

/// Overall label, the five scores with their bands, the highest category
/// when it is above the low band, then the summary.
pub fn render_analysis(record: &AnalysisRecord) -> String {
    let mut out = format!("{}\n\n", record.overall.display_label());
    for (category, score) in record.scores() {
        out.push_str(&format!(
            "  {:<16} {:>5.1}%  {}\n",
            category.label(),
            score * 100.0,
            band_label(ScoreBand::from_score(score))
        ));
    }
    let dominant = record.dominant_category();
    if ScoreBand::from_score(record.score(dominant)) != ScoreBand::Low {
        out.push_str(&format!("\n  Highest: {}\n", dominant.label()));
    }
    out.push_str(&format!("\n{}", record.summary_or_placeholder()));
    out
}

pub fn render_notice(notice: &UserNotice) -> String {
    format!("{}. {}", notice.title, notice.description)
}

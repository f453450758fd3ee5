pub mod category;
pub mod document;
pub mod lines;

pub use category::{Category, IconHint};
pub use document::{AnalysisDocument, Section, Subtopic};

/// Three-pass pipeline: raw text → color scan → classified lines → document.
/// Total over arbitrary input; malformed text degrades into key insights.
pub fn parse(text: &str) -> AnalysisDocument {
    let colors = lines::collect_colors(text);
    let classified: Vec<lines::Line> = text.lines().map(lines::classify).collect();
    document::assemble(&classified, colors)
}

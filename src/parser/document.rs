use serde::{Deserialize, Serialize};

use super::category::{is_actionable, Category, IconHint};
use super::lines::Line;

/// Shown when the input yields no key insights to summarize from.
pub const FALLBACK_SUMMARY: &str = "No summary available for this analysis.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDocument {
    pub summary: String,
    pub sections: Vec<Section>,
    pub colors: Vec<String>,
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub category: Category,
    pub icon: IconHint,
    pub content: Vec<String>,
    pub subtopics: Vec<Subtopic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtopic {
    pub title: String,
    pub content: Vec<String>,
}

/// Fold classified lines into a document. Sections are built in place and
/// finalized when the next heading arrives or input ends; empty and
/// blank-titled sections are dropped at that point.
pub fn assemble(lines: &[Line], colors: Vec<String>) -> AnalysisDocument {
    let mut sections: Vec<Section> = Vec::new();
    let mut key_insights: Vec<String> = Vec::new();
    let mut current: Option<Section> = None;
    let mut open_subtopic: Option<Subtopic> = None;

    for line in lines {
        match line {
            Line::Heading { title } => {
                close_section(&mut sections, &mut current, &mut open_subtopic);
                if !is_actionable(title) {
                    current = Some(Section {
                        title: title.clone(),
                        category: Category::infer(title),
                        icon: IconHint::infer(title),
                        content: Vec::new(),
                        subtopics: Vec::new(),
                    });
                }
            }
            Line::Subheading { title, rest } => {
                if current.is_some() {
                    close_subtopic(&mut current, &mut open_subtopic);
                    let mut sub = Subtopic {
                        title: title.clone(),
                        content: Vec::new(),
                    };
                    if !rest.is_empty() {
                        sub.content.push(rest.clone());
                    }
                    open_subtopic = Some(sub);
                } else {
                    // Subheadings only take effect inside a section.
                    let text = if rest.is_empty() {
                        title.clone()
                    } else {
                        format!("{}: {}", title, rest)
                    };
                    route(&text, &mut current, &mut open_subtopic, &mut key_insights);
                }
            }
            Line::Bullet(text) | Line::Plain(text) => {
                route(text, &mut current, &mut open_subtopic, &mut key_insights);
            }
            Line::Skip => {}
        }
    }

    close_section(&mut sections, &mut current, &mut open_subtopic);

    let summary = if key_insights.is_empty() {
        FALLBACK_SUMMARY.to_string()
    } else {
        key_insights
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    };

    AnalysisDocument {
        summary,
        sections,
        colors,
        key_insights,
    }
}

fn route(
    text: &str,
    current: &mut Option<Section>,
    open_subtopic: &mut Option<Subtopic>,
    key_insights: &mut Vec<String>,
) {
    if text.is_empty() {
        return;
    }
    if let Some(sub) = open_subtopic.as_mut() {
        sub.content.push(text.to_string());
    } else if let Some(sec) = current.as_mut() {
        sec.content.push(text.to_string());
    } else {
        key_insights.push(text.to_string());
    }
}

fn close_subtopic(current: &mut Option<Section>, open_subtopic: &mut Option<Subtopic>) {
    if let Some(sub) = open_subtopic.take() {
        if let Some(sec) = current.as_mut() {
            if !sub.content.is_empty() {
                sec.subtopics.push(sub);
            }
        }
    }
}

fn close_section(
    sections: &mut Vec<Section>,
    current: &mut Option<Section>,
    open_subtopic: &mut Option<Subtopic>,
) {
    close_subtopic(current, open_subtopic);
    if let Some(sec) = current.take() {
        if !sec.title.is_empty() && (!sec.content.is_empty() || !sec.subtopics.is_empty()) {
            sections.push(sec);
        }
    }
}

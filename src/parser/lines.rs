use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*([^*]*?):?\*\*$").unwrap());
static SUBHEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-•]\s*)?\*\*([^*]+?):\*\*\s*(.*)$").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-•]\s*(.*)$").unwrap());
static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[0-9A-Fa-f]{6}\b").unwrap());

/// One classified input line. Priority order is the match order in
/// [`classify`]: heading, subheading, bullet, plain.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// `**Title**` or `**Title:**`, the whole line wrapped in bold markers.
    Heading { title: String },
    /// `- **Title:** rest`: bold text ending in a colon, optional bullet
    /// marker in front, optional trailing text after the closing marker.
    Subheading { title: String, rest: String },
    /// `- text` or `• text`.
    Bullet(String),
    /// Any other non-empty line.
    Plain(String),
    /// Blank lines, markdown `#` headings, stray bold markers.
    Skip,
}

pub fn classify(raw: &str) -> Line {
    let line = raw.trim();

    if line.is_empty() {
        return Line::Skip;
    }

    if let Some(caps) = HEADING_RE.captures(line) {
        return Line::Heading {
            title: caps[1].trim().to_string(),
        };
    }

    if let Some(caps) = SUBHEADING_RE.captures(line) {
        return Line::Subheading {
            title: caps[1].trim().to_string(),
            rest: caps[2].trim().to_string(),
        };
    }

    if let Some(caps) = BULLET_RE.captures(line) {
        return Line::Bullet(caps[1].trim().to_string());
    }

    // Markdown headings and leftover bold markers carry no content of their
    // own; colors on them are still picked up by the independent scan.
    if line.starts_with('#') || line.starts_with("**") {
        return Line::Skip;
    }

    Line::Plain(line.to_string())
}

/// Scan the whole input for `#RRGGBB` tokens, independent of line
/// classification. Deduplicated exactly, first-seen order preserved.
pub fn collect_colors(text: &str) -> Vec<String> {
    let mut colors: Vec<String> = Vec::new();
    for m in HEX_COLOR_RE.find_iter(text) {
        if !colors.iter().any(|c| c == m.as_str()) {
            colors.push(m.as_str().to_string());
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_plain_and_with_colon() {
        assert_eq!(
            classify("**Visual Design**"),
            Line::Heading { title: "Visual Design".into() }
        );
        assert_eq!(
            classify("**Visual Design:**"),
            Line::Heading { title: "Visual Design".into() }
        );
    }

    #[test]
    fn heading_blank_title() {
        assert_eq!(classify("****"), Line::Heading { title: String::new() });
    }

    #[test]
    fn bare_bold_with_colon_is_heading_not_subheading() {
        // Priority: the heading pattern wins over the subheading pattern
        // when the line is wholly wrapped in bold.
        assert_eq!(
            classify("**Cores:**"),
            Line::Heading { title: "Cores".into() }
        );
    }

    #[test]
    fn subheading_with_bullet_marker() {
        assert_eq!(
            classify("- **Cores:** vermelho e branco"),
            Line::Subheading {
                title: "Cores".into(),
                rest: "vermelho e branco".into()
            }
        );
    }

    #[test]
    fn subheading_without_bullet_needs_trailing_text() {
        assert_eq!(
            classify("**Tom:** informal"),
            Line::Subheading { title: "Tom".into(), rest: "informal".into() }
        );
    }

    #[test]
    fn bullet_variants() {
        assert_eq!(classify("- Uses bold red"), Line::Bullet("Uses bold red".into()));
        assert_eq!(classify("• Clean layout"), Line::Bullet("Clean layout".into()));
        assert_eq!(classify("-"), Line::Bullet(String::new()));
    }

    #[test]
    fn plain_line() {
        assert_eq!(classify("Strong opening frame"), Line::Plain("Strong opening frame".into()));
    }

    #[test]
    fn skipped_lines() {
        assert_eq!(classify(""), Line::Skip);
        assert_eq!(classify("   "), Line::Skip);
        assert_eq!(classify("## Analysis"), Line::Skip);
        assert_eq!(classify("** dangling"), Line::Skip);
    }

    #[test]
    fn colors_dedup_first_seen_order() {
        let text = "CTA em #FF5733\nfundo #0000FF\nrepete #FF5733";
        assert_eq!(collect_colors(text), vec!["#FF5733", "#0000FF"]);
    }

    #[test]
    fn colors_require_six_hex_digits() {
        assert!(collect_colors("#FFF e #GG0011 e #12345").is_empty());
    }

    #[test]
    fn colors_found_on_skipped_lines() {
        assert_eq!(collect_colors("## paleta #A1B2C3"), vec!["#A1B2C3"]);
    }
}

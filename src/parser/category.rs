use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Title keyword sets. Portuguese terms carry both accented and plain forms
// so titles survive whichever way the model spells them.
static VISUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvisual|\bdesign|\bcor(es)?\b|\bcolor|\bimagem|\bimage|\blayout|\best[eé]tica|\bgr[aá]fic").unwrap()
});
static COPY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcopy\b|\btexto|\btext\b|\bmensagem|\bmessage|\bheadline|\bt[ií]tulo|\bchamada|\btom\b").unwrap()
});
static PERFORMANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bperformance|\bdesempenho|\bm[eé]trica|\bmetric|\bresultado|\bconvers[aã]o|\bctr\b|\bengajamento|\bengagement").unwrap()
});
static INSIGHTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\binsight|\baprendizado|\blearning|\bobserva[cç]|\bdescoberta|\bfinding").unwrap()
});
static RECOMMENDATIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brecomenda|\brecommend|\bsugest|\bsuggest|\bmelhoria|\bimprovement|\botimiza|\boptimiz").unwrap()
});
static STRATEGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bestrat[eé]gia|\bstrategy|\bposicionamento|\bpositioning").unwrap()
});
static AUDIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bp[uú]blico|\baudience|\bpersona\b|\bsegmento|\bsegment\b").unwrap()
});
static ACTIONABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)pr[oó]ximos?\s+passos|next\s+steps|a[cç][oõ]es\s+recomendadas|action\s+items|plano\s+de\s+a[cç][aã]o").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Visual,
    Copy,
    Performance,
    Insights,
    Recommendations,
    General,
}

impl Category {
    /// First matching keyword set wins; the test order below is fixed.
    pub fn infer(title: &str) -> Self {
        if VISUAL_RE.is_match(title) {
            Category::Visual
        } else if COPY_RE.is_match(title) {
            Category::Copy
        } else if PERFORMANCE_RE.is_match(title) {
            Category::Performance
        } else if INSIGHTS_RE.is_match(title) {
            Category::Insights
        } else if RECOMMENDATIONS_RE.is_match(title) {
            Category::Recommendations
        } else {
            Category::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Visual => "visual",
            Category::Copy => "copy",
            Category::Performance => "performance",
            Category::Insights => "insights",
            Category::Recommendations => "recommendations",
            Category::General => "general",
        }
    }

    pub fn from_str_or_general(s: &str) -> Self {
        match s {
            "visual" => Category::Visual,
            "copy" => Category::Copy,
            "performance" => Category::Performance,
            "insights" => Category::Insights,
            "recommendations" => Category::Recommendations,
            _ => Category::General,
        }
    }
}

/// Display icon for a section. Separate taxonomy from [`Category`]: the same
/// priority order plus strategy/audience terms mapped to auxiliary icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconHint {
    Palette,
    TextCursor,
    ChartLine,
    Lightbulb,
    ClipboardCheck,
    Target,
    Users,
    Sparkles,
}

impl IconHint {
    pub fn infer(title: &str) -> Self {
        if VISUAL_RE.is_match(title) {
            IconHint::Palette
        } else if COPY_RE.is_match(title) {
            IconHint::TextCursor
        } else if PERFORMANCE_RE.is_match(title) {
            IconHint::ChartLine
        } else if INSIGHTS_RE.is_match(title) {
            IconHint::Lightbulb
        } else if RECOMMENDATIONS_RE.is_match(title) {
            IconHint::ClipboardCheck
        } else if STRATEGY_RE.is_match(title) {
            IconHint::Target
        } else if AUDIENCE_RE.is_match(title) {
            IconHint::Users
        } else {
            IconHint::Sparkles
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IconHint::Palette => "palette",
            IconHint::TextCursor => "text_cursor",
            IconHint::ChartLine => "chart_line",
            IconHint::Lightbulb => "lightbulb",
            IconHint::ClipboardCheck => "clipboard_check",
            IconHint::Target => "target",
            IconHint::Users => "users",
            IconHint::Sparkles => "sparkles",
        }
    }

    pub fn from_str_or_sparkles(s: &str) -> Self {
        match s {
            "palette" => IconHint::Palette,
            "text_cursor" => IconHint::TextCursor,
            "chart_line" => IconHint::ChartLine,
            "lightbulb" => IconHint::Lightbulb,
            "clipboard_check" => IconHint::ClipboardCheck,
            "target" => IconHint::Target,
            "users" => IconHint::Users,
            _ => IconHint::Sparkles,
        }
    }
}

/// Next-steps headings are rendered elsewhere by callers; the parser drops
/// them and their lines are not reattributed.
pub fn is_actionable(title: &str) -> bool {
    ACTIONABLE_RE.is_match(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_priority_visual_wins() {
        // Matches both the visual and copy sets; visual is tested first.
        assert_eq!(Category::infer("Design do Texto"), Category::Visual);
    }

    #[test]
    fn category_accented_and_plain() {
        assert_eq!(Category::infer("Métricas de alcance"), Category::Performance);
        assert_eq!(Category::infer("Metricas de alcance"), Category::Performance);
    }

    #[test]
    fn category_default_general() {
        assert_eq!(Category::infer("Contexto do anúncio"), Category::General);
    }

    #[test]
    fn icon_auxiliary_taxonomy() {
        assert_eq!(IconHint::infer("Estratégia de lançamento"), IconHint::Target);
        assert_eq!(IconHint::infer("Público-alvo"), IconHint::Users);
        assert_eq!(IconHint::infer("Qualquer outra coisa"), IconHint::Sparkles);
    }

    #[test]
    fn icon_follows_category_priority() {
        // Strategy term present, but copy terms are checked first.
        assert_eq!(IconHint::infer("Mensagem da estratégia"), IconHint::TextCursor);
    }

    #[test]
    fn actionable_keywords() {
        assert!(is_actionable("Próximos Passos"));
        assert!(is_actionable("proximos passos"));
        assert!(is_actionable("Next Steps"));
        assert!(is_actionable("Plano de Ação"));
        assert!(!is_actionable("Passos do funil"));
    }

    #[test]
    fn string_round_trip() {
        for c in [
            Category::Visual,
            Category::Copy,
            Category::Performance,
            Category::Insights,
            Category::Recommendations,
            Category::General,
        ] {
            assert_eq!(Category::from_str_or_general(c.as_str()), c);
        }
        for i in [
            IconHint::Palette,
            IconHint::TextCursor,
            IconHint::ChartLine,
            IconHint::Lightbulb,
            IconHint::ClipboardCheck,
            IconHint::Target,
            IconHint::Users,
            IconHint::Sparkles,
        ] {
            assert_eq!(IconHint::from_str_or_sparkles(i.as_str()), i);
        }
    }
}

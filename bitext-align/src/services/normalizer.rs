//! Text normalizer
//!
//! Cleans raw paragraph lists before alignment. By default only control
//! characters and whitespace change, so every paragraph's text reaches the
//! output. `clear_decorations` is an opt-in lossy cleanup: it blanks dash
//! rules and lone dots but keeps the element, so boundaries are preserved.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DASH_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-\s]*$").expect("valid regex"));
static LONE_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.$").expect("valid regex"));

/// Section separators kept verbatim even when decorations are cleared
const SEPARATORS: [&str; 4] = ["- - -", "---", "***", "* * *"];

/// Normalizer switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerOptions {
    /// Prepend an empty paragraph to A when the combined count is odd and B
    /// is longer
    pub insert_missing_title: bool,
    /// Blank out paragraphs that are only dashes or a lone dot, except the
    /// `SEPARATORS`. Off by default: the blanked text is lost.
    pub clear_decorations: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            insert_missing_title: true,
            clear_decorations: false,
        }
    }
}

/// Whitespace/control-character cleanup plus the missing-title heuristic
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    options: NormalizerOptions,
}

impl TextNormalizer {
    pub fn new(options: NormalizerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> NormalizerOptions {
        self.options
    }

    /// Clean one paragraph
    ///
    /// Control characters and byte-order marks are removed, whitespace runs
    /// collapse to a single space, and the result is trimmed.
    pub fn normalize_paragraph(&self, text: &str) -> String {
        let stripped: String = text
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .filter(|c| !c.is_control() && *c != '\u{feff}')
            .collect();

        let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();

        if self.options.clear_decorations
            && !SEPARATORS.contains(&collapsed.as_str())
            && (DASH_RULE.is_match(&collapsed) || LONE_DOT.is_match(&collapsed))
        {
            return String::new();
        }

        collapsed
    }

    /// Normalize both sequences
    ///
    /// Returns new sequences; the inputs are not modified. When
    /// `insert_missing_title` is set and `len(a) + len(b)` is odd with B the
    /// longer sequence, an empty paragraph is prepended to A: articles that
    /// omit the translated title otherwise shift every later position.
    pub fn normalize(&self, a: &[String], b: &[String]) -> (Vec<String>, Vec<String>) {
        let mut out_a: Vec<String> = a.iter().map(|p| self.normalize_paragraph(p)).collect();
        let out_b: Vec<String> = b.iter().map(|p| self.normalize_paragraph(p)).collect();

        if self.options.insert_missing_title
            && (out_a.len() + out_b.len()) % 2 == 1
            && out_b.len() > out_a.len()
        {
            tracing::debug!(
                len_a = out_a.len(),
                len_b = out_b.len(),
                "Odd paragraph total with B longer, prepending empty title slot to A"
            );
            out_a.insert(0, String::new());
        }

        (out_a, out_b)
    }
}

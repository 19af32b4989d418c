//! Citation marker extraction and resolution.
//!
//! Finds in-text source markers such as `[doc1]`, `[Source 3]` or `(src-2)`
//! in an answer and checks that every distinct marker can be found in the
//! supplied context. Deterministic and side-effect free.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

use super::types::CitationResult;

/// Version of the citation marker grammar.
///
/// Stored audit results are only reproducible against the grammar that
/// produced them, so changes to what counts as a marker get a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationGrammar {
    /// `Doc`/`Source` prefixes may be glued to the ID, so `[Doc3]` cites `3`
    /// and `[doc1]` cites `1`.
    V0,
    /// A `Doc`/`Source` prefix must be followed by whitespace: `[Doc 3]`
    /// cites `3`, `[doc1]` cites `doc1`.
    #[default]
    V1,
}

impl CitationGrammar {
    fn marker_pattern(&self) -> &'static str {
        match self {
            Self::V0 => {
                r"(?i)\[(?:Doc\s?|Source\s?)?([a-zA-Z0-9\-_]+)\]|\((?:Source\s?)?([a-zA-Z0-9\-_]+)\)"
            }
            Self::V1 => {
                r"(?i)\[(?:(?:Doc|Source)\s+)?([a-zA-Z0-9_-]+)\]|\((?:Source\s+)?([a-zA-Z0-9_-]+)\)"
            }
        }
    }
}

impl std::fmt::Display for CitationGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V0 => write!(f, "v0"),
            Self::V1 => write!(f, "v1"),
        }
    }
}

impl std::str::FromStr for CitationGrammar {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v0" => Ok(Self::V0),
            "v1" => Ok(Self::V1),
            other => Err(format!("unknown citation grammar '{}'", other)),
        }
    }
}

/// Pattern-based citation checker.
#[derive(Debug, Clone)]
pub struct CitationChecker {
    grammar: CitationGrammar,
    marker: Regex,
}

impl CitationChecker {
    /// Create a checker for the given grammar version.
    pub fn new(grammar: CitationGrammar) -> Result<Self> {
        let marker = Regex::new(grammar.marker_pattern())
            .map_err(|e| Error::config(format!("invalid citation grammar {}: {}", grammar, e)))?;
        Ok(Self { grammar, marker })
    }

    pub fn grammar(&self) -> CitationGrammar {
        self.grammar
    }

    /// Distinct cited IDs in first-seen order.
    pub fn extract_citations(&self, answer: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for caps in self.marker.captures_iter(answer) {
            let Some(id) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if seen.insert(id.as_str()) {
                ids.push(id.as_str().to_string());
            }
        }

        ids
    }

    /// Check that every citation in `answer` resolves in `context`.
    pub fn verify_citations(&self, answer: &str, context: &str) -> CitationResult {
        let cited = self.extract_citations(answer);
        if cited.is_empty() {
            return CitationResult::uncited();
        }

        let missing_sources: Vec<String> = cited
            .iter()
            .filter(|id| !resolves_in_context(id, context))
            .cloned()
            .collect();

        let total = cited.len() as f64;
        let score = (total - missing_sources.len() as f64) / total;

        CitationResult {
            pass: missing_sources.is_empty(),
            score,
            missing_sources,
        }
    }
}

/// True if `context` mentions `id` as `[id]`, `(id)` or a standalone token.
///
/// Matching is ASCII case-insensitive. A token boundary is a change between
/// word and non-word characters, or either end of the context.
fn resolves_in_context(id: &str, context: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let needle = id.to_ascii_lowercase();
    let haystack = context.to_ascii_lowercase();

    let mut from = 0;
    while let Some(offset) = haystack[from..].find(&needle) {
        let start = from + offset;
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();

        let bracketed = matches!(
            (before, after),
            (Some('['), Some(']')) | (Some('('), Some(')'))
        );
        let token = boundary(before, needle.chars().next())
            && boundary(needle.chars().next_back(), after);
        if bracketed || token {
            return true;
        }

        // IDs are ASCII, so the byte after a match start is a char boundary.
        from = start + 1;
    }
    false
}

fn boundary(left: Option<char>, right: Option<char>) -> bool {
    is_word_char(left) != is_word_char(right)
}

fn is_word_char(c: Option<char>) -> bool {
    c.map_or(false, |c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn checker() -> CitationChecker {
        CitationChecker::new(CitationGrammar::V1).unwrap()
    }

    #[test]
    fn test_no_citations_passes() {
        let result = checker().verify_citations("Paris is the capital of France.", "");
        assert_eq!(result, CitationResult::uncited());
    }

    #[test]
    fn test_partial_resolution() {
        let result =
            checker().verify_citations("See [doc1] and (src2).", "doc1 confirms the fact.");
        assert!(!result.pass);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.missing_sources, vec!["src2".to_string()]);
    }

    #[test]
    fn test_all_resolved() {
        let context = "[a1] Water boils at 100C.\n\n(b-2) At sea level.";
        let result = checker().verify_citations("Boils at 100C [a1] at sea level (b-2).", context);
        assert!(result.pass);
        assert_eq!(result.score, 1.0);
        assert!(result.missing_sources.is_empty());
    }

    #[test]
    fn test_empty_context_misses_everything() {
        let result = checker().verify_citations("Per [x] and [y].", "");
        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.missing_sources, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_duplicates_count_once() {
        let c = checker();
        assert_eq!(
            c.extract_citations("[doc1] then [doc1] and (doc1) again, plus [doc2]"),
            vec!["doc1".to_string(), "doc2".to_string()]
        );

        let result = c.verify_citations("[doc1] [doc1] [doc2]", "doc2 only");
        assert_eq!(result.score, 0.5);
        assert_eq!(result.missing_sources, vec!["doc1".to_string()]);
    }

    #[test]
    fn test_prefixes() {
        let c = checker();
        assert_eq!(c.extract_citations("[Doc 3]"), vec!["3".to_string()]);
        assert_eq!(c.extract_citations("[source  7]"), vec!["7".to_string()]);
        assert_eq!(c.extract_citations("(Source abc)"), vec!["abc".to_string()]);
        assert_eq!(c.extract_citations("[doc1]"), vec!["doc1".to_string()]);
    }

    #[test]
    fn test_malformed_markers_ignored() {
        let c = checker();
        assert!(c.extract_citations("see [doc 1 and 2] or (two words) or [] or [a.b]").is_empty());
        assert!(c.extract_citations("unterminated [doc1 and (src").is_empty());
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let result = checker().verify_citations("Per [DOC-7].", "source doc-7 says so");
        assert!(result.pass);
    }

    #[test]
    fn test_resolution_requires_token_boundary() {
        let result = checker().verify_citations("Per [doc1].", "see doc12 and mydoc1x");
        assert!(!result.pass);
        assert_eq!(result.missing_sources, vec!["doc1".to_string()]);
    }

    #[test]
    fn test_bracketed_form_in_context_resolves() {
        assert!(resolves_in_context("7", "footnote [7]"));
        assert!(resolves_in_context("ref_1", "(REF_1) appendix"));
        assert!(!resolves_in_context("7", "item 77"));
        assert!(resolves_in_context("-x", "see [-x] above"));
    }

    #[test]
    fn test_token_resolution_at_context_edges() {
        assert!(resolves_in_context("doc1", "doc1"));
        assert!(resolves_in_context("doc1", "é doc1, ü"));
        assert!(!resolves_in_context("doc1", "édoc1"));
        assert!(resolves_in_context("doc1", "doc12 then doc1."));
    }

    #[test]
    fn test_very_long_id_resolves() {
        let id = "a".repeat(50_000);
        let answer = format!("See [{}].", id);
        let context = format!("{} is the source.", id);

        let c = checker();
        assert_eq!(c.extract_citations(&answer), vec![id.clone()]);
        let result = c.verify_citations(&answer, &context);
        assert!(result.pass);
        assert_eq!(result.score, 1.0);

        let missing = c.verify_citations(&answer, &format!("{}b is not it", id));
        assert_eq!(missing.missing_sources, vec![id]);
    }

    #[test]
    fn test_v0_grammar_glues_prefix() {
        let c = CitationChecker::new(CitationGrammar::V0).unwrap();
        assert_eq!(c.grammar(), CitationGrammar::V0);
        assert_eq!(c.extract_citations("[Doc3] and [doc1]"), vec!["3".to_string(), "1".to_string()]);
        assert_eq!(c.extract_citations("(Source9)"), vec!["9".to_string()]);
    }

    #[test]
    fn test_grammar_parse() {
        assert_eq!("V0".parse::<CitationGrammar>(), Ok(CitationGrammar::V0));
        assert_eq!("v1".parse::<CitationGrammar>(), Ok(CitationGrammar::V1));
        assert!("v2".parse::<CitationGrammar>().is_err());
        assert_eq!(CitationGrammar::default(), CitationGrammar::V1);
    }
}

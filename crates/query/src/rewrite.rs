use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    Original,
    Expansion,
    Hyde,
    Decomposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Lookup,
    HowTo,
    Debug,
    Explore,
    Compare,
    Configure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Expansion,
    Hyde,
    Decomposition,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub weight: f32,
    pub source: QuerySource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteFlags {
    pub enable_expansion: bool,
    pub enable_hyde: bool,
    pub enable_decomposition: bool,
    pub disable_rewrite: bool,
}

#[derive(Debug, Clone)]
pub struct RewriteResult {
    pub queries: Vec<SearchQuery>,
    pub intent: Intent,
    pub strategy: Strategy,
    /// `false` on the early-return path: no rewrite took place.
    pub rewritten: bool,
}

const HOW_TO_PHRASES: &[&str] = &["how do i", "how to", "steps to", "guide for"];
const DEBUG_PHRASES: &[&str] = &["error", "failing", "broken", "doesn't work", "traceback", "stack trace", "exception"];
const COMPARE_PHRASES: &[&str] = &["vs", "versus", "compare", "difference between", "better than"];
const CONFIGURE_PHRASES: &[&str] = &["configure", "setup", "set up", "settings", "enable", "disable"];
const EXPLORE_PHRASES: &[&str] = &["what is", "overview of", "explain", "tell me about"];

fn infer_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    if DEBUG_PHRASES.iter().any(|p| lower.contains(p)) {
        Intent::Debug
    } else if COMPARE_PHRASES.iter().any(|p| lower.contains(p)) {
        Intent::Compare
    } else if HOW_TO_PHRASES.iter().any(|p| lower.contains(p)) {
        Intent::HowTo
    } else if CONFIGURE_PHRASES.iter().any(|p| lower.contains(p)) {
        Intent::Configure
    } else if EXPLORE_PHRASES.iter().any(|p| lower.contains(p)) {
        Intent::Explore
    } else {
        Intent::Lookup
    }
}

/// Expands a query into a hypothetical-answer-style sentence. This is a
/// deterministic template, not a generative call — the real HyDE document
/// is produced upstream by whatever extraction backend is wired in; this
/// stage only needs a distinct search string to widen lexical recall.
fn hyde_expand(text: &str) -> String {
    format!("{text} is typically addressed by")
}

fn keyword_expand(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| w.len() > 3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stage 4.2.1: produces the ordered list of [`SearchQuery`] plus intent and
/// strategy. Early-returns the original query untouched when `disable_rewrite`
/// is set or the query is empty.
pub fn rewrite(text: &str, flags: &RewriteFlags) -> RewriteResult {
    let intent = infer_intent(text);
    if flags.disable_rewrite || text.trim().is_empty() {
        return RewriteResult {
            queries: vec![SearchQuery {
                text: text.to_string(),
                weight: 1.0,
                source: QuerySource::Original,
            }],
            intent,
            strategy: Strategy::Direct,
            rewritten: false,
        };
    }

    let mut queries = vec![SearchQuery {
        text: text.to_string(),
        weight: 1.0,
        source: QuerySource::Original,
    }];

    if flags.enable_expansion {
        let expanded = keyword_expand(text);
        if !expanded.is_empty() && expanded != text {
            queries.push(SearchQuery { text: expanded, weight: 0.6, source: QuerySource::Expansion });
        }
    }
    if flags.enable_hyde {
        queries.push(SearchQuery { text: hyde_expand(text), weight: 0.5, source: QuerySource::Hyde });
    }
    if flags.enable_decomposition {
        for part in text.split(|c| c == ',' || c == ';').map(str::trim).filter(|p| !p.is_empty()) {
            queries.push(SearchQuery { text: part.to_string(), weight: 0.4, source: QuerySource::Decomposition });
        }
    }

    let strategy = match (flags.enable_hyde, flags.enable_expansion) {
        (true, true) => Strategy::Hybrid,
        (true, false) => Strategy::Hyde,
        (false, true) => Strategy::Expansion,
        (false, false) if flags.enable_decomposition => Strategy::Decomposition,
        (false, false) => Strategy::Direct,
    };

    RewriteResult { queries, intent, strategy, rewritten: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_rewrite_returns_only_original_at_full_weight() {
        let result = rewrite("how to fix broken build", &RewriteFlags { disable_rewrite: true, ..Default::default() });
        assert_eq!(result.queries.len(), 1);
        assert_eq!(result.queries[0].weight, 1.0);
        assert!(!result.rewritten);
    }

    #[test]
    fn empty_query_short_circuits() {
        let result = rewrite("", &RewriteFlags::default());
        assert_eq!(result.queries.len(), 1);
        assert!(!result.rewritten);
    }

    #[test]
    fn hybrid_strategy_when_hyde_and_expansion_both_enabled() {
        let flags = RewriteFlags { enable_expansion: true, enable_hyde: true, ..Default::default() };
        let result = rewrite("database connection error", &flags);
        assert_eq!(result.strategy, Strategy::Hybrid);
        assert_eq!(result.intent, Intent::Debug);
        assert!(result.queries.len() >= 2);
    }

    #[test]
    fn intent_keyword_heuristics() {
        assert_eq!(infer_intent("how do i configure retries"), Intent::HowTo);
        assert_eq!(infer_intent("stack trace on startup"), Intent::Debug);
        assert_eq!(infer_intent("redb vs sled"), Intent::Compare);
        assert_eq!(infer_intent("setup the vector index"), Intent::Configure);
        assert_eq!(infer_intent("what is the scope chain"), Intent::Explore);
        assert_eq!(infer_intent("quantizer config"), Intent::Lookup);
    }
}

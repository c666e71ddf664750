//! Keyword and length heuristics for classifying a task locally.
//!
//! Used when the remote classifier is unreachable or slow so task intake
//! never blocks on it. Fast (a few regex scans) and deterministic.

use std::sync::LazyLock;

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use crate::task::{TaskComplexity, TaskType};

/// Name of the local classifier, reported in `ClassificationResult::classifier_used`.
pub const HEURISTIC_CLASSIFIER: &str = "heuristic";

/// Keyword tables in tie-break order.
const TYPE_KEYWORDS: &[(TaskType, &[&str])] = &[
    (
        TaskType::BugFix,
        &[
            r"\bbug\b",
            r"\berror\b",
            r"\bfix\b",
            r"\bcrash\b",
            r"\bissue\b",
            r"\bfail(s|ing|ed)?\b",
            r"\bbroken\b",
            r"\bdefect\b",
            r"\bproblem\b",
            r"\bincorrect\b",
        ],
    ),
    (
        TaskType::Feature,
        &[
            r"\badd\b",
            r"\bimplement\b",
            r"\bcreate\b",
            r"\bnew\b",
            r"\bfeature\b",
            r"\benhance\b",
            r"\bsupport\b",
            r"\bintroduce\b",
            r"\bextend\b",
            r"\bbuild\b",
        ],
    ),
    (
        TaskType::Refactor,
        &[
            r"\brefactor\b",
            r"\bclean\b",
            r"\boptimize\b",
            r"\bimprove\b",
            r"\breorganize\b",
            r"\brestructure\b",
            r"\bsimplify\b",
            r"\bmodernize\b",
            r"\bupgrade\b",
        ],
    ),
    (
        TaskType::Test,
        &[
            r"\btest\b",
            r"\bunit test\b",
            r"\bintegration test\b",
            r"\bcoverage\b",
            r"\bspec\b",
            r"\bvalidate\b",
            r"\bverify\b",
            r"\bmock\b",
            r"\bassertion\b",
        ],
    ),
    (
        TaskType::Documentation,
        &[
            r"\bdoc(s|umentation)?\b",
            r"\breadme\b",
            r"\bcomment\b",
            r"\bexplain\b",
            r"\bdescribe\b",
            r"\bguide\b",
            r"\btutorial\b",
            r"\bexample\b",
            r"\bannotate\b",
        ],
    ),
    (
        TaskType::Deployment,
        &[
            r"\bdeploy\b",
            r"\brelease\b",
            r"\bci/cd\b",
            r"\bpipeline\b",
            r"\bdocker\b",
            r"\bkubernetes\b",
            r"\bhelm\b",
            r"\bcontainer\b",
            r"\binfrastructure\b",
        ],
    ),
];

const SIMPLE_KEYWORDS: &[&str] = &[
    r"\bsmall\b",
    r"\bquick\b",
    r"\bminor\b",
    r"\btrivial\b",
    r"\btypo\b",
    r"\bone[ -]line\b",
    r"\bsimple\b",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    r"\bcomplex\b",
    r"\bmajor\b",
    r"\barchitecture\b",
    r"\brewrite\b",
    r"\bmigration\b",
    r"\brefactor all\b",
    r"\blarge[ -]scale\b",
    r"\bentire\b",
    r"\bsystem[ -]wide\b",
];

const EPIC_KEYWORDS: &[&str] = &[r"\bepic\b", r"\bmulti[ -]service\b", r"\bplatform[ -]wide\b"];

/// Word counts that bound the length-based complexity estimate.
const SIMPLE_MAX_WORDS: usize = 20;
const COMPLEX_MIN_WORDS: usize = 100;
const EPIC_MIN_WORDS: usize = 400;

fn build_set(patterns: &[&str]) -> RegexSet {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .expect("heuristic keyword patterns should compile")
}

static TYPE_SETS: LazyLock<Vec<(TaskType, RegexSet)>> = LazyLock::new(|| {
    TYPE_KEYWORDS
        .iter()
        .map(|(task_type, patterns)| (*task_type, build_set(patterns)))
        .collect()
});
static SIMPLE_SET: LazyLock<RegexSet> = LazyLock::new(|| build_set(SIMPLE_KEYWORDS));
static COMPLEX_SET: LazyLock<RegexSet> = LazyLock::new(|| build_set(COMPLEX_KEYWORDS));
static EPIC_SET: LazyLock<RegexSet> = LazyLock::new(|| build_set(EPIC_KEYWORDS));

/// Classification verdict, from either the remote classifier or the heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub task_type: TaskType,
    pub complexity: TaskComplexity,
    /// 0.0–1.0.
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    /// Strategy name the classifier recommends (advisory).
    pub suggested_strategy: String,
    pub estimated_tokens: u64,
    #[serde(default)]
    pub classifier_used: Option<String>,
}

/// Strategy name conventionally paired with a complexity tier.
pub fn suggested_strategy_for(complexity: TaskComplexity) -> &'static str {
    match complexity {
        TaskComplexity::Simple => "SingleShot",
        TaskComplexity::Medium => "Iterative",
        TaskComplexity::Complex | TaskComplexity::Epic => "MultiAgent",
    }
}

/// Local keyword/length classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a task description.
    pub fn classify(&self, description: &str) -> ClassificationResult {
        let counts: Vec<(TaskType, usize)> = TYPE_SETS
            .iter()
            .map(|(task_type, set)| (*task_type, set.matches(description).iter().count()))
            .filter(|(_, n)| *n > 0)
            .collect();

        let complexity = self.estimate_complexity(description);

        if counts.is_empty() {
            return ClassificationResult {
                task_type: TaskType::Feature,
                complexity,
                confidence: 0.3,
                reasoning: "No keyword matches found, defaulting to feature".to_string(),
                suggested_strategy: suggested_strategy_for(complexity).to_string(),
                estimated_tokens: complexity.estimated_tokens(),
                classifier_used: Some(HEURISTIC_CLASSIFIER.to_string()),
            };
        }

        // First maximum wins, so table order breaks ties.
        let (task_type, best) = counts
            .iter()
            .copied()
            .fold(counts[0], |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        let total: usize = counts.iter().map(|(_, n)| n).sum();

        let base = best as f64 / total as f64;
        let confidence = if counts.len() == 1 {
            (base + 0.2).min(0.95)
        } else {
            base.min(0.85)
        };

        ClassificationResult {
            task_type,
            complexity,
            confidence,
            reasoning: format!("Matched {best} keywords for {task_type}"),
            suggested_strategy: suggested_strategy_for(complexity).to_string(),
            estimated_tokens: complexity.estimated_tokens(),
            classifier_used: Some(HEURISTIC_CLASSIFIER.to_string()),
        }
    }

    /// Estimate complexity from explicit keywords, then from length.
    pub fn estimate_complexity(&self, description: &str) -> TaskComplexity {
        let words = description.split_whitespace().count();

        if EPIC_SET.is_match(description) || words > EPIC_MIN_WORDS {
            return TaskComplexity::Epic;
        }
        if COMPLEX_SET.is_match(description) {
            return TaskComplexity::Complex;
        }
        if SIMPLE_SET.is_match(description) {
            return TaskComplexity::Simple;
        }

        if words < SIMPLE_MAX_WORDS {
            TaskComplexity::Simple
        } else if words > COMPLEX_MIN_WORDS {
            TaskComplexity::Complex
        } else {
            TaskComplexity::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_fix_keywords() {
        let result = HeuristicClassifier::new().classify("Fix the crash when the login fails");
        assert_eq!(result.task_type, TaskType::BugFix);
        assert!(result.confidence > 0.9);
        assert_eq!(result.classifier_used.as_deref(), Some(HEURISTIC_CLASSIFIER));
    }

    #[test]
    fn no_keywords_defaults_to_feature() {
        let result = HeuristicClassifier::new().classify("lorem ipsum dolor");
        assert_eq!(result.task_type, TaskType::Feature);
        assert!((result.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn word_boundaries_respected() {
        // "address" must not count as "add".
        let result = HeuristicClassifier::new().classify("address lookup");
        assert_eq!(result.task_type, TaskType::Feature);
        assert!((result.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn mixed_matches_cap_confidence() {
        let result = HeuristicClassifier::new().classify("fix the bug and add a test");
        assert_eq!(result.task_type, TaskType::BugFix);
        assert!(result.confidence <= 0.85);
    }

    #[test]
    fn keyword_tables_match_exact_words() {
        let classifier = HeuristicClassifier::new();

        // "tests" is not the keyword "test"; only "add" matches.
        let result = classifier.classify("add tests for the parser");
        assert_eq!(result.task_type, TaskType::Feature);
        assert!((result.confidence - 0.95).abs() < 1e-9);

        let result = classifier.classify("optimize the query planner");
        assert_eq!(result.task_type, TaskType::Refactor);
    }

    #[test]
    fn typo_is_simple() {
        let c = HeuristicClassifier::new().estimate_complexity("Fix typo in the README header");
        assert_eq!(c, TaskComplexity::Simple);
    }

    #[test]
    fn complex_keyword_wins_over_length() {
        let c = HeuristicClassifier::new().estimate_complexity("rewrite auth");
        assert_eq!(c, TaskComplexity::Complex);
    }

    #[test]
    fn length_drives_medium() {
        let desc = "word ".repeat(50);
        let c = HeuristicClassifier::new().estimate_complexity(&desc);
        assert_eq!(c, TaskComplexity::Medium);
    }

    #[test]
    fn very_long_is_epic() {
        let desc = "word ".repeat(450);
        let result = HeuristicClassifier::new().classify(&desc);
        assert_eq!(result.complexity, TaskComplexity::Epic);
        assert_eq!(result.suggested_strategy, "MultiAgent");
        assert_eq!(result.estimated_tokens, 40_000);
    }
}

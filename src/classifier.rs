//! Intent Classifier
//!
//! Maps a customer message to one intent by whole-word keyword matching.
//! Each matching keyword phrase adds its word count to its intent's score;
//! the highest score wins, ties go to the intent whose longest matching
//! phrase is longest, then to declaration order.

use crate::models::Intent;
use lazy_static::lazy_static;
use regex::Regex;

/// Static keyword table, in classification priority order
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::ServiceItems,
        &[
            "service", "services", "what can you do", "help", "offerings",
            "products", "available services",
        ],
    ),
    (
        Intent::BranchInfo,
        &[
            "branch", "branches", "address", "location", "contact", "phone", "hours",
            "where is", "where are", "nearest branch",
        ],
    ),
    (
        Intent::LoanProcess,
        &[
            "loan application", "apply for loan", "borrow", "application process",
            "how to apply", "apply for a loan", "loan process", "get a loan",
        ],
    ),
    (
        Intent::AccountOpening,
        &[
            "account", "open", "opening", "new account", "register", "sign up",
            "how to open",
        ],
    ),
    (
        Intent::BankAccount,
        &["account number", "account no", "bank account", "my account"],
    ),
    (
        Intent::AccountBalance,
        &[
            "balance", "how much", "available", "account balance",
            "remaining balance",
        ],
    ),
    (
        Intent::LoanBalance,
        &["loan balance", "owe", "outstanding", "debt", "loan amount"],
    ),
    (
        Intent::OpeningBranch,
        &[
            "opening branch", "where opened", "which branch", "account from",
            "account opened", "opened account", "branch is my account",
            "where was my account opened", "where did i open",
        ],
    ),
    (
        Intent::GeneralHelp,
        &[
            "hello", "hi", "hey", "good morning", "good afternoon", "good evening",
            "menu",
        ],
    ),
];

struct KeywordPattern {
    pattern: Regex,
    words: usize,
}

lazy_static! {
    static ref COMPILED: Vec<(Intent, Vec<KeywordPattern>)> = INTENT_KEYWORDS
        .iter()
        .map(|(intent, keywords)| {
            let patterns = keywords
                .iter()
                .filter_map(|kw| {
                    Regex::new(&format!(r"\b{}\b", regex::escape(kw)))
                        .ok()
                        .map(|pattern| KeywordPattern {
                            pattern,
                            words: kw.split_whitespace().count(),
                        })
                })
                .collect();
            (*intent, patterns)
        })
        .collect();
}

/// Outcome of classifying one message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// Winning score divided by the message word count. Not clamped.
    pub confidence: f32,
}

/// Keyword intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify a customer message
    pub fn classify(text: &str) -> Classification {
        let lower = text.to_lowercase();

        // (intent, score, longest matching phrase)
        let mut best: Option<(Intent, usize, usize)> = None;

        for (intent, patterns) in COMPILED.iter() {
            let (score, longest) = patterns
                .iter()
                .filter(|kw| kw.pattern.is_match(&lower))
                .fold((0usize, 0usize), |(score, longest), kw| {
                    (score + kw.words, longest.max(kw.words))
                });

            if score == 0 {
                continue;
            }

            let better = match best {
                None => true,
                Some((_, best_score, best_longest)) => {
                    score > best_score || (score == best_score && longest > best_longest)
                }
            };

            if better {
                best = Some((*intent, score, longest));
            }
        }

        match best {
            Some((intent, score, _)) => {
                let words = lower.split_whitespace().count().max(1);
                Classification {
                    intent,
                    confidence: score as f32 / words as f32,
                }
            }
            None => Classification {
                intent: Intent::Unknown,
                confidence: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_queries() {
        let cases = vec![
            ("What services do you offer?", Intent::ServiceItems),
            ("Where are your branches?", Intent::BranchInfo),
            ("How do I apply for a loan?", Intent::LoanProcess),
            ("How do I open a new account?", Intent::AccountOpening),
            ("hello there", Intent::GeneralHelp),
        ];

        for (text, expected) in cases {
            let result = IntentClassifier::classify(text);
            assert_eq!(result.intent, expected, "input: {}", text);
            assert!(result.confidence > 0.0);
        }
    }

    #[test]
    fn test_sensitive_queries() {
        let cases = vec![
            ("What is my account balance?", Intent::AccountBalance),
            ("What is my bank account number?", Intent::BankAccount),
            ("What is my loan balance?", Intent::LoanBalance),
            ("Where was my account opened?", Intent::OpeningBranch),
        ];

        for (text, expected) in cases {
            assert_eq!(IntentClassifier::classify(text).intent, expected, "input: {}", text);
        }
    }

    #[test]
    fn test_unknown_has_zero_confidence() {
        let result = IntentClassifier::classify("the weather is lovely today");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);

        let empty = IntentClassifier::classify("   ");
        assert_eq!(empty.intent, Intent::Unknown);
    }

    #[test]
    fn test_word_boundaries() {
        // "open" must not match inside "opened"/"opening" and "hi" not inside "this"
        let result = IntentClassifier::classify("this reopened thing");
        assert_eq!(result.intent, Intent::Unknown);
    }

    #[test]
    fn test_single_keyword_confidence() {
        let result = IntentClassifier::classify("debt");
        assert_eq!(result.intent, Intent::LoanBalance);
        assert_eq!(result.confidence, 1.0);

        let result = IntentClassifier::classify("I have some debt");
        assert_eq!(result.intent, Intent::LoanBalance);
        assert_eq!(result.confidence, 0.25);
    }

    #[test]
    fn test_confidence_can_exceed_one() {
        // "account balance" scores balance (1) + account balance (2) over two words
        let result = IntentClassifier::classify("account balance");
        assert_eq!(result.intent, Intent::AccountBalance);
        assert!(result.confidence > 1.0);
    }

    #[test]
    fn test_tie_broken_by_longest_phrase() {
        // BranchInfo: "branch" + "phone" = 2, OpeningBranch: "which branch" = 2
        let result = IntentClassifier::classify("which branch phone");
        assert_eq!(result.intent, Intent::OpeningBranch);
    }

    #[test]
    fn test_deterministic() {
        let a = IntentClassifier::classify("How much do I owe on my loan balance?");
        let b = IntentClassifier::classify("How much do I owe on my loan balance?");
        assert_eq!(a, b);
    }
}

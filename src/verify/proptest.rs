//! Property-based tests for scoring and citation checking.
//!
//! - Trust scores stay in `[0, 1]` for any judge output
//! - The action agrees with the published score and the threshold
//! - A retry suggestion accompanies every rejection and nothing else
//! - Answers without markers always pass the citation check

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::verify::citation::{CitationChecker, CitationGrammar};
    use crate::verify::scoring::{score, UNGROUNDED_CAP};
    use crate::verify::types::{Action, CitationResult, GroundingResult, APPROVAL_THRESHOLD};

    fn unit_score() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            Just(0.7),
            Just(1.0),
            0.0f64..=1.0f64,
        ]
    }

    fn grounding() -> impl Strategy<Value = GroundingResult> {
        (
            any::<bool>(),
            unit_score(),
            prop::collection::vec("[a-z ]{1,20}", 0..3),
        )
            .prop_map(|(pass, score, unsupported_claims)| GroundingResult {
                pass,
                score,
                reason: "generated".to_string(),
                unsupported_claims,
            })
    }

    fn citation() -> impl Strategy<Value = CitationResult> {
        (
            any::<bool>(),
            unit_score(),
            prop::collection::vec("[a-z0-9]{1,6}", 0..3),
        )
            .prop_map(|(pass, score, missing_sources)| CitationResult {
                pass,
                score,
                missing_sources,
            })
    }

    // Text that can never contain a bracket or parenthesis.
    fn marker_free_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 .,;:!?'\"-]{0,200}"
    }

    proptest! {
        /// Scores are bounded for any combination of results.
        #[test]
        fn trust_score_is_bounded(g in grounding(), c in citation()) {
            let decision = score(&g, &c).unwrap();
            prop_assert!((0.0..=1.0).contains(&decision.trust_score));
        }

        /// APPROVE exactly when the published score meets the threshold.
        #[test]
        fn action_matches_threshold(g in grounding(), c in citation()) {
            let decision = score(&g, &c).unwrap();
            prop_assert_eq!(
                decision.action == Action::Approve,
                decision.trust_score >= APPROVAL_THRESHOLD
            );
        }

        /// A suggestion is attached to every rejection and only to rejections.
        #[test]
        fn suggestion_iff_reject(g in grounding(), c in citation()) {
            let decision = score(&g, &c).unwrap();
            prop_assert_eq!(
                decision.retry_suggestion.is_some(),
                decision.action == Action::Reject
            );
            if let Some(suggestion) = decision.retry_suggestion {
                prop_assert!(suggestion.ends_with(". Please revise."));
            }
        }

        /// Failed grounding can never be approved.
        #[test]
        fn ungrounded_never_approved(g in grounding(), c in citation()) {
            let g = GroundingResult { pass: false, ..g };
            let decision = score(&g, &c).unwrap();
            prop_assert!(decision.trust_score <= UNGROUNDED_CAP);
            prop_assert_eq!(decision.action, Action::Reject);
        }

        /// Answers without markers pass regardless of context.
        #[test]
        fn no_markers_always_pass(answer in marker_free_text(), context in ".{0,200}") {
            for grammar in [CitationGrammar::V0, CitationGrammar::V1] {
                let checker = CitationChecker::new(grammar).unwrap();
                prop_assert_eq!(
                    checker.verify_citations(&answer, &context),
                    CitationResult::uncited()
                );
            }
        }

        /// Citation score is the resolved fraction of distinct markers, and
        /// exactly the unresolved IDs are reported in first-seen order.
        #[test]
        fn citation_score_is_fraction(
            ids in prop::collection::vec("[a-z][a-z0-9]{0,5}", 1..8),
            known in prop::collection::vec(any::<bool>(), 8)
        ) {
            let mut distinct: Vec<&String> = Vec::new();
            for id in &ids {
                if !distinct.contains(&id) {
                    distinct.push(id);
                }
            }

            let answer: String = ids.iter().map(|id| format!("[{}] ", id)).collect();
            let context: String = distinct
                .iter()
                .zip(known.iter())
                .filter(|(_, k)| **k)
                .map(|(id, _)| format!("({}) ", id))
                .collect();
            let expected: Vec<String> = distinct
                .iter()
                .zip(known.iter())
                .filter(|(_, k)| !**k)
                .map(|(id, _)| id.to_string())
                .collect();

            let checker = CitationChecker::new(CitationGrammar::V1).unwrap();
            let result = checker.verify_citations(&answer, &context);

            let n = distinct.len();
            prop_assert_eq!(&result.missing_sources, &expected);
            prop_assert_eq!(result.score, (n - expected.len()) as f64 / n as f64);
            prop_assert_eq!(result.pass, expected.is_empty());
        }

        /// Identical inputs always yield identical decisions.
        #[test]
        fn scoring_is_deterministic(g in grounding(), c in citation()) {
            prop_assert_eq!(score(&g, &c).unwrap(), score(&g, &c).unwrap());
        }
    }
}

//! Verification orchestrator.
//!
//! [`Verifier::verify`] is the public entry point:
//! 1. JOIN: Collapse context passages into one string
//! 2. CHECK: Run the citation checker and grounding judge concurrently
//! 3. SCORE: Combine both results into a trust score and action
//! 4. AUDIT: Hand the verdict to the audit sink without waiting on it
//!
//! A REJECT verdict is a successful, negative judgment. An `Err` from
//! `verify` is an infrastructure fault and should be rendered with
//! [`FailureResponse`].

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink, SqliteAuditLog, TracingAuditSink};
use crate::config::{Environment, VerifierConfig};
use crate::error::{Error, Result};
use crate::llm::{build_client, ClientConfig, LlmReasoningProvider, ReasoningProvider};
use crate::verify::{
    round2, scoring, CitationChecker, CitationGrammar, CitationResult, GroundingJudge,
    GroundingResult, JudgeConfig, TestResults, Verdict, VerificationRequest,
};

/// Message returned to callers for every infrastructure failure.
pub const FAILURE_MESSAGE: &str = "Internal server error during verification";

/// Audits generated answers against their context.
///
/// Construct once and share; every collaborator is stateless after
/// construction.
pub struct Verifier {
    citation: CitationChecker,
    judge: GroundingJudge,
    audit: Arc<dyn AuditSink>,
    environment: Environment,
}

impl Verifier {
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Build a verifier entirely from environment variables.
    ///
    /// See [`VerifierConfig::from_env`] and [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let config = VerifierConfig::from_env()?;
        let client = build_client(config.provider, ClientConfig::from_env(config.provider)?)?;
        let provider = LlmReasoningProvider::new(client)
            .with_timeout(Duration::from_millis(config.attempt_timeout_ms));

        let audit: Arc<dyn AuditSink> = match &config.audit_db_path {
            Some(path) => Arc::new(SqliteAuditLog::open(path)?),
            None => Arc::new(TracingAuditSink),
        };

        Self::builder()
            .config(&config)
            .provider(Arc::new(provider))
            .audit_sink(audit)
            .build()
    }

    /// Verify one answer.
    ///
    /// Returns `Err` only for infrastructure faults; provider and judge
    /// failures surface as a REJECT verdict with a technical-error reason.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn verify(&self, request: &VerificationRequest) -> Result<Verdict> {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", tracing::field::display(request_id));
        let started = Instant::now();

        let checks = AssertUnwindSafe(self.run_checks(request)).catch_unwind();
        let verdict = match checks.await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                error!(error = %e, "Verification failed");
                return Err(match e {
                    Error::Infrastructure(_) => e,
                    other => Error::infrastructure(other.to_string()),
                });
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Verification panicked");
                return Err(Error::infrastructure(format!(
                    "verification panicked: {}",
                    message
                )));
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            action = %verdict.action,
            trust_score = verdict.trust_score,
            duration_ms,
            "Verification complete"
        );

        self.dispatch_audit(AuditRecord::new(request_id, request, &verdict, duration_ms));
        Ok(verdict)
    }

    /// Render an error from [`Verifier::verify`] for the caller.
    pub fn failure_response(&self, err: &Error) -> FailureResponse {
        FailureResponse::from_error(err, self.environment.exposes_error_details())
    }

    pub fn citation_grammar(&self) -> CitationGrammar {
        self.citation.grammar()
    }

    async fn run_checks(&self, request: &VerificationRequest) -> Result<Verdict> {
        let context = request.joined_context();

        let (citation, grounding) = tokio::join!(
            async { self.citation.verify_citations(&request.answer, &context) },
            self.judge
                .verify_grounding(&request.question, &request.answer, &context),
        );

        let decision = scoring::score(&grounding, &citation)?;

        Ok(Verdict {
            trust_score: decision.trust_score,
            action: decision.action,
            tests: TestResults {
                grounding: GroundingResult {
                    score: round2(grounding.score),
                    ..grounding
                },
                citation: CitationResult {
                    score: round2(citation.score),
                    ..citation
                },
            },
            retry_suggestion: decision.retry_suggestion,
        })
    }

    fn dispatch_audit(&self, record: AuditRecord) {
        let sink = Arc::clone(&self.audit);
        let request_id = record.request_id;
        let write = async move {
            if let Err(e) = sink.record(record).await {
                warn!(%request_id, sink = sink.name(), error = %e, "Audit write failed");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(write);
            }
            Err(_) => warn!(%request_id, "No tokio runtime; audit record dropped"),
        }
    }
}

/// Assembles a [`Verifier`] from explicitly supplied collaborators.
#[derive(Default)]
pub struct VerifierBuilder {
    provider: Option<Arc<dyn ReasoningProvider>>,
    judge: JudgeConfig,
    grammar: CitationGrammar,
    audit: Option<Arc<dyn AuditSink>>,
    environment: Environment,
}

impl VerifierBuilder {
    /// Reasoning provider backing the grounding judge (required).
    pub fn provider(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn judge_config(mut self, judge: JudgeConfig) -> Self {
        self.judge = judge;
        self
    }

    pub fn citation_grammar(mut self, grammar: CitationGrammar) -> Self {
        self.grammar = grammar;
        self
    }

    /// Audit destination; defaults to [`TracingAuditSink`].
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Apply the judge, grammar and environment settings of `config`.
    pub fn config(self, config: &VerifierConfig) -> Self {
        self.judge_config(config.judge.clone())
            .citation_grammar(config.citation_grammar)
            .environment(config.environment)
    }

    pub fn build(self) -> Result<Verifier> {
        let provider = self
            .provider
            .ok_or_else(|| Error::config("a reasoning provider is required"))?;

        Ok(Verifier {
            citation: CitationChecker::new(self.grammar)?,
            judge: GroundingJudge::new(provider, self.judge),
            audit: self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink)),
            environment: self.environment,
        })
    }
}

/// Body returned to callers when verification itself fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResponse {
    /// Always `"error"`
    pub status: String,
    pub message: String,
    /// Diagnostic detail, only outside production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl FailureResponse {
    pub fn from_error(err: &Error, expose_details: bool) -> Self {
        Self {
            status: "error".to_string(),
            message: FAILURE_MESSAGE.to_string(),
            details: expose_details.then(|| err.to_string()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::{ChannelAuditSink, FailingAuditSink};
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::Generation;
    use crate::verify::Action;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const GROUNDED: &str =
        r#"{"pass": true, "score": 0.9, "reason": "All claims supported.", "unsupported_claims": []}"#;
    const HALLUCINATED: &str = r#"{"pass": false, "score": 0.9, "reason": "Invented a date.", "unsupported_claims": ["It opened in 1999."]}"#;

    fn verifier(provider: Arc<dyn ReasoningProvider>) -> Verifier {
        Verifier::builder().provider(provider).build().unwrap()
    }

    fn request() -> VerificationRequest {
        VerificationRequest::new("When did it open?", "It opened in 2001 [doc1].")
            .with_passage("doc1: The museum opened in 2001.")
    }

    struct PanickingProvider;

    #[async_trait]
    impl ReasoningProvider for PanickingProvider {
        async fn generate(&self, _system: &str, _user: &str) -> Result<Generation> {
            panic!("judge exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = Verifier::builder().build().err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_applies_config() {
        let config = VerifierConfig::default().with_citation_grammar(CitationGrammar::V0);
        let verifier = Verifier::builder()
            .config(&config)
            .provider(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .build()
            .unwrap();
        assert_eq!(verifier.citation_grammar(), CitationGrammar::V0);
    }

    #[tokio::test]
    async fn test_grounded_cited_answer_approved() {
        let verdict = verifier(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .verify(&request())
            .await
            .unwrap();

        // 0.9 * 0.8 + 1.0 * 0.2
        assert_eq!(verdict.trust_score, 0.92);
        assert_eq!(verdict.action, Action::Approve);
        assert!(verdict.tests.citation.pass);
        assert_eq!(verdict.retry_suggestion, None);
    }

    #[tokio::test]
    async fn test_hallucination_rejected_with_suggestion() {
        let verdict = verifier(Arc::new(ScriptedProvider::replying(HALLUCINATED)))
            .verify(&request())
            .await
            .unwrap();

        assert_eq!(verdict.trust_score, 0.4);
        assert_eq!(verdict.action, Action::Reject);
        assert_eq!(
            verdict.retry_suggestion.as_deref(),
            Some("Unsupported claims: It opened in 1999.. Please revise.")
        );
    }

    #[tokio::test]
    async fn test_missing_citation_reported() {
        let request = VerificationRequest::new("q", "See [doc1] and (src2).")
            .with_passage("doc1 confirms the fact.");
        let verdict = verifier(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .verify(&request)
            .await
            .unwrap();

        assert_eq!(verdict.tests.citation.missing_sources, vec!["src2".to_string()]);
        assert_eq!(verdict.tests.citation.score, 0.5);
        // 0.9 * 0.8 + 0.5 * 0.2
        assert_eq!(verdict.trust_score, 0.82);
        assert_eq!(verdict.action, Action::Approve);
    }

    #[tokio::test]
    async fn test_provider_outage_is_reject_not_error() {
        let provider = Arc::new(ScriptedProvider::failing("connection refused"));
        let verdict = verifier(provider.clone()).verify(&request()).await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(verdict.action, Action::Reject);
        assert_eq!(verdict.trust_score, 0.0);
        assert_eq!(
            verdict.tests.grounding.unsupported_claims,
            vec![GroundingResult::SYSTEM_ERROR_CLAIM.to_string()]
        );
        assert!(verdict
            .retry_suggestion
            .as_deref()
            .unwrap()
            .starts_with("Unsupported claims: System Error"));
    }

    #[tokio::test]
    async fn test_context_passages_joined_for_judge() {
        let provider = Arc::new(ScriptedProvider::replying(GROUNDED));
        let request = VerificationRequest::new("q", "a")
            .with_passage("first")
            .with_passage("second");
        verifier(provider.clone()).verify(&request).await.unwrap();

        let prompts = provider.prompts();
        assert!(prompts[0].1.contains("\"\"\"\nfirst\n\nsecond\n\"\"\""));
    }

    #[tokio::test]
    async fn test_component_scores_rounded() {
        let provider = Arc::new(ScriptedProvider::replying(
            r#"{"pass": true, "score": 0.876, "reason": "ok", "unsupported_claims": []}"#,
        ));
        let request = VerificationRequest::new("q", "[a] [b] [c]").with_passage("a b");
        let verdict = verifier(provider).verify(&request).await.unwrap();

        assert_eq!(verdict.tests.grounding.score, 0.88);
        assert_eq!(verdict.tests.citation.score, 0.67);
    }

    #[tokio::test]
    async fn test_idempotent_with_deterministic_provider() {
        let verifier = verifier(Arc::new(ScriptedProvider::replying(HALLUCINATED)));
        let first = verifier.verify(&request()).await.unwrap();
        let second = verifier.verify(&request()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_judge_latency_does_not_change_verdict() {
        let fast = verifier(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .verify(&request())
            .await
            .unwrap();
        let slow = verifier(Arc::new(
            ScriptedProvider::replying(GROUNDED).with_delay(Duration::from_secs(5)),
        ))
        .verify(&request())
        .await
        .unwrap();

        assert_eq!(fast, slow);
    }

    #[tokio::test]
    async fn test_panic_becomes_infrastructure_error() {
        let err = verifier(Arc::new(PanickingProvider))
            .verify(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Infrastructure(_)));
        assert!(err.to_string().contains("judge exploded"));
    }

    #[tokio::test]
    async fn test_audit_record_emitted() {
        let (sink, mut rx) = ChannelAuditSink::new();
        let verifier = Verifier::builder()
            .provider(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .audit_sink(Arc::new(sink))
            .build()
            .unwrap();

        let request = request();
        let verdict = verifier.verify(&request).await.unwrap();
        let record = rx.recv().await.unwrap();

        assert_eq!(record.question, request.question);
        assert_eq!(record.answer, request.answer);
        assert_eq!(record.action, verdict.action);
        assert_eq!(record.trust_score, verdict.trust_score);
        assert_eq!(record.result_details, verdict.tests);
    }

    #[tokio::test]
    async fn test_failing_audit_sink_does_not_fail_verify() {
        let verifier = Verifier::builder()
            .provider(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .audit_sink(Arc::new(FailingAuditSink))
            .build()
            .unwrap();

        let verdict = verifier.verify(&request()).await.unwrap();
        assert!(verdict.is_approved());
    }

    #[tokio::test]
    async fn test_sqlite_audit_sink_end_to_end() {
        let log = SqliteAuditLog::in_memory().unwrap();
        let verifier = Verifier::builder()
            .provider(Arc::new(ScriptedProvider::replying(HALLUCINATED)))
            .audit_sink(Arc::new(log.clone()))
            .build()
            .unwrap();

        verifier.verify(&request()).await.unwrap();

        // The write is detached; poll until it lands.
        for _ in 0..100 {
            if log.count().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stats = log.stats().unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.rejection_rate, 100.0);
    }

    #[test]
    fn test_failure_response_hides_details_in_production() {
        let err = Error::infrastructure("scoring invariant violated");

        let prod = FailureResponse::from_error(&err, false);
        assert_eq!(
            serde_json::to_value(&prod).unwrap(),
            serde_json::json!({
                "status": "error",
                "message": "Internal server error during verification"
            })
        );

        let dev = FailureResponse::from_error(&err, true);
        assert_eq!(
            dev.details.as_deref(),
            Some("Infrastructure error: scoring invariant violated")
        );
    }

    #[test]
    fn test_failure_response_follows_environment() {
        let verifier = Verifier::builder()
            .provider(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .environment(Environment::Development)
            .build()
            .unwrap();
        let response = verifier.failure_response(&Error::infrastructure("boom"));
        assert_eq!(
            response.details.as_deref(),
            Some("Infrastructure error: boom")
        );

        let verifier = Verifier::builder()
            .provider(Arc::new(ScriptedProvider::replying(GROUNDED)))
            .build()
            .unwrap();
        let response = verifier.failure_response(&Error::infrastructure("boom"));
        assert!(response.details.is_none());
    }
}

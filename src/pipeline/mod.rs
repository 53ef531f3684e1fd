//! Pipeline driver: Scout, Matcher, ontology gate, Critic, one optional
//! refinement, Architect, then artifact assembly and persistence.
//!
//! ```text
//! Scouting(A) → Scouting(B) → Matching → OntologyGate → Critiquing
//!     → {Accept | Refine: Matching(feedback) → OntologyGate → Critiquing}
//!     → Synthesizing → Done
//! ```
//!
//! Content problems never abort a run: every stage has a fallback value.
//! Only collaborator failures (LLM transport, storage) return errors.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::agents::{Architect, Critic, CriticFeedback, Matcher, MatcherInput, Scout, Visionary};
use crate::config::{PipelineConfig, DEFAULT_REFINEMENT_THRESHOLD};
use crate::error::{AppResult, ToolError};
use crate::langbase::LlmClient;
use crate::ontology::check_alignment;
use crate::schema::{AnalogyMapping, LogicalPropertyGraph, ResearchReport, ValidatedHypothesis};
use crate::sources::{NoSources, SourceCollector, SourceFilters};
use crate::storage::Storage;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final report, with graphs, timestamp and sources attached.
    pub report: ResearchReport,
    /// Graph extracted from the source text.
    pub graph_a: LogicalPropertyGraph,
    /// Graph extracted from the target text.
    pub graph_b: LogicalPropertyGraph,
    /// Whether the refinement pass ran.
    pub refined: bool,
    /// Storage id, when a store is attached.
    pub report_id: Option<String>,
}

/// Result of the discovery flow: the suggested source domain and the run
/// it seeded.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Source-domain description proposed by the Visionary.
    pub suggestion: String,
    /// Pipeline run over `suggestion` and the problem.
    pub outcome: PipelineOutcome,
}

/// The analogy research pipeline.
pub struct AnalogyPipeline {
    scout: Scout,
    matcher: Matcher,
    critic: Critic,
    architect: Architect,
    visionary: Option<Visionary>,
    sources: Arc<dyn SourceCollector>,
    storage: Option<Arc<dyn Storage>>,
    refinement_threshold: f64,
    collect_sources: bool,
}

impl AnalogyPipeline {
    /// Pipeline over the given agents, without sources or storage.
    pub fn new(scout: Scout, matcher: Matcher, critic: Critic, architect: Architect) -> Self {
        Self {
            scout,
            matcher,
            critic,
            architect,
            visionary: None,
            sources: Arc::new(NoSources),
            storage: None,
            refinement_threshold: DEFAULT_REFINEMENT_THRESHOLD,
            collect_sources: false,
        }
    }

    /// Pipeline whose agents all share one LLM client.
    pub fn with_shared_llm(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(
            Scout::new(llm.clone()),
            Matcher::new(llm.clone()),
            Critic::new(llm.clone()),
            Architect::new(llm.clone()),
        )
        .with_visionary(Visionary::new(llm))
    }

    /// Enable the discovery flow.
    pub fn with_visionary(mut self, visionary: Visionary) -> Self {
        self.visionary = Some(visionary);
        self
    }

    /// Attach a source collector and turn collection on.
    pub fn with_sources(mut self, sources: Arc<dyn SourceCollector>) -> Self {
        self.sources = sources;
        self.collect_sources = true;
        self
    }

    /// Persist every finished report.
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Override the confidence below which a refinement pass runs.
    pub fn with_refinement_threshold(mut self, threshold: f64) -> Self {
        self.refinement_threshold = threshold;
        self
    }

    /// Apply threshold and collection switch from configuration.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.refinement_threshold = config.refinement_threshold;
        self.collect_sources = config.collect_sources;
        self
    }

    /// Refinement threshold in effect.
    pub fn refinement_threshold(&self) -> f64 {
        self.refinement_threshold
    }

    /// Run the full pipeline over a source and a target description.
    pub async fn run(
        &self,
        source_text: &str,
        target_text: &str,
        filters: &SourceFilters,
    ) -> AppResult<PipelineOutcome> {
        let start = Instant::now();

        info!(stage = "scouting", "Extracting source graph");
        let graph_a = self.scout.process(source_text).await?;
        info!(stage = "scouting", "Extracting target graph");
        let graph_b = self.scout.process(target_text).await?;

        info!(stage = "matching", "Aligning graphs");
        let mapping = self
            .matcher
            .process(&MatcherInput::Pair(graph_a.clone(), graph_b.clone()))
            .await?;

        let mut hypothesis = self.verify(&mapping, &graph_a, &graph_b).await?;
        let refined = hypothesis.needs_refinement(self.refinement_threshold);

        if refined {
            info!(
                stage = "refinement",
                is_consistent = hypothesis.is_consistent,
                confidence = hypothesis.confidence(),
                threshold = self.refinement_threshold,
                "Refining mapping with critic feedback"
            );
            let input = MatcherInput::Refinement {
                graph_a: graph_a.clone(),
                graph_b: graph_b.clone(),
                previous_mapping: Some(mapping),
                critic_feedback: Some(CriticFeedback::from(&hypothesis)),
            };
            let refined_mapping = self.matcher.process(&input).await?;
            hypothesis = self.verify(&refined_mapping, &graph_a, &graph_b).await?;
        }

        info!(
            stage = "synthesizing",
            is_consistent = hypothesis.is_consistent,
            confidence = hypothesis.confidence(),
            "Writing report"
        );
        let report = self.architect.process(&hypothesis).await?;
        let report = self
            .assemble(report, &graph_a, &graph_b, refined, source_text, target_text, filters)
            .await;

        let report_id = match &self.storage {
            Some(storage) => Some(storage.store_report(&report).await?),
            None => None,
        };

        info!(
            refined,
            report_id = report_id.as_deref().unwrap_or("-"),
            latency_ms = start.elapsed().as_millis(),
            "Pipeline run complete"
        );

        Ok(PipelineOutcome {
            report,
            graph_a,
            graph_b,
            refined,
            report_id,
        })
    }

    /// Ask the Visionary for a source domain, then run the pipeline with it
    /// as source and `problem` as target.
    pub async fn discover(&self, problem: &str, filters: &SourceFilters) -> AppResult<Discovery> {
        let visionary = self.visionary.as_ref().ok_or_else(|| ToolError::Validation {
            field: "visionary".to_string(),
            reason: "Discovery requires a Visionary agent".to_string(),
        })?;

        if problem.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "problem".to_string(),
                reason: "Problem cannot be empty".to_string(),
            }
            .into());
        }

        let suggestion = visionary.process(problem).await?;
        if suggestion.is_empty() {
            warn!("Visionary returned no suggestion");
        }

        let outcome = self.run(&suggestion, problem, filters).await?;
        Ok(Discovery {
            suggestion,
            outcome,
        })
    }

    /// Ontology gate, then Critic. A provable categorical mismatch rejects
    /// the mapping without consulting the Critic; otherwise the alignment
    /// result is re-applied to the Critic's verdict, which can only tighten it.
    async fn verify(
        &self,
        mapping: &AnalogyMapping,
        graph_a: &LogicalPropertyGraph,
        graph_b: &LogicalPropertyGraph,
    ) -> AppResult<ValidatedHypothesis> {
        let alignment = check_alignment(mapping, graph_a, graph_b);
        if !alignment.ok {
            info!(
                stage = "ontology_gate",
                issues = alignment.issues.len(),
                "Categorical mismatch, skipping critic"
            );
            return Ok(ValidatedHypothesis::rejected(mapping.clone(), alignment.issues));
        }

        info!(stage = "critiquing", matches = mapping.node_matches.len(), "Validating mapping");
        let hypothesis = self.critic.process(mapping).await?;
        Ok(enforce_alignment(hypothesis, graph_a, graph_b))
    }

    #[allow(clippy::too_many_arguments)]
    async fn assemble(
        &self,
        mut report: ResearchReport,
        graph_a: &LogicalPropertyGraph,
        graph_b: &LogicalPropertyGraph,
        refined: bool,
        source_text: &str,
        target_text: &str,
        filters: &SourceFilters,
    ) -> ResearchReport {
        report.properties.insert("graph_a".to_string(), json!(graph_a));
        report.properties.insert("graph_b".to_string(), json!(graph_b));
        report
            .properties
            .insert("stored_at".to_string(), json!(Utc::now().to_rfc3339()));
        report.properties.insert("refined".to_string(), json!(refined));
        report.input_query = format!("{} | {}", source_text, target_text);

        if self.collect_sources {
            let query = format!("{} {}", source_text, target_text);
            report.sources = self.sources.collect(&query, filters).await;
            debug!(count = report.sources.len(), "Sources attached");
        }

        report
    }
}

/// Re-check the hypothesis mapping against the real node types. Mismatches
/// not already reported are appended and force `is_consistent` to false.
pub fn enforce_alignment(
    hypothesis: ValidatedHypothesis,
    graph_a: &LogicalPropertyGraph,
    graph_b: &LogicalPropertyGraph,
) -> ValidatedHypothesis {
    let alignment = check_alignment(&hypothesis.mapping, graph_a, graph_b);
    let new_issues: Vec<String> = alignment
        .issues
        .into_iter()
        .filter(|issue| !hypothesis.issues.contains(issue))
        .collect();
    hypothesis.with_alignment_issues(new_issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langbase::MockLlmClient;
    use crate::ontology::OntologyType;
    use crate::schema::{LogicGraphNode, NodeMatch};
    use crate::storage::SqliteStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const GRAPH_A: &str = r#"{"nodes": [{"id": "a1", "label": "Heart", "node_type": "STRUCTURE"},
                                        {"id": "a2", "label": "Pumping", "node_type": "FUNCTION"}],
                              "edges": [{"source": "a1", "target": "a2", "relation": "performs"}]}"#;
    const GRAPH_B: &str = r#"{"nodes": [{"id": "b1", "label": "Pump", "node_type": "STRUCTURE"},
                                        {"id": "b2", "label": "Flow", "node_type": "FUNCTION"}],
                              "edges": [{"source": "b1", "target": "b2", "relation": "drives"}]}"#;
    const GOOD_MAPPING: &str = r#"{"node_matches": [{"source_id": "a1", "target_id": "b1", "reasoning": "both pump"}],
                                   "score": 0.8, "explanation": "Heart is a pump"}"#;
    const BAD_MAPPING: &str = r#"{"node_matches": [{"source_id": "a1", "target_id": "b2", "reasoning": "wrong"}],
                                  "score": 0.9, "explanation": "Heart is flow"}"#;
    const REPORT: &str = r#"{"summary": "Cardiac pumps", "findings": ["Valves are check valves"],
                             "recommendation": "Pursue"}"#;

    fn scout_llm() -> MockLlmClient {
        let calls = AtomicUsize::new(0);
        let mut llm = MockLlmClient::new();
        llm.expect_invoke().times(2).returning(move |_, _| {
            let reply = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                GRAPH_A
            } else {
                GRAPH_B
            };
            Ok(reply.to_string())
        });
        llm
    }

    /// Mock answering each call with the next reply in order.
    fn sequenced(replies: Vec<&'static str>) -> MockLlmClient {
        let calls = AtomicUsize::new(0);
        let count = replies.len();
        let mut llm = MockLlmClient::new();
        llm.expect_invoke().times(count).returning(move |_, _| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            Ok(replies[i].to_string())
        });
        llm
    }

    fn pipeline(matcher: MockLlmClient, critic: MockLlmClient) -> AnalogyPipeline {
        AnalogyPipeline::new(
            Scout::new(Arc::new(scout_llm())),
            Matcher::new(Arc::new(matcher)),
            Critic::new(Arc::new(critic)),
            Architect::new(Arc::new(sequenced(vec![REPORT]))),
        )
    }

    #[tokio::test]
    async fn test_confident_run_does_not_refine() {
        let pipeline = pipeline(
            sequenced(vec![GOOD_MAPPING]),
            sequenced(vec![r#"{"is_consistent": true, "issues": [], "confidence": 0.9}"#]),
        );
        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();

        assert!(!outcome.refined);
        assert_eq!(outcome.report.hypothesis.confidence(), 0.9);
        assert_eq!(outcome.report.summary, "Cardiac pumps");
        assert_eq!(outcome.report.input_query, "hearts | pumps");
        assert_eq!(outcome.report.properties["refined"], json!(false));
        assert_eq!(outcome.report.attached_graph("graph_a"), Some(outcome.graph_a.clone()));
        assert!(outcome.report.properties.contains_key("stored_at"));
        assert!(outcome.report.sources.is_empty());
        assert!(outcome.report_id.is_none());
    }

    #[tokio::test]
    async fn test_low_confidence_refines_exactly_once() {
        let pipeline = pipeline(
            sequenced(vec![GOOD_MAPPING, GOOD_MAPPING]),
            sequenced(vec![
                r#"{"is_consistent": true, "issues": ["weak"], "confidence": 0.5}"#,
                r#"{"is_consistent": true, "issues": [], "confidence": 0.3}"#,
            ]),
        );
        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();

        assert!(outcome.refined);
        // Second verdict is final even though it is still below threshold.
        assert_eq!(outcome.report.hypothesis.confidence(), 0.3);
        assert_eq!(outcome.report.properties["refined"], json!(true));
    }

    #[tokio::test]
    async fn test_refinement_sends_feedback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut matcher = MockLlmClient::new();
        matcher.expect_invoke().times(2).returning(move |_, msg| {
            recorder.lock().unwrap().push(msg.to_string());
            Ok(GOOD_MAPPING.to_string())
        });

        let pipeline = pipeline(
            matcher,
            sequenced(vec![
                r#"{"is_consistent": false, "issues": ["roles inverted"], "confidence": 0.9}"#,
                r#"{"is_consistent": true, "issues": [], "confidence": 0.95}"#,
            ]),
        );
        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();

        let messages = seen.lock().unwrap();
        assert!(!messages[0].contains("critic_feedback"));
        assert!(messages[1].contains("critic_feedback"));
        assert!(messages[1].contains("roles inverted"));
        assert!(messages[1].contains("previous_mapping"));
        assert!(outcome.report.hypothesis.is_consistent);
    }

    #[tokio::test]
    async fn test_ontology_gate_skips_critic() {
        // Critic has no expectations: any call panics.
        let pipeline = pipeline(
            sequenced(vec![BAD_MAPPING, BAD_MAPPING]),
            MockLlmClient::new(),
        );
        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();

        let hypothesis = &outcome.report.hypothesis;
        assert!(outcome.refined);
        assert!(!hypothesis.is_consistent);
        assert_eq!(hypothesis.confidence(), 0.0);
        assert_eq!(hypothesis.issues.len(), 1);
        assert!(hypothesis.issues[0].contains("[STRUCTURE]"));
        assert!(hypothesis.issues[0].contains("[FUNCTION]"));
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let pipeline = pipeline(
            sequenced(vec![GOOD_MAPPING]),
            sequenced(vec![r#"{"is_consistent": true, "confidence": 0.6}"#]),
        )
        .with_refinement_threshold(0.5);

        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();
        assert!(!outcome.refined);
    }

    #[tokio::test]
    async fn test_blank_texts_still_produce_report() {
        let matcher = sequenced(vec!["", ""]);
        let critic = sequenced(vec!["", ""]);
        let pipeline = AnalogyPipeline::new(
            Scout::new(Arc::new(MockLlmClient::new())),
            Matcher::new(Arc::new(matcher)),
            Critic::new(Arc::new(critic)),
            Architect::new(Arc::new(sequenced(vec![""]))),
        );

        let outcome = pipeline.run("", "  ", &SourceFilters::default()).await.unwrap();
        assert!(outcome.graph_a.is_empty());
        assert!(outcome.report.is_fallback());
        assert!(outcome.refined);
    }

    #[tokio::test]
    async fn test_run_stores_report() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let pipeline = pipeline(
            sequenced(vec![GOOD_MAPPING]),
            sequenced(vec![r#"{"is_consistent": true, "confidence": 0.85}"#]),
        )
        .with_storage(storage.clone());

        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();
        let id = outcome.report_id.expect("report id");
        let stored = storage.get_report(&id).await.unwrap().expect("stored entry");
        assert_eq!(stored.report, outcome.report);
    }

    struct RecordingSources(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl SourceCollector for RecordingSources {
        async fn collect(&self, query: &str, _filters: &SourceFilters) -> Vec<String> {
            self.0.lock().unwrap().push(query.to_string());
            vec!["https://example.org/paper".to_string()]
        }
    }

    #[tokio::test]
    async fn test_sources_attached() {
        let sources = Arc::new(RecordingSources(Mutex::new(Vec::new())));
        let pipeline = pipeline(
            sequenced(vec![GOOD_MAPPING]),
            sequenced(vec![r#"{"is_consistent": true, "confidence": 0.85}"#]),
        )
        .with_sources(sources.clone());

        let outcome = pipeline
            .run("hearts", "pumps", &SourceFilters::default())
            .await
            .unwrap();
        assert_eq!(outcome.report.sources, vec!["https://example.org/paper".to_string()]);
        assert_eq!(*sources.0.lock().unwrap(), vec!["hearts pumps".to_string()]);
    }

    #[tokio::test]
    async fn test_discover_requires_problem() {
        let pipeline = AnalogyPipeline::with_shared_llm(Arc::new(MockLlmClient::new()));
        let err = pipeline
            .discover("   ", &SourceFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Usage(_)));
    }

    #[test]
    fn test_enforce_alignment_only_tightens() {
        let graph_a = LogicalPropertyGraph::new(
            vec![LogicGraphNode::new("a1", "Heart").with_type(OntologyType::Structure)],
            vec![],
        )
        .unwrap();
        let graph_b = LogicalPropertyGraph::new(
            vec![LogicGraphNode::new("b1", "Flow").with_type(OntologyType::Function)],
            vec![],
        )
        .unwrap();
        let mapping = AnalogyMapping::new("graph_a", "graph_b", 0.9)
            .unwrap()
            .with_matches(vec![NodeMatch::new("a1", "b1", "")]);
        let hypothesis = ValidatedHypothesis::new(mapping, true, vec![], 0.9).unwrap();

        let enforced = enforce_alignment(hypothesis, &graph_a, &graph_b);
        assert!(!enforced.is_consistent);
        assert_eq!(enforced.issues.len(), 1);

        // Re-applying does not duplicate the issue.
        let again = enforce_alignment(enforced.clone(), &graph_a, &graph_b);
        assert_eq!(again, enforced);
    }
}

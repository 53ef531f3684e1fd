use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::AgentCore;
use crate::error::{AppError, AppResult};
use crate::extraction::{bool_field, number_field, string_list};
use crate::langbase::LlmClient;
use crate::ontology::mismatch_issue;
use crate::prompts::critic_system_prompt;
use crate::schema::{AnalogyMapping, Properties, ValidatedHypothesis};

/// Issue recorded when the Critic's reply cannot be used.
pub const CRITIC_FALLBACK_ISSUE: &str = "Critic failed to parse or validate response.";

/// Verification stage: mapping to a validated hypothesis.
#[derive(Clone)]
pub struct Critic {
    core: AgentCore,
}

impl Critic {
    /// Create a Critic calling through `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            core: AgentCore::new("Critic", llm, critic_system_prompt()),
        }
    }

    /// Judge `mapping`.
    ///
    /// The model's verdict is tightened by the match-level ontology
    /// annotations: any annotated pair with differing labels marks the
    /// hypothesis inconsistent.
    pub async fn process(&self, mapping: &AnalogyMapping) -> AppResult<ValidatedHypothesis> {
        let mapping_json =
            serde_json::to_string_pretty(mapping).map_err(|e| AppError::Internal {
                message: format!("Failed to serialize mapping: {}", e),
            })?;
        let message = format!(
            "Evaluate the following analogy mapping for structural isomorphism and functional plausibility. Return only a JSON object with is_consistent, issues and confidence.\n\n{}",
            mapping_json
        );

        let completion = self.core.complete(&message).await?;
        let hypothesis = self.parse_verdict(&completion, mapping);

        info!(
            is_consistent = hypothesis.is_consistent,
            confidence = hypothesis.confidence(),
            issues = hypothesis.issues.len(),
            "Critic produced verdict"
        );
        Ok(hypothesis)
    }

    fn parse_verdict(&self, completion: &str, mapping: &AnalogyMapping) -> ValidatedHypothesis {
        let Ok(obj) = self.core.parse_object(completion) else {
            return fallback_hypothesis(mapping.clone());
        };

        match hypothesis_from_object(obj, mapping) {
            Some(hypothesis) => hypothesis,
            None => {
                warn!(agent = self.core.name(), "Verdict failed validation");
                fallback_hypothesis(mapping.clone())
            }
        }
    }
}

/// Permissive verdict used when the reply is unusable: consistent, zero
/// confidence, one issue naming the failure.
pub fn fallback_hypothesis(mapping: AnalogyMapping) -> ValidatedHypothesis {
    let mut properties = Properties::new();
    properties.insert("fallback".to_string(), json!(true));
    ValidatedHypothesis::unscored(mapping, true, vec![CRITIC_FALLBACK_ISSUE.to_string()])
        .with_properties(properties)
}

fn hypothesis_from_object(
    obj: Map<String, Value>,
    mapping: &AnalogyMapping,
) -> Option<ValidatedHypothesis> {
    let mut is_consistent = bool_field(&obj, "is_consistent", true);
    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 0.0,
        Some(_) => number_field(&obj, "confidence")?,
    };

    let mut issues = match obj.get("issues") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(other) => string_list(other).unwrap_or_else(|| vec![other.to_string()]),
    };

    for node_match in &mapping.node_matches {
        if let (Some(source), Some(target)) = (node_match.source_ontology, node_match.target_ontology)
        {
            if source != target {
                is_consistent = false;
                issues.push(mismatch_issue(
                    source,
                    target,
                    &node_match.source_id,
                    &node_match.target_id,
                ));
            }
        }
    }

    let mut properties = Properties::new();
    properties.insert("critic_raw".to_string(), Value::Object(obj));

    ValidatedHypothesis::new(mapping.clone(), is_consistent, issues, confidence)
        .ok()
        .map(|h| h.with_properties(properties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langbase::MockLlmClient;
    use crate::ontology::OntologyType;
    use crate::schema::NodeMatch;

    fn critic_replying(reply: &'static str) -> Critic {
        let mut llm = MockLlmClient::new();
        llm.expect_invoke()
            .times(1)
            .returning(move |_, _| Ok(reply.to_string()));
        Critic::new(Arc::new(llm))
    }

    fn mapping() -> AnalogyMapping {
        AnalogyMapping::new("graph_a", "graph_b", 0.8)
            .unwrap()
            .with_matches(vec![NodeMatch::new("a1", "b1", "same role")])
    }

    #[tokio::test]
    async fn test_parses_verdict() {
        let critic = critic_replying(
            r#"{"is_consistent": true, "issues": ["minor gap"], "confidence": 0.85}"#,
        );
        let hypothesis = critic.process(&mapping()).await.unwrap();

        assert!(hypothesis.is_consistent);
        assert_eq!(hypothesis.issues, vec!["minor gap".to_string()]);
        assert_eq!(hypothesis.confidence(), 0.85);
        assert!(hypothesis.properties.contains_key("critic_raw"));
        assert_eq!(hypothesis.mapping, mapping());
    }

    #[tokio::test]
    async fn test_empty_reply_is_permissive_fallback() {
        let hypothesis = critic_replying("").process(&mapping()).await.unwrap();

        assert!(hypothesis.is_consistent);
        assert_eq!(hypothesis.confidence(), 0.0);
        assert_eq!(hypothesis.issues, vec![CRITIC_FALLBACK_ISSUE.to_string()]);
        assert_eq!(hypothesis.properties.get("fallback"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_malformed_replies_fall_back() {
        for reply in [
            "not json",
            "[true]",
            "{\"confidence\": 0.8, \"issues\": [",
            "{\"confidence\": 3.0}",
            "{\"confidence\": \"sure\"}",
        ] {
            let hypothesis = critic_replying(reply).process(&mapping()).await.unwrap();
            assert_eq!(hypothesis, fallback_hypothesis(mapping()), "reply {:?}", reply);
        }
    }

    #[tokio::test]
    async fn test_single_string_issue_is_one_issue() {
        let critic = critic_replying(
            r#"{"is_consistent": false, "issues": "roles differ, and scale differs", "confidence": "0.4"}"#,
        );
        let hypothesis = critic.process(&mapping()).await.unwrap();
        assert!(!hypothesis.is_consistent);
        assert_eq!(hypothesis.issues.len(), 1);
        assert_eq!(hypothesis.confidence(), 0.4);
    }

    #[tokio::test]
    async fn test_annotated_mismatch_overrides_llm() {
        let critic = critic_replying(r#"{"is_consistent": true, "issues": [], "confidence": 0.95}"#);
        let mapping = AnalogyMapping::new("graph_a", "graph_b", 0.9)
            .unwrap()
            .with_matches(vec![NodeMatch::new("a1", "b2", "")
                .with_ontology(OntologyType::Structure, OntologyType::Function)]);

        let hypothesis = critic.process(&mapping).await.unwrap();
        assert!(!hypothesis.is_consistent);
        assert_eq!(hypothesis.issues.len(), 1);
        assert!(hypothesis.issues[0].contains("[STRUCTURE]"));
        assert!(hypothesis.issues[0].contains("[FUNCTION]"));
        assert_eq!(hypothesis.confidence(), 0.95);
    }
}

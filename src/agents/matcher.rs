use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::AgentCore;
use crate::error::{AppError, AppResult, ToolError};
use crate::extraction::{number_field, str_field, string_or_default};
use crate::langbase::LlmClient;
use crate::ontology::OntologyType;
use crate::prompts::matcher_system_prompt;
use crate::schema::{AnalogyMapping, LogicalPropertyGraph, NodeMatch, ValidatedHypothesis};

/// Explanation carried by the fallback mapping.
pub const MATCHER_FALLBACK_EXPLANATION: &str = "Failed to parse Matcher response.";

const DEFAULT_GRAPH_A_ID: &str = "graph_a";
const DEFAULT_GRAPH_B_ID: &str = "graph_b";

/// Critic verdict fed back into a refinement pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticFeedback {
    /// Whether the Critic accepted the mapping.
    pub is_consistent: bool,
    /// Problems the refined mapping must address.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Critic confidence in the previous mapping.
    #[serde(default)]
    pub confidence: f64,
}

impl From<&ValidatedHypothesis> for CriticFeedback {
    fn from(hypothesis: &ValidatedHypothesis) -> Self {
        Self {
            is_consistent: hypothesis.is_consistent,
            issues: hypothesis.issues.clone(),
            confidence: hypothesis.confidence(),
        }
    }
}

/// What the Matcher can be asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherInput {
    /// First pass over a pair of graphs.
    Pair(LogicalPropertyGraph, LogicalPropertyGraph),
    /// Refinement pass with the previous attempt and the Critic's verdict.
    #[allow(missing_docs)]
    Refinement {
        graph_a: LogicalPropertyGraph,
        graph_b: LogicalPropertyGraph,
        previous_mapping: Option<AnalogyMapping>,
        critic_feedback: Option<CriticFeedback>,
    },
}

impl MatcherInput {
    /// Accept either a two-element array `[graph_a, graph_b]` or an object
    /// with `graph_a`, `graph_b` and optional `previous_mapping` /
    /// `critic_feedback`. Anything else is a usage error.
    pub fn from_value(value: &Value) -> Result<Self, ToolError> {
        match value {
            Value::Array(items) if items.len() == 2 => Ok(Self::Pair(
                parse_graph("graph_a", &items[0])?,
                parse_graph("graph_b", &items[1])?,
            )),
            Value::Object(obj) if obj.contains_key("graph_a") && obj.contains_key("graph_b") => {
                let graph_a = parse_graph("graph_a", &obj["graph_a"])?;
                let graph_b = parse_graph("graph_b", &obj["graph_b"])?;
                let previous_mapping = optional_field(obj, "previous_mapping")?;
                let critic_feedback = optional_field(obj, "critic_feedback")?;

                if previous_mapping.is_none() && critic_feedback.is_none() {
                    Ok(Self::Pair(graph_a, graph_b))
                } else {
                    Ok(Self::Refinement {
                        graph_a,
                        graph_b,
                        previous_mapping,
                        critic_feedback,
                    })
                }
            }
            _ => Err(ToolError::Validation {
                field: "input".to_string(),
                reason: "Matcher expects [graph_a, graph_b] or an object with graph_a and graph_b"
                    .to_string(),
            }),
        }
    }

    /// The two graphs being matched.
    pub fn graphs(&self) -> (&LogicalPropertyGraph, &LogicalPropertyGraph) {
        match self {
            Self::Pair(a, b) => (a, b),
            Self::Refinement {
                graph_a, graph_b, ..
            } => (graph_a, graph_b),
        }
    }

    /// JSON payload sent as the user message body.
    fn payload(&self) -> Value {
        let (graph_a, graph_b) = self.graphs();
        let mut payload = json!({ "graph_a": graph_a, "graph_b": graph_b });
        if let Self::Refinement {
            previous_mapping,
            critic_feedback,
            ..
        } = self
        {
            if let Some(mapping) = previous_mapping {
                payload["previous_mapping"] = json!(mapping);
            }
            if let Some(feedback) = critic_feedback {
                payload["critic_feedback"] = json!(feedback);
            }
        }
        payload
    }
}

fn parse_graph(field: &str, value: &Value) -> Result<LogicalPropertyGraph, ToolError> {
    serde_json::from_value(value.clone()).map_err(|e| ToolError::Validation {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn optional_field<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<T>, ToolError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ToolError::Validation {
                field: field.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Transformation stage: two graphs to an analogy mapping.
#[derive(Clone)]
pub struct Matcher {
    core: AgentCore,
}

impl Matcher {
    /// Create a Matcher calling through `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            core: AgentCore::new("Matcher", llm, matcher_system_prompt()),
        }
    }

    /// Propose node correspondences between the input graphs.
    pub async fn process(&self, input: &MatcherInput) -> AppResult<AnalogyMapping> {
        let refining = matches!(input, MatcherInput::Refinement { .. });
        let payload = serde_json::to_string_pretty(&input.payload())
            .map_err(|e| AppError::Internal {
                message: format!("Failed to serialize Matcher payload: {}", e),
            })?;

        let instruction = if refining {
            "Refine the analogy between these two logic graphs. Fix every issue listed in critic_feedback. Return only the JSON mapping."
        } else {
            "Find the analogy between these two logic graphs. Return only the JSON mapping."
        };
        let message = format!("{}\n\n{}", instruction, payload);

        let completion = self.core.complete(&message).await?;
        let mapping = self.parse_mapping(&completion);

        info!(
            refining,
            matches = mapping.node_matches.len(),
            score = mapping.score(),
            "Matcher produced mapping"
        );
        Ok(mapping)
    }

    fn parse_mapping(&self, completion: &str) -> AnalogyMapping {
        let Ok(obj) = self.core.parse_object(completion) else {
            return fallback_mapping();
        };

        match mapping_from_object(&obj) {
            Some(mapping) => mapping,
            None => {
                warn!(agent = self.core.name(), "Mapping failed validation");
                fallback_mapping()
            }
        }
    }
}

/// Zero-score mapping with no matches, returned when the reply is unusable.
pub fn fallback_mapping() -> AnalogyMapping {
    AnalogyMapping::unscored(DEFAULT_GRAPH_A_ID, DEFAULT_GRAPH_B_ID)
        .with_explanation(MATCHER_FALLBACK_EXPLANATION)
}

fn mapping_from_object(obj: &Map<String, Value>) -> Option<AnalogyMapping> {
    let graph_a_id = str_field(obj, "graph_a_id").unwrap_or(DEFAULT_GRAPH_A_ID);
    let graph_b_id = str_field(obj, "graph_b_id").unwrap_or(DEFAULT_GRAPH_B_ID);
    let score = match obj.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(_) => number_field(obj, "score")?,
    };

    let node_matches = match obj.get("node_matches") {
        Some(Value::Array(items)) => items.iter().filter_map(node_match_from_value).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return None,
    };

    let properties = match obj.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    AnalogyMapping::new(graph_a_id, graph_b_id, score)
        .ok()
        .map(|m| {
            m.with_matches(node_matches)
                .with_edge_mappings(sanitize_edge_mappings(obj.get("edge_mappings")))
                .with_explanation(string_or_default(obj, "explanation"))
                .with_properties(properties)
        })
}

fn node_match_from_value(value: &Value) -> Option<NodeMatch> {
    let obj = value.as_object()?;
    let source_id = str_field(obj, "source_id")?;
    let target_id = str_field(obj, "target_id")?;

    let mut node_match = NodeMatch::new(source_id, target_id, string_or_default(obj, "reasoning"));
    node_match.source_ontology = str_field(obj, "source_ontology").and_then(OntologyType::parse);
    node_match.target_ontology = str_field(obj, "target_ontology").and_then(OntologyType::parse);
    Some(node_match)
}

/// Keep edge mappings only when every element is a two-string array;
/// any malformed element clears the whole list.
fn sanitize_edge_mappings(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(a), Value::String(b)]) => Some((a.clone(), b.clone())),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

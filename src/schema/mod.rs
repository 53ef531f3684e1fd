//! Data contracts flowing between pipeline stages.
//!
//! Scout produces [`LogicalPropertyGraph`]s, Matcher an [`AnalogyMapping`],
//! Critic a [`ValidatedHypothesis`] and Architect a [`ResearchReport`].
//! Values are built fresh by each stage and not edited afterward, except for
//! the report's `properties` and `sources`, which the pipeline fills in
//! before persistence.
//!
//! Score and confidence are validated to lie in `[0, 1]` both by the
//! constructors and during deserialization; an out-of-range value is a
//! construction failure, never silently clamped.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::error::SchemaError;
use crate::ontology::OntologyType;

/// Open key/value bag carried by most contracts.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Single node in a logical property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicGraphNode {
    /// Identifier, unique within its graph.
    pub id: String,
    /// Canonical (PascalCase) label.
    pub label: String,
    /// Ontology classification.
    #[serde(default)]
    pub node_type: OntologyType,
    /// Optional metadata.
    #[serde(default)]
    pub properties: Properties,
}

/// Directed edge between two nodes. Endpoints are not checked against the
/// node list; consumers must resolve ids before dereferencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicGraphEdge {
    /// Id of the source node.
    #[serde(rename = "source", alias = "source_id")]
    pub source_id: String,
    /// Id of the target node.
    #[serde(rename = "target", alias = "target_id")]
    pub target_id: String,
    /// Type of logical relation.
    pub relation: String,
    /// Optional metadata.
    #[serde(default)]
    pub properties: Properties,
}

/// Graph of logical structures extracted from one text.
///
/// The empty graph is the canonical "nothing extracted" value. Node ids are
/// unique; deserialization enforces this through [`LogicalPropertyGraph::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGraph")]
pub struct LogicalPropertyGraph {
    /// Nodes in extraction order.
    pub nodes: Vec<LogicGraphNode>,
    /// Edges in extraction order.
    pub edges: Vec<LogicGraphEdge>,
}

/// Unchecked wire shape of a graph.
#[derive(Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Vec<LogicGraphNode>,
    #[serde(default)]
    edges: Vec<LogicGraphEdge>,
}

impl TryFrom<RawGraph> for LogicalPropertyGraph {
    type Error = SchemaError;

    fn try_from(raw: RawGraph) -> Result<Self, Self::Error> {
        Self::new(raw.nodes, raw.edges)
    }
}

/// One claimed correspondence between a node of graph A and a node of graph B.
///
/// The ontology annotations are advisory; alignment checks read the types
/// from the graphs themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMatch {
    /// Id of the node in graph A.
    pub source_id: String,
    /// Id of the node in graph B.
    pub target_id: String,
    /// Why the two nodes are functionally equivalent.
    #[serde(default)]
    pub reasoning: String,
    /// Ontology type the Matcher claims for the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ontology: Option<OntologyType>,
    /// Ontology type the Matcher claims for the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ontology: Option<OntologyType>,
}

/// Result of matching two graphs (Matcher output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogyMapping {
    /// Identifier for the first graph.
    pub graph_a_id: String,
    /// Identifier for the second graph.
    pub graph_b_id: String,
    /// Node pairs with reasoning, in Matcher order.
    #[serde(default)]
    pub node_matches: Vec<NodeMatch>,
    /// Edge correspondences as `(edge in A, edge in B)` pairs.
    #[serde(default)]
    pub edge_mappings: Vec<(String, String)>,
    #[serde(default, deserialize_with = "unit_interval")]
    score: f64,
    /// Global summary of the analogy.
    #[serde(default)]
    pub explanation: String,
    /// Optional metadata.
    #[serde(default)]
    pub properties: Properties,
}

/// Analogy mapping plus verification verdict (Critic output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedHypothesis {
    /// The mapping under validation.
    pub mapping: AnalogyMapping,
    /// Whether the analogy is logically consistent.
    pub is_consistent: bool,
    /// Detected issues, in discovery order.
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "unit_interval")]
    confidence: f64,
    /// Optional metadata.
    #[serde(default)]
    pub properties: Properties,
}

/// Engineering action plan attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Algorithms or logic to copy from source to target.
    #[serde(default)]
    pub transferable_mechanisms: Vec<String>,
    /// Step-by-step implementation guide.
    #[serde(default)]
    pub technical_roadmap: Vec<String>,
    /// KPIs to measure success.
    #[serde(default)]
    pub key_metrics_to_track: Vec<String>,
    /// Technical risks.
    #[serde(default)]
    pub potential_pitfalls: Vec<String>,
}

/// Synthesis report (Architect output, persisted by the Librarian).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// The hypothesis the report was synthesized from.
    pub hypothesis: ValidatedHypothesis,
    /// Executive summary.
    #[serde(default)]
    pub summary: String,
    /// Key findings.
    #[serde(default)]
    pub findings: Vec<String>,
    /// Research recommendation.
    #[serde(default)]
    pub recommendation: String,
    /// Engineering action plan.
    #[serde(default)]
    pub action_plan: ActionPlan,
    /// Source URLs collected for the query.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Original user query (`source | target`).
    #[serde(default)]
    pub input_query: String,
    /// Auxiliary artifacts: serialized graphs, timestamps, fallback flags.
    #[serde(default)]
    pub properties: Properties,
}

/// Metadata attached to a stored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// When the report was stored.
    pub stored_at: DateTime<Utc>,
    /// Retrieval counter. Persisted but not updated by any read path.
    #[serde(default)]
    pub frequency: u32,
}

fn unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    check_unit_interval("value", value).map_err(serde::de::Error::custom)
}

/// Validate that `value` lies in `[0, 1]`.
pub fn check_unit_interval(field: &'static str, value: f64) -> Result<f64, SchemaError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SchemaError::OutOfRange { field, value })
    }
}

impl LogicGraphNode {
    /// Create a node with the default ontology type
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: OntologyType::default(),
            properties: Properties::new(),
        }
    }

    /// Set the ontology type
    pub fn with_type(mut self, node_type: OntologyType) -> Self {
        self.node_type = node_type;
        self
    }

    /// Replace the metadata bag
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

impl LogicGraphEdge {
    /// Create an edge
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation: relation.into(),
            properties: Properties::new(),
        }
    }
}

impl LogicalPropertyGraph {
    /// Build a graph, rejecting duplicate node ids.
    pub fn new(
        nodes: Vec<LogicGraphNode>,
        edges: Vec<LogicGraphEdge>,
    ) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(SchemaError::DuplicateNodeId {
                    id: node.id.clone(),
                });
            }
        }
        Ok(Self { nodes, edges })
    }

    /// The canonical empty graph.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the graph has neither nodes nor edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&LogicGraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl NodeMatch {
    /// Create a match without ontology annotations
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            reasoning: reasoning.into(),
            source_ontology: None,
            target_ontology: None,
        }
    }

    /// Attach the Matcher's ontology annotations
    pub fn with_ontology(mut self, source: OntologyType, target: OntologyType) -> Self {
        self.source_ontology = Some(source);
        self.target_ontology = Some(target);
        self
    }
}

impl AnalogyMapping {
    /// Create an empty mapping; fails if `score` is outside `[0, 1]`.
    pub fn new(
        graph_a_id: impl Into<String>,
        graph_b_id: impl Into<String>,
        score: f64,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            graph_a_id: graph_a_id.into(),
            graph_b_id: graph_b_id.into(),
            node_matches: Vec::new(),
            edge_mappings: Vec::new(),
            score: check_unit_interval("score", score)?,
            explanation: String::new(),
            properties: Properties::new(),
        })
    }

    /// Empty mapping with a zero score. Infallible.
    pub fn unscored(graph_a_id: impl Into<String>, graph_b_id: impl Into<String>) -> Self {
        Self {
            graph_a_id: graph_a_id.into(),
            graph_b_id: graph_b_id.into(),
            node_matches: Vec::new(),
            edge_mappings: Vec::new(),
            score: 0.0,
            explanation: String::new(),
            properties: Properties::new(),
        }
    }

    /// Similarity score in `[0, 1]`.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Replace the node matches
    pub fn with_matches(mut self, node_matches: Vec<NodeMatch>) -> Self {
        self.node_matches = node_matches;
        self
    }

    /// Replace the edge mappings
    pub fn with_edge_mappings(mut self, edge_mappings: Vec<(String, String)>) -> Self {
        self.edge_mappings = edge_mappings;
        self
    }

    /// Set the global explanation
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Replace the metadata bag
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

impl ValidatedHypothesis {
    /// Create a hypothesis; fails if `confidence` is outside `[0, 1]`.
    pub fn new(
        mapping: AnalogyMapping,
        is_consistent: bool,
        issues: Vec<String>,
        confidence: f64,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            mapping,
            is_consistent,
            issues,
            confidence: check_unit_interval("confidence", confidence)?,
            properties: Properties::new(),
        })
    }

    /// Inconsistent hypothesis with zero confidence, used when the ontology
    /// gate rejects a mapping without consulting the Critic.
    pub fn rejected(mapping: AnalogyMapping, issues: Vec<String>) -> Self {
        Self::unscored(mapping, false, issues)
    }

    /// Hypothesis with zero confidence. Infallible.
    pub fn unscored(mapping: AnalogyMapping, is_consistent: bool, issues: Vec<String>) -> Self {
        Self {
            mapping,
            is_consistent,
            issues,
            confidence: 0.0,
            properties: Properties::new(),
        }
    }

    /// Validation confidence in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Replace the metadata bag
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Append categorical issues. Any issue forces `is_consistent` to false;
    /// an empty list leaves the hypothesis untouched.
    pub fn with_alignment_issues(mut self, issues: Vec<String>) -> Self {
        if !issues.is_empty() {
            self.is_consistent = false;
            self.issues.extend(issues);
        }
        self
    }

    /// Whether this verdict warrants another Matcher pass.
    pub fn needs_refinement(&self, threshold: f64) -> bool {
        !self.is_consistent || self.confidence < threshold
    }
}

impl ActionPlan {
    /// True when every section is empty.
    pub fn is_empty(&self) -> bool {
        self.transferable_mechanisms.is_empty()
            && self.technical_roadmap.is_empty()
            && self.key_metrics_to_track.is_empty()
            && self.potential_pitfalls.is_empty()
    }
}

impl ResearchReport {
    /// Create an otherwise empty report for a hypothesis
    pub fn new(hypothesis: ValidatedHypothesis) -> Self {
        Self {
            hypothesis,
            summary: String::new(),
            findings: Vec::new(),
            recommendation: String::new(),
            action_plan: ActionPlan::default(),
            sources: Vec::new(),
            input_query: String::new(),
            properties: Properties::new(),
        }
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the findings
    pub fn with_findings(mut self, findings: Vec<String>) -> Self {
        self.findings = findings;
        self
    }

    /// Set the recommendation
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    /// Set the action plan
    pub fn with_action_plan(mut self, action_plan: ActionPlan) -> Self {
        self.action_plan = action_plan;
        self
    }

    /// Replace the metadata bag
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Whether the Architect produced this report from its fallback path.
    pub fn is_fallback(&self) -> bool {
        self.properties
            .get("fallback")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Recover a graph previously attached under `key` (`graph_a`/`graph_b`).
    pub fn attached_graph(&self, key: &str) -> Option<LogicalPropertyGraph> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl MemoryMetadata {
    /// Metadata for a report stored at `stored_at`
    pub fn new(stored_at: DateTime<Utc>) -> Self {
        Self {
            stored_at,
            frequency: 0,
        }
    }
}

//! Triple-Layer Ontology: the categorical taxonomy every extracted node carries.
//!
//! Cross-domain correspondences are only valid between identically labeled
//! nodes (STRUCTURE with STRUCTURE, FUNCTION with FUNCTION, ATTRIBUTE with
//! ATTRIBUTE). [`check_alignment`] is the deterministic enforcement of that
//! rule and is authoritative over anything an LLM judge reports.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schema::{AnalogyMapping, LogicGraphNode, LogicalPropertyGraph};

/// Ontological classification of a graph node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OntologyType {
    /// Physical components or entities (the "what").
    #[default]
    Structure,
    /// Actions, processes or logic (the "how").
    Function,
    /// Performance metrics or abstract qualities (the "cost/value").
    Attribute,
}

impl OntologyType {
    /// All valid labels, in prompt order.
    pub const ALL: [OntologyType; 3] = [
        OntologyType::Structure,
        OntologyType::Function,
        OntologyType::Attribute,
    ];

    /// Get the label as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyType::Structure => "STRUCTURE",
            OntologyType::Function => "FUNCTION",
            OntologyType::Attribute => "ATTRIBUTE",
        }
    }

    /// Strict parse of a label. Surrounding whitespace and brackets
    /// (`[FUNCTION]`) and letter case are ignored.
    pub fn parse(candidate: &str) -> Option<Self> {
        let cleaned = candidate
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(cleaned))
    }
}

impl std::fmt::Display for OntologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map any candidate label onto the taxonomy.
///
/// Valid labels map to themselves; anything else becomes
/// [`OntologyType::Structure`]. Never fails.
pub fn normalize_type(candidate: &str) -> OntologyType {
    OntologyType::parse(candidate).unwrap_or_default()
}

/// Outcome of an alignment check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentReport {
    /// True iff `issues` is empty.
    pub ok: bool,
    /// One entry per categorical mismatch, in match order.
    pub issues: Vec<String>,
}

/// Verify that every node match links nodes of the same ontology type.
///
/// Types are taken from the graphs, never from the advisory annotations on
/// the match. Matches whose source or target id does not resolve are
/// skipped without an issue. All matches are checked; there is no early
/// exit.
pub fn check_alignment(
    mapping: &AnalogyMapping,
    graph_a: &LogicalPropertyGraph,
    graph_b: &LogicalPropertyGraph,
) -> AlignmentReport {
    let nodes_a = index_nodes(graph_a);
    let nodes_b = index_nodes(graph_b);

    let issues: Vec<String> = mapping
        .node_matches
        .iter()
        .filter_map(|m| {
            let node_a = nodes_a.get(m.source_id.as_str())?;
            let node_b = nodes_b.get(m.target_id.as_str())?;
            (node_a.node_type != node_b.node_type).then(|| {
                mismatch_issue(node_a.node_type, node_b.node_type, &m.source_id, &m.target_id)
            })
        })
        .collect();

    AlignmentReport {
        ok: issues.is_empty(),
        issues,
    }
}

/// Format the issue text for a categorical mismatch.
pub fn mismatch_issue(
    source: OntologyType,
    target: OntologyType,
    source_id: &str,
    target_id: &str,
) -> String {
    format!(
        "Categorical mismatch: [{}] (source) mapped to [{}] (target) for source_id={}, target_id={}.",
        source, target, source_id, target_id
    )
}

fn index_nodes(graph: &LogicalPropertyGraph) -> HashMap<&str, &LogicGraphNode> {
    // First occurrence wins, matching extraction order.
    let mut index = HashMap::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        index.entry(node.id.as_str()).or_insert(node);
    }
    index
}

// ============================================================================
// Prompt blocks
// ============================================================================

/// Taxonomy definition injected into agent prompts.
pub const ONTOLOGY_TAXONOMY: &str = r#"Every node extracted from any domain MUST be tagged with exactly one of these three labels:

- [STRUCTURE]: Physical components or entities (The "What"). Examples: Hardware, Cells, Servers, Neurons, Cables, Sensors, Databases.

- [FUNCTION]: Actions, processes, or logic (The "How"). Examples: Signal transmission, Learning, Data routing, Encoding, Decoding, Consensus, Replication.

- [ATTRIBUTE]: Performance metrics or abstract qualities (The "Cost/Value"). Examples: Latency, Energy, Scalability, Throughput, Reliability, Accuracy."#;

/// Alignment rules injected into agent prompts.
pub const ALIGNMENT_RULES: &str = r#"Strict alignment rules for cross-domain mapping. Alignments are ONLY valid between identical labels:

- ALLOWED: [STRUCTURE] <-> [STRUCTURE]
- ALLOWED: [FUNCTION] <-> [FUNCTION]
- ALLOWED: [ATTRIBUTE] <-> [ATTRIBUTE]

- FORBIDDEN: [STRUCTURE] <-> [FUNCTION]   (e.g. do not map an Axon to a Multiplication)
- FORBIDDEN: [STRUCTURE] <-> [ATTRIBUTE]  (e.g. do not map a component to Energy consumption)
- FORBIDDEN: [FUNCTION] <-> [ATTRIBUTE]   (e.g. do not map a process to a metric)

Any mapping that violates these rules is a categorical mismatch and must be rejected."#;

/// Align-by-role principle injected into agent prompts.
pub const POLYMORPHISM_RULE: &str = r#"Polymorphism principle: Mappings are defined by ontological ROLE (STRUCTURE / FUNCTION / ATTRIBUTE), not by name or domain. The same "interface" (e.g. STRUCTURE) can have many "implementations" across domains (e.g. Neuron, Cable, Server). When matching nodes, align by type (same ontological label), not by lexical similarity."#;

/// Signal/state integrity guidance for the Architect.
pub const SIGNAL_STATE_AND_DECOUPLING: &str = r#"Signal & state integrity: When the analogy involves mapping discrete events (e.g. spikes, packets, tokens) to continuous states (e.g. conductance, voltage, rate), identify or propose an Interface Adapter (encoding/decoding logic) and mention it in the action plan.

Decoupling: The core analogy (business rules, transferable mechanisms) must remain independent of implementation details (specific hardware, I/O, or platform). Describe patterns so they can be applied regardless of the concrete technology."#;

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AgentCore;
use crate::error::AppResult;
use crate::extraction::{object_or_default, str_field};
use crate::langbase::LlmClient;
use crate::ontology::normalize_type;
use crate::prompts::scout_system_prompt;
use crate::schema::{LogicGraphEdge, LogicGraphNode, LogicalPropertyGraph};

/// Abstraction stage: free text to a typed logic graph.
#[derive(Clone)]
pub struct Scout {
    core: AgentCore,
}

impl Scout {
    /// Create a Scout calling through `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            core: AgentCore::new("Scout", llm, scout_system_prompt()),
        }
    }

    /// Extract a graph from `text`.
    ///
    /// Blank input returns the empty graph without calling the model. Any
    /// unparseable reply also yields the empty graph.
    pub async fn process(&self, text: &str) -> AppResult<LogicalPropertyGraph> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Scout input empty, returning empty graph");
            return Ok(LogicalPropertyGraph::empty());
        }

        let message = format!(
            "Extract the logical structure from the following text as a logic graph. Return only the JSON.\n\nText: {}",
            text
        );
        let completion = self.core.complete(&message).await?;
        let graph = self.parse_graph(&completion);

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Scout extracted graph"
        );
        Ok(graph)
    }

    fn parse_graph(&self, completion: &str) -> LogicalPropertyGraph {
        let Ok(obj) = self.core.parse_object(completion) else {
            return LogicalPropertyGraph::empty();
        };

        if !obj.contains_key("nodes") && !obj.contains_key("edges") {
            warn!(agent = self.core.name(), "Reply has neither nodes nor edges");
            return LogicalPropertyGraph::empty();
        }

        match graph_from_object(&obj) {
            Some(graph) => graph,
            None => {
                warn!(agent = self.core.name(), "Graph failed validation");
                LogicalPropertyGraph::empty()
            }
        }
    }
}

/// Build a graph from the reply object; `None` if any node or edge is malformed.
fn graph_from_object(obj: &Map<String, Value>) -> Option<LogicalPropertyGraph> {
    let raw_nodes = array_or_empty(obj.get("nodes"))?;
    let raw_edges = array_or_empty(obj.get("edges"))?;

    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for raw in raw_nodes {
        let node = node_from_value(raw)?;
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        } else {
            warn!(node_id = %node.id, "Dropping duplicate node id");
        }
    }

    let edges = raw_edges
        .iter()
        .map(edge_from_value)
        .collect::<Option<Vec<_>>>()?;

    LogicalPropertyGraph::new(nodes, edges).ok()
}

fn array_or_empty(value: Option<&Value>) -> Option<&[Value]> {
    match value {
        None | Some(Value::Null) => Some(&[]),
        Some(Value::Array(items)) => Some(items.as_slice()),
        Some(_) => None,
    }
}

fn node_from_value(value: &Value) -> Option<LogicGraphNode> {
    let obj = value.as_object()?;
    let id = str_field(obj, "id")?;
    let label = str_field(obj, "label")?;
    let node_type = str_field(obj, "node_type")
        .or_else(|| str_field(obj, "ontology_type"))
        .map(normalize_type)
        .unwrap_or_default();

    Some(
        LogicGraphNode::new(id, to_pascal_case(label))
            .with_type(node_type)
            .with_properties(object_or_default(obj, "properties")),
    )
}

fn edge_from_value(value: &Value) -> Option<LogicGraphEdge> {
    let obj = value.as_object()?;
    let source = str_field(obj, "source").or_else(|| str_field(obj, "source_id"))?;
    let target = str_field(obj, "target").or_else(|| str_field(obj, "target_id"))?;
    let relation = str_field(obj, "relation")?;

    let mut edge = LogicGraphEdge::new(source, target, relation);
    edge.properties = object_or_default(obj, "properties");
    Some(edge)
}

/// Canonical label casing: capitalize the first letter of each word split on
/// whitespace or `_`, keep the rest as written, and concatenate.
///
/// ```
/// use analogy_engine::agents::to_pascal_case;
///
/// assert_eq!(to_pascal_case("information sharing"), "InformationSharing");
/// assert_eq!(to_pascal_case("PascalCase"), "PascalCase");
/// ```
pub fn to_pascal_case(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langbase::MockLlmClient;
    use crate::ontology::OntologyType;

    fn scout_replying(reply: &'static str) -> Scout {
        let mut llm = MockLlmClient::new();
        llm.expect_invoke()
            .times(1)
            .returning(move |_, _| Ok(reply.to_string()));
        Scout::new(Arc::new(llm))
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("information sharing"), "InformationSharing");
        assert_eq!(to_pascal_case("information_sharing"), "InformationSharing");
        assert_eq!(to_pascal_case("  information \t sharing__"), "InformationSharing");
        assert_eq!(to_pascal_case("water"), "Water");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn test_pascal_case_idempotent() {
        for label in ["PascalCase", "information sharing", "TCP congestion_control"] {
            let once = to_pascal_case(label);
            assert_eq!(to_pascal_case(&once), once);
        }
    }

    #[tokio::test]
    async fn test_blank_input_skips_llm() {
        // No expectations: any call would panic.
        let scout = Scout::new(Arc::new(MockLlmClient::new()));
        let graph = scout.process("   \n ").await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn test_normalizes_labels_and_types() {
        let scout = scout_replying(
            r#"{"nodes": [{"id": "n1", "label": "information sharing"},
                          {"id": "n2", "label": "latency", "node_type": "attribute"},
                          {"id": "n3", "label": "route", "node_type": "PROCESS"}],
                "edges": [{"source": "n1", "target": "n2", "relation": "affects"}]}"#,
        );
        let graph = scout.process("Bees share information").await.unwrap();

        assert_eq!(graph.nodes[0].label, "InformationSharing");
        assert_eq!(graph.nodes[0].node_type, OntologyType::Structure);
        assert_eq!(graph.nodes[1].node_type, OntologyType::Attribute);
        assert_eq!(graph.nodes[2].node_type, OntologyType::Structure);
        assert_eq!(graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_fenced_reply_with_preamble() {
        let scout = scout_replying(
            "Here is the graph:\n```json\n{\"nodes\": [{\"id\": \"a\", \"label\": \"Hive\", \"node_type\": \"STRUCTURE\"}], \"edges\": []}\n```",
        );
        let graph = scout.process("text").await.unwrap();
        assert_eq!(graph.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let scout = scout_replying(
            r#"{"nodes": [{"id": "a", "label": "First"}, {"id": "a", "label": "Second"}]}"#,
        );
        let graph = scout.process("text").await.unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].label, "First");
    }

    #[tokio::test]
    async fn test_malformed_replies_yield_empty_graph() {
        for reply in [
            "",
            "I cannot help with that.",
            "[1, 2, 3]",
            "{\"nodes\": [",
            "{\"summary\": \"no graph keys\"}",
            "{\"nodes\": [{\"label\": \"missing id\"}]}",
            "{\"nodes\": \"not a list\"}",
            "{\"edges\": [{\"source\": \"a\"}]}",
        ] {
            let graph = scout_replying(reply).process("text").await.unwrap();
            assert!(graph.is_empty(), "expected empty graph for {:?}", reply);
        }
    }
}

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::AgentCore;
use crate::error::{AppError, AppResult};
use crate::extraction::{string_list, string_or_default, ExtractError};
use crate::langbase::LlmClient;
use crate::prompts::architect_system_prompt;
use crate::schema::{ActionPlan, Properties, ResearchReport, ValidatedHypothesis};

const DEFAULT_SUMMARY: &str = "Summary generation failed.";
const DEFAULT_RECOMMENDATION: &str = "No recommendation provided.";
const DEFAULT_FINDING: &str = "No structured findings extracted.";

/// Recommendation carried by the fallback report.
pub const ARCHITECT_FALLBACK_RECOMMENDATION: &str = "Manual review required.";

/// Synthesis stage: validated hypothesis to a research report.
#[derive(Clone)]
pub struct Architect {
    core: AgentCore,
}

impl Architect {
    /// Create an Architect calling through `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            core: AgentCore::new("Architect", llm, architect_system_prompt()),
        }
    }

    /// Write the report for `hypothesis`. Missing fields are defaulted one
    /// by one; an unusable reply produces a report flagged as fallback.
    pub async fn process(&self, hypothesis: &ValidatedHypothesis) -> AppResult<ResearchReport> {
        let context = json!({
            "mapping": hypothesis.mapping,
            "critic_confidence": hypothesis.confidence(),
            "critic_issues": hypothesis.issues,
            "is_consistent": hypothesis.is_consistent,
        });
        let context_json =
            serde_json::to_string_pretty(&context).map_err(|e| AppError::Internal {
                message: format!("Failed to serialize hypothesis: {}", e),
            })?;
        let message = format!(
            "Synthesize the following validated hypothesis into an engineering report with summary, findings, recommendation and a complete action_plan. Return only the JSON object.\n\n{}",
            context_json
        );

        let completion = self.core.complete(&message).await?;
        let report = match self.core.parse_object(&completion) {
            Ok(obj) => report_from_object(obj, hypothesis),
            Err(e) => fallback_report(hypothesis.clone(), &fallback_reason(&e)),
        };

        info!(
            fallback = report.is_fallback(),
            findings = report.findings.len(),
            "Architect produced report"
        );
        Ok(report)
    }
}

fn fallback_reason(error: &ExtractError) -> String {
    match error {
        ExtractError::Empty => "No response from LLM.".to_string(),
        ExtractError::NoJsonObject => "No JSON object found.".to_string(),
        ExtractError::NotAnObject => "Response is not a JSON object.".to_string(),
        ExtractError::Json(e) => format!("JSON decode error: {}", e),
    }
}

/// Report returned when synthesis fails; `reason` is echoed in the summary
/// and in `properties.error`.
pub fn fallback_report(hypothesis: ValidatedHypothesis, reason: &str) -> ResearchReport {
    let mut properties = Properties::new();
    properties.insert("fallback".to_string(), json!(true));
    properties.insert("fallback_triggered".to_string(), json!(true));
    properties.insert("error".to_string(), json!(reason));

    ResearchReport::new(hypothesis)
        .with_summary(format!("Automated synthesis failed. ({})", reason))
        .with_findings(vec![
            "The system could not parse the Architect's response.".to_string(),
            "Please review the raw logs or the Critic's evaluation directly.".to_string(),
        ])
        .with_recommendation(ARCHITECT_FALLBACK_RECOMMENDATION)
        .with_properties(properties)
}

fn report_from_object(obj: Map<String, Value>, hypothesis: &ValidatedHypothesis) -> ResearchReport {
    let summary = non_empty_or(string_or_default(&obj, "summary"), DEFAULT_SUMMARY);
    let recommendation = non_empty_or(
        string_or_default(&obj, "recommendation"),
        DEFAULT_RECOMMENDATION,
    );

    let mut findings = obj.get("findings").and_then(string_list).unwrap_or_default();
    if findings.is_empty() {
        findings.push(DEFAULT_FINDING.to_string());
    }

    let action_plan = match obj.get("action_plan") {
        Some(Value::Object(plan)) => action_plan_from_object(plan).unwrap_or_else(|| {
            warn!("Action plan failed validation, using empty plan");
            ActionPlan::default()
        }),
        _ => ActionPlan::default(),
    };

    let mut properties = Properties::new();
    properties.insert("architect_raw".to_string(), Value::Object(obj));

    ResearchReport::new(hypothesis.clone())
        .with_summary(summary)
        .with_findings(findings)
        .with_recommendation(recommendation)
        .with_action_plan(action_plan)
        .with_properties(properties)
}

/// All four sections must be lists (or prose); one bad section voids the plan.
fn action_plan_from_object(plan: &Map<String, Value>) -> Option<ActionPlan> {
    let section = |key: &str| match plan.get(key) {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(value) => string_list(value),
    };

    Some(ActionPlan {
        transferable_mechanisms: section("transferable_mechanisms")?,
        technical_roadmap: section("technical_roadmap")?,
        key_metrics_to_track: section("key_metrics_to_track")?,
        potential_pitfalls: section("potential_pitfalls")?,
    })
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

//! Markdown rendering of a finished report.

use chrono::{DateTime, Utc};

use crate::schema::ResearchReport;

const NOT_AVAILABLE: &str = "N/A";

/// Render `report` as a Markdown document.
///
/// Empty sections render as `N/A`. Sources are listed only when
/// `include_sources` is set and the report has any.
pub fn to_markdown(
    report: &ResearchReport,
    include_sources: bool,
    generated_at: DateTime<Utc>,
) -> String {
    let mut lines: Vec<String> = vec![
        "# Analogy Engine - Research Report".to_string(),
        String::new(),
        "## Summary".to_string(),
        text_or_na(&report.summary),
        String::new(),
        "## Findings".to_string(),
        String::new(),
    ];
    push_bullets(&mut lines, &report.findings);

    lines.extend([
        String::new(),
        "## Recommendation".to_string(),
        text_or_na(&report.recommendation),
        String::new(),
        "## Engineering Action Plan".to_string(),
        String::new(),
    ]);

    let plan = &report.action_plan;
    push_section(&mut lines, "Transferable Mechanisms");
    push_bullets(&mut lines, &plan.transferable_mechanisms);

    push_section(&mut lines, "Technical Roadmap");
    if plan.technical_roadmap.is_empty() {
        lines.push(NOT_AVAILABLE.to_string());
    } else {
        lines.extend(
            plan.technical_roadmap
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step)),
        );
    }

    push_section(&mut lines, "Key Metrics to Track");
    push_bullets(&mut lines, &plan.key_metrics_to_track);

    push_section(&mut lines, "Potential Pitfalls");
    push_bullets(&mut lines, &plan.potential_pitfalls);

    if include_sources && !report.sources.is_empty() {
        lines.extend([String::new(), "## Sources".to_string(), String::new()]);
        lines.extend(report.sources.iter().map(|url| format!("- [{0}]({0})", url)));
    }

    lines.extend([
        String::new(),
        format!("*Generated on {}*", generated_at.format("%Y-%m-%d %H:%M UTC")),
    ]);
    lines.join("\n")
}

/// Default export file name for a timestamp.
pub fn export_filename(generated_at: DateTime<Utc>) -> String {
    format!(
        "analogy_report_{}.md",
        generated_at.format("%Y-%m-%d_%H%M%S")
    )
}

fn text_or_na(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn push_section(lines: &mut Vec<String>, title: &str) {
    if lines.last().is_some_and(|l| !l.is_empty()) {
        lines.push(String::new());
    }
    lines.push(format!("### {}", title));
    lines.push(String::new());
}

fn push_bullets(lines: &mut Vec<String>, items: &[String]) {
    if items.is_empty() {
        lines.push(NOT_AVAILABLE.to_string());
    } else {
        lines.extend(items.iter().map(|item| format!("- {}", item)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActionPlan, AnalogyMapping, ValidatedHypothesis};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 13, 7, 9).unwrap()
    }

    fn report() -> ResearchReport {
        let mapping = AnalogyMapping::new("graph_a", "graph_b", 0.8).unwrap();
        let hypothesis = ValidatedHypothesis::new(mapping, true, vec![], 0.9).unwrap();
        let mut report = ResearchReport::new(hypothesis)
            .with_summary("Ant foraging mirrors packet routing")
            .with_findings(vec!["Pheromone is a routing weight".to_string()])
            .with_recommendation("Pursue")
            .with_action_plan(ActionPlan {
                technical_roadmap: vec!["Model".to_string(), "Simulate".to_string()],
                ..ActionPlan::default()
            });
        report.sources = vec!["https://arxiv.org/abs/1".to_string()];
        report
    }

    #[test]
    fn test_sections_rendered() {
        let md = to_markdown(&report(), false, at());
        assert!(md.starts_with("# Analogy Engine - Research Report"));
        assert!(md.contains("## Summary\nAnt foraging mirrors packet routing"));
        assert!(md.contains("- Pheromone is a routing weight"));
        assert!(md.contains("1. Model\n2. Simulate"));
        assert!(md.contains("### Transferable Mechanisms\n\nN/A"));
        assert!(md.ends_with("*Generated on 2026-05-04 13:07 UTC*"));
        assert!(!md.contains("## Sources"));
    }

    #[test]
    fn test_sources_included_on_request() {
        let md = to_markdown(&report(), true, at());
        assert!(md.contains("## Sources\n\n- [https://arxiv.org/abs/1](https://arxiv.org/abs/1)"));
    }

    #[test]
    fn test_empty_report_is_all_na() {
        let mapping = AnalogyMapping::new("a", "b", 0.0).unwrap();
        let hypothesis = ValidatedHypothesis::new(mapping, false, vec![], 0.0).unwrap();
        let md = to_markdown(&ResearchReport::new(hypothesis), true, at());
        assert!(md.contains("## Summary\nN/A"));
        assert!(md.contains("## Recommendation\nN/A"));
        assert_eq!(md.matches("N/A").count(), 7);
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename(at()), "analogy_report_2026-05-04_130709.md");
    }
}

//! Report formatting for analysis results, verdicts and model listings.

use std::fmt::Write;

use serde::Serialize;

use crate::domain::{AnalysisResult, ModelDescriptor, QualityVerdict};

const LISTED_FUNCTIONS: usize = 5;

/// Render any serializable payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Render an analysis result as a terminal report.
pub fn render_analysis_text(result: &AnalysisResult) -> String {
    let mut output = String::new();
    if let Some(path) = &result.file_path {
        let _ = writeln!(output, "File: {path}");
    }
    let metrics = &result.metrics;
    let _ = writeln!(output, "Language: {}", result.facts.language);
    let _ = writeln!(output, "Complexity: {}", result.facts.complexity);
    let _ = writeln!(output, "Lines: {}", metrics.line_count);
    let _ = writeln!(
        output,
        "Comments: {} ({:.1}%)",
        metrics.comment_count,
        metrics.comment_ratio * 100.0
    );
    let _ = writeln!(output, "Nesting depth: {}", metrics.nesting_depth);
    let _ = writeln!(output, "Cyclomatic complexity: {}", metrics.cyclomatic_complexity);
    let _ = writeln!(output, "Quality score: {}/100", result.quality_score);

    let functions = &result.facts.functions;
    if !functions.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Functions ({}):", functions.len());
        for name in functions.iter().take(LISTED_FUNCTIONS) {
            let _ = writeln!(output, "  - {name}");
        }
        if functions.len() > LISTED_FUNCTIONS {
            let _ = writeln!(output, "  ... +{} more", functions.len() - LISTED_FUNCTIONS);
        }
    }
    append_text_list(&mut output, "Potential issues", &metrics.potential_issues);
    append_text_list(&mut output, "Suggestions", &metrics.suggestions);
    if let Some(analysis) = &result.ai_analysis {
        let _ = writeln!(output);
        let _ = writeln!(output, "AI analysis:");
        let _ = writeln!(output, "{}", analysis.trim_end());
    }
    output
}

/// Render an analysis result as Markdown.
pub fn render_analysis_markdown(result: &AnalysisResult) -> String {
    let mut output = String::new();
    let title = result.file_name.as_deref().unwrap_or("snippet");
    let _ = writeln!(output, "# Code Analysis: {title}\n");
    if let Some(path) = &result.file_path {
        let _ = writeln!(output, "- Path: `{path}`");
    }
    let metrics = &result.metrics;
    let _ = writeln!(output, "- Language: {}", result.facts.language);
    let _ = writeln!(output, "- Quality score: **{}**/100", result.quality_score);
    let _ = writeln!(output);
    let _ = writeln!(output, "### Metrics");
    let _ = writeln!(output, "| Metric | Value |");
    let _ = writeln!(output, "| --- | --- |");
    let _ = writeln!(output, "| Complexity | {} |", result.facts.complexity);
    let _ = writeln!(output, "| Lines | {} |", metrics.line_count);
    let _ = writeln!(output, "| Comments | {} |", metrics.comment_count);
    let _ = writeln!(output, "| Comment ratio | {:.2} |", metrics.comment_ratio);
    let _ = writeln!(output, "| Nesting depth | {} |", metrics.nesting_depth);
    let _ = writeln!(
        output,
        "| Cyclomatic complexity | {} |",
        metrics.cyclomatic_complexity
    );
    let _ = writeln!(output);

    append_list(&mut output, "Imports", &result.facts.imports, "No imports found.");
    append_list(&mut output, "Functions", &result.facts.functions, "No functions found.");
    append_list(&mut output, "Classes", &result.facts.classes, "No classes found.");
    append_list(
        &mut output,
        "Potential issues",
        &metrics.potential_issues,
        "No issues found.",
    );
    append_list(&mut output, "Suggestions", &metrics.suggestions, "No suggestions.");
    if let Some(analysis) = &result.ai_analysis {
        let _ = writeln!(output, "### AI analysis\n{}\n", analysis.trim_end());
    }
    output
}

/// Render a gate verdict for the terminal.
pub fn render_verdict_text(verdict: &QualityVerdict) -> String {
    let mut output = String::new();
    let status = if verdict.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(
        output,
        "Quality gate {status}: score {} (threshold {})",
        verdict.score, verdict.threshold
    );
    append_text_list(&mut output, "Issues", &verdict.issues);
    append_text_list(&mut output, "Suggestions", &verdict.suggestions);
    output
}

/// Render installed models, one per line.
pub fn render_models_text(models: &[ModelDescriptor]) -> String {
    if models.is_empty() {
        return "No models available.\n".to_string();
    }
    let mut output = String::new();
    let _ = writeln!(output, "Available models:");
    for model in models {
        let size = model
            .size
            .map(format_size)
            .unwrap_or_else(|| "unknown size".to_string());
        let _ = writeln!(output, "  - {} ({size})", model.name);
    }
    output
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn append_text_list(output: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "{title}:");
    for item in items {
        let _ = writeln!(output, "  - {item}");
    }
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}

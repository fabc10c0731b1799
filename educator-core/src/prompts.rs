//! Prompt construction for analysis and assistant requests.

use std::fmt::Write;

/// Maximum number of code characters embedded in an analysis prompt.
pub const ANALYSIS_CHAR_CAP: usize = 4000;

fn reply_line(output: &mut String, reply_language: Option<&str>) {
    if let Some(language) = reply_language.filter(|language| !language.trim().is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "Answer in {}.", language.trim());
    }
}

fn fenced(output: &mut String, language: &str, code: &str) {
    let _ = writeln!(output, "```{language}");
    let _ = writeln!(output, "{}", code.trim_end_matches('\n'));
    let _ = writeln!(output, "```");
}

fn numbered(output: &mut String, heading: &str, items: &[&str]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "{heading}");
    for (index, item) in items.iter().enumerate() {
        let _ = writeln!(output, "{}. {item}", index + 1);
    }
}

fn language_prefix(language: Option<&str>) -> String {
    language
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .map(|language| format!("{language} "))
        .unwrap_or_default()
}

/// Prompt asking the model to review `code`, truncated to [`ANALYSIS_CHAR_CAP`].
pub fn analysis_prompt(code: &str, language: &str, reply_language: Option<&str>) -> String {
    let total = code.chars().count();
    let sample: String = code.chars().take(ANALYSIS_CHAR_CAP).collect();

    let mut output = String::new();
    let _ = writeln!(
        output,
        "Analyze the following {language} code and suggest improvements:"
    );
    let _ = writeln!(output);
    fenced(&mut output, language, &sample);
    numbered(
        &mut output,
        "Cover the following aspects:",
        &[
            "Code quality and readability",
            "Performance optimization opportunities",
            "Security issues",
            "Adherence to best practices",
            "Concrete improvement suggestions",
        ],
    );
    if total > ANALYSIS_CHAR_CAP {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Note: the code was truncated; {} more characters were omitted.",
            total - ANALYSIS_CHAR_CAP
        );
    }
    reply_line(&mut output, reply_language);
    output
}

/// Plain question, optionally grounded in `context`.
pub fn ask_prompt(question: &str, context: Option<&str>, reply_language: Option<&str>) -> String {
    let mut output = String::new();
    match context.filter(|context| !context.trim().is_empty()) {
        Some(context) => {
            let _ = writeln!(output, "Context:");
            let _ = writeln!(output, "{context}");
            let _ = writeln!(output);
            let _ = writeln!(output, "Question: {question}");
            let _ = writeln!(output);
            let _ = writeln!(output, "Use the context above when answering.");
        }
        None => {
            let _ = writeln!(output, "{question}");
        }
    }
    reply_line(&mut output, reply_language);
    output
}

/// Programming question with an optional language specialty.
pub fn coding_help_prompt(
    question: &str,
    language: Option<&str>,
    reply_language: Option<&str>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "You are a {}programming expert. Give a detailed, practical answer to this question:",
        language_prefix(language)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "{question}");
    numbered(
        &mut output,
        "Include:",
        &[
            "A clear explanation",
            "Code examples where possible",
            "Best practices",
            "Caveats and tips",
        ],
    );
    reply_line(&mut output, reply_language);
    output
}

/// Walkthrough of what `code` does.
pub fn explain_prompt(code: &str, language: Option<&str>, reply_language: Option<&str>) -> String {
    let fence = language.map(str::trim).unwrap_or_default();
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Explain the following {}code in detail:",
        language_prefix(language)
    );
    let _ = writeln!(output);
    fenced(&mut output, fence, code);
    numbered(
        &mut output,
        "Cover:",
        &[
            "Overall purpose and behaviour",
            "Main logic and algorithms",
            "The role of each part",
            "Techniques or patterns used",
            "Possible improvements",
        ],
    );
    reply_line(&mut output, reply_language);
    output
}

/// Debugging request; a review request when no error message is known.
pub fn debug_prompt(
    code: &str,
    error_message: Option<&str>,
    language: Option<&str>,
    reply_language: Option<&str>,
) -> String {
    let fence = language.map(str::trim).unwrap_or_default();
    let prefix = language_prefix(language);
    let mut output = String::new();
    match error_message.filter(|message| !message.trim().is_empty()) {
        Some(message) => {
            let _ = writeln!(
                output,
                "The following {prefix}code fails with an error. Find the problem and explain how to fix it."
            );
            let _ = writeln!(output);
            let _ = writeln!(output, "Code:");
            fenced(&mut output, fence, code);
            let _ = writeln!(output);
            let _ = writeln!(output, "Error message:");
            fenced(&mut output, "", message);
            numbered(
                &mut output,
                "Include:",
                &[
                    "The root cause of the error",
                    "A concrete fix",
                    "The corrected code",
                    "Tips to avoid similar errors",
                ],
            );
        }
        None => {
            let _ = writeln!(
                output,
                "Review the following {prefix}code for potential problems and improvements:"
            );
            let _ = writeln!(output);
            fenced(&mut output, fence, code);
            numbered(
                &mut output,
                "Check for:",
                &[
                    "Syntax errors",
                    "Logic errors",
                    "Performance problems",
                    "Security issues",
                    "Code quality improvements",
                ],
            );
        }
    }
    reply_line(&mut output, reply_language);
    output
}

/// Request for new code matching `description`.
pub fn generate_code_prompt(
    description: &str,
    language: &str,
    reply_language: Option<&str>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Write {language} code that satisfies the following description."
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Requirements: {description}");
    numbered(
        &mut output,
        "Structure the answer as:",
        &[
            "A short explanation of the code",
            "Complete, runnable code",
            "A usage example",
            "Further improvement ideas",
        ],
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Keep the code clear and readable with helpful comments.");
    reply_line(&mut output, reply_language);
    output
}

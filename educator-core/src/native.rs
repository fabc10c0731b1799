//! Regex and `tokei` backed structural analyzer.

use std::sync::LazyLock;

use regex::Regex;
use tokei::{Config, LanguageType};

use crate::analyzer::{CodeAnalyzer, calculate_quality_score};
use crate::domain::{AnalysisMetrics, StructuralFacts};
use crate::error::{EducatorError, Result};

const LONG_CODE_CHARS: usize = 1000;

// ---------------------------------------------------------------------------
// Patterns (compiled once)
// ---------------------------------------------------------------------------

static PY_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*((?:import|from)[ \t]+[\w.]+.*?)[ \t]*$").expect("python import regex")
});
static C_INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"#include\s*[<"][\w./]+[>"]"#).expect("include regex"));
static JS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s[^;\n]*?['"][^'"\n]+['"]|require\(\s*['"][^'"\n]+['"]\s*\)"#)
        .expect("javascript import regex")
});
static PY_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdef\s+(\w+)\s*\(").expect("python function regex"));
static C_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+)[\s\*&]+(\w+)\s*\([^()]*\)\s*(?:const\s*)?\{").expect("c function regex")
});
static JS_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bfunction\s+(\w+)\s*\(|\b(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(?:function\b|\([^()]*\)\s*=>|\w+\s*=>)",
    )
    .expect("javascript function regex")
});
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+(\w+)").expect("class regex"));
static DECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|for|while|case|catch|except)\b|&&|\|\||\?|\band\b|\bor\b")
        .expect("decision regex")
});

fn count_word(code: &str, word: &str) -> u32 {
    code.split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .filter(|token| *token == word)
        .count() as u32
}

/// Native analyzer for python, c, cpp and javascript.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexAnalyzer;

impl RegexAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self
    }

    fn supported_language(&self, code: &str) -> Result<&'static str> {
        match detect_language(code) {
            "unknown" => Err(EducatorError::AnalysisFailed(
                "unsupported language".to_string(),
            )),
            language => Ok(language),
        }
    }
}

impl CodeAnalyzer for RegexAnalyzer {
    fn parse(&self, code: &str) -> Result<StructuralFacts> {
        let language = self.supported_language(code)?;
        Ok(StructuralFacts {
            language: language.to_string(),
            imports: extract_imports(code, language),
            functions: extract_functions(code, language),
            classes: CLASS_RE
                .captures_iter(code)
                .map(|caps| caps[1].to_string())
                .collect(),
            complexity: structural_complexity(code),
        })
    }

    fn analyze(&self, code: &str) -> Result<AnalysisMetrics> {
        let language = self.supported_language(code)?;
        let facts = self.parse(code)?;
        let stats = tokei_language(language).parse_from_str(code, &Config::default());
        let line_count = (stats.code + stats.comments) as u32;
        let comment_count = stats.comments as u32;
        let nesting_depth = nesting_depth(code, language);
        let cyclomatic_complexity = cyclomatic_complexity(code);

        Ok(AnalysisMetrics {
            line_count,
            comment_count,
            comment_ratio: AnalysisMetrics::ratio(comment_count, line_count),
            nesting_depth,
            cyclomatic_complexity,
            potential_issues: potential_issues(
                code,
                language,
                nesting_depth,
                cyclomatic_complexity,
            ),
            suggestions: suggestions(code, &facts),
        })
    }

    fn quality_score(&self, metrics: &AnalysisMetrics) -> u8 {
        calculate_quality_score(metrics)
    }
}

/// Language detection used by the native analyzer.
pub fn detect_language(code: &str) -> &'static str {
    if code.contains("def ")
        || code.contains("import ") && !code.contains(';')
        || code.contains("class ") && code.contains(':') && !code.contains('{')
    {
        "python"
    } else if code.contains("#include")
        && (code.contains("<stdio.h>") || code.contains("<stdlib.h>"))
        && !code.contains("std::")
        && !code.contains("class ")
    {
        "c"
    } else if code.contains("#include") || code.contains("int main") || code.contains("std::") {
        "cpp"
    } else if code.contains("function ")
        || code.contains("const ")
        || code.contains("let ")
        || code.contains("=>")
        || code.contains("import ")
    {
        "javascript"
    } else {
        "unknown"
    }
}

fn tokei_language(language: &str) -> LanguageType {
    match language {
        "python" => LanguageType::Python,
        "c" => LanguageType::C,
        "cpp" => LanguageType::Cpp,
        _ => LanguageType::JavaScript,
    }
}

fn extract_imports(code: &str, language: &str) -> Vec<String> {
    match language {
        "python" => PY_IMPORT_RE
            .captures_iter(code)
            .map(|caps| caps[1].to_string())
            .collect(),
        "c" | "cpp" => C_INCLUDE_RE
            .find_iter(code)
            .map(|found| found.as_str().to_string())
            .collect(),
        _ => JS_IMPORT_RE
            .find_iter(code)
            .map(|found| found.as_str().trim().to_string())
            .collect(),
    }
}

fn extract_functions(code: &str, language: &str) -> Vec<String> {
    match language {
        "python" => PY_FUNCTION_RE
            .captures_iter(code)
            .map(|caps| caps[1].to_string())
            .collect(),
        "c" | "cpp" => C_FUNCTION_RE
            .captures_iter(code)
            .filter(|caps| {
                !matches!(
                    &caps[1],
                    "if" | "for" | "while" | "switch" | "else" | "return" | "do"
                )
            })
            .map(|caps| caps[2].to_string())
            .collect(),
        _ => JS_FUNCTION_RE
            .captures_iter(code)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|name| name.as_str().to_string())
            .collect(),
    }
}

/// Size plus weighted control-flow keywords plus indentation.
fn structural_complexity(code: &str) -> u32 {
    let size = (code.chars().count() / 100) as u32;
    let keywords = count_word(code, "if")
        + count_word(code, "for") * 2
        + count_word(code, "while") * 2
        + count_word(code, "switch") * 3
        + count_word(code, "try");
    let max_indent = code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .max()
        .unwrap_or(0) as u32;
    size + keywords + max_indent / 2
}

fn cyclomatic_complexity(code: &str) -> u32 {
    1 + DECISION_RE.find_iter(code).count() as u32
}

fn nesting_depth(code: &str, language: &str) -> u32 {
    if language == "python" {
        indentation_depth(code)
    } else {
        brace_depth(code)
    }
}

/// Indentation levels of four columns; tabs count as four.
fn indentation_depth(code: &str) -> u32 {
    code.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let columns: u32 = line
                .chars()
                .take_while(|ch| *ch == ' ' || *ch == '\t')
                .map(|ch| if ch == '\t' { 4 } else { 1 })
                .sum();
            columns / 4
        })
        .max()
        .unwrap_or(0)
}

/// Brace depth ignoring string, character and comment contents.
fn brace_depth(code: &str) -> u32 {
    #[derive(PartialEq)]
    enum Mode {
        Code,
        Str(char),
        LineComment,
        BlockComment,
    }

    let mut mode = Mode::Code;
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;
    let mut chars = code.chars().peekable();
    while let Some(ch) = chars.next() {
        match mode {
            Mode::Code => match ch {
                '"' | '\'' | '`' => mode = Mode::Str(ch),
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    mode = Mode::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    mode = Mode::BlockComment;
                }
                '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            },
            Mode::Str(quote) => {
                if ch == '\\' {
                    chars.next();
                } else if ch == quote || (ch == '\n' && quote != '`') {
                    mode = Mode::Code;
                }
            }
            Mode::LineComment => {
                if ch == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    mode = Mode::Code;
                }
            }
        }
    }
    max_depth
}

fn potential_issues(code: &str, language: &str, nesting: u32, cyclomatic: u32) -> Vec<String> {
    let mut issues = Vec::new();
    if code.chars().count() > LONG_CODE_CHARS {
        issues.push("Code is too long, consider breaking it into smaller functions.".to_string());
    }
    if nesting > 5 {
        issues.push("Code has high nesting depth, consider refactoring.".to_string());
    }
    if cyclomatic > 10 {
        issues.push("Code has high cyclomatic complexity, consider refactoring.".to_string());
    }
    match language {
        "python" => {
            if code.contains("eval(") {
                issues.push("Avoid using eval() for security reasons.".to_string());
            }
            if code.contains("except:") {
                issues.push("Bare except clause catches every exception.".to_string());
            } else if code.contains("global ") {
                issues.push("Avoid using global variables unless necessary.".to_string());
            }
        }
        "cpp" => {
            if code.contains("using namespace std;") {
                issues.push("Avoid 'using namespace std;' in shared code.".to_string());
            }
        }
        "javascript" => {
            if code.contains("eval(") {
                issues.push("Avoid using eval() for security reasons.".to_string());
            }
        }
        _ => {}
    }
    issues
}

fn suggestions(code: &str, facts: &StructuralFacts) -> Vec<String> {
    let mut suggestions = Vec::new();
    if facts.complexity > 10 {
        suggestions.push("Consider refactoring the code to reduce complexity.".to_string());
    }
    if facts.functions.len() > 10 {
        suggestions.push("Consider splitting this file into smaller modules.".to_string());
    }
    if facts.classes.len() > 5 {
        suggestions.push("Consider breaking down large classes into smaller ones.".to_string());
    }
    if facts.imports.len() > 5 {
        suggestions.push("Consider removing unused imports.".to_string());
    }
    let tip = match facts.language.as_str() {
        "python" if code.contains("except:") => {
            Some("Specify the exception type in the except clause.")
        }
        "python" if code.contains("global ") => {
            Some("Pass values explicitly instead of using global variables.")
        }
        "cpp" if count_word(code, "new") > 0 && count_word(code, "delete") == 0 => {
            Some("Consider using smart pointers to manage memory.")
        }
        "cpp" if code.contains("using namespace std;") => {
            Some("Qualify names with std:: instead of importing the namespace.")
        }
        "javascript" if code.contains("var ") => {
            Some("Consider using 'let' or 'const' instead of 'var'.")
        }
        "javascript" if has_loose_equality(code) => {
            Some("Consider using '===' for strict equality comparison.")
        }
        "c" if code.contains("malloc") && !code.contains("free(") => {
            Some("Release memory allocated with 'malloc' using 'free'.")
        }
        "c" if code.contains("strcpy") => Some("Consider using 'strncpy' to avoid buffer overflow."),
        _ => None,
    };
    if let Some(tip) = tip {
        suggestions.push(tip.to_string());
    }
    suggestions
}

fn has_loose_equality(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.windows(2).enumerate().any(|(index, pair)| {
        pair == b"=="
            && bytes.get(index + 2) != Some(&b'=')
            && !matches!(index.checked_sub(1).map(|prev| bytes[prev]), Some(b'=' | b'!' | b'<' | b'>'))
    })
}

#![deny(missing_docs)]
//! Code Educator command-line interface.
//!
//! Ask questions of a local model backend and analyze source files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use educator_core::{
    AnalysisResult, AnalysisService, AssistantService, BackendConfig, GenerationClient,
    QualityVerdict, evaluate_result, heuristic, render_analysis_markdown, render_analysis_text,
    render_json, render_models_text, render_verdict_text,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "educator", version, about = "Code Educator CLI")]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct BackendArgs {
    /// Base URL of the model backend.
    #[arg(long, env = "OLLAMA_API_URL", global = true)]
    api_url: Option<String>,
    /// Model to use instead of the configured default.
    #[arg(short, long, env = "EDUCATOR_MODEL", global = true)]
    model: Option<String>,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the model a question.
    Ask {
        /// Question to ask.
        question: String,
        /// Wait for the full answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
        /// Extra context the answer should take into account.
        #[arg(long)]
        context: Option<String>,
    },
    /// List models installed on the backend.
    Models,
    /// Check that the backend is reachable.
    Check,
    /// Analyze a source file.
    Analyze {
        /// File to analyze.
        file: PathBuf,
        /// Ask the model for commentary as well.
        #[arg(long)]
        ai: bool,
        /// Fail when the quality score is below this value.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Explain what a source file does.
    Explain {
        /// File to explain.
        file: PathBuf,
        /// Language of the file; guessed when omitted.
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Get help debugging a source file.
    Debug {
        /// File to debug.
        file: PathBuf,
        /// Error message produced by the code.
        #[arg(short, long)]
        error: Option<String>,
        /// Language of the file; guessed when omitted.
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Generate code from a description.
    Generate {
        /// What the code should do.
        description: String,
        /// Target language.
        #[arg(short, long)]
        language: String,
    },
    /// List supported analysis languages.
    Languages,
}

#[derive(Serialize)]
struct GatedAnalysis<'a> {
    analysis: &'a AnalysisResult,
    verdict: &'a QualityVerdict,
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = backend_config(&cli.backend)?;
    let mut stdout = tokio::io::stdout();
    run_command(cli.command, config, &mut stdout).await
}

#[cfg(test)]
fn main() {}

fn backend_config(args: &BackendArgs) -> CliResult<BackendConfig> {
    let mut config = BackendConfig::from_env()?;
    if let Some(url) = &args.api_url {
        config.base_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.default_model = model.clone();
    }
    let config = config.validate()?;
    log::debug!(
        "backend {} with model {}",
        config.base_url,
        config.default_model
    );
    Ok(config)
}

async fn run_command<W>(command: Commands, config: BackendConfig, out: &mut W) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    match command {
        Commands::Ask {
            question,
            no_stream,
            context,
        } => run_ask(config, &question, context.as_deref(), !no_stream, out).await,
        Commands::Models => run_models(config, out).await,
        Commands::Check => run_check(config, out).await,
        Commands::Analyze {
            file,
            ai,
            threshold,
            report,
        } => run_analyze(config, &file, ai, threshold, &report, out).await,
        Commands::Explain { file, language } => {
            let code = read_source(&file).await?;
            let language = language.or_else(|| guess_language(&code));
            let assistant = AssistantService::new(config)?;
            let answer = assistant
                .explain_code(&code, language.as_deref(), None)
                .await?;
            write_answer(out, &answer).await
        }
        Commands::Debug {
            file,
            error,
            language,
        } => {
            let code = read_source(&file).await?;
            let language = language.or_else(|| guess_language(&code));
            let assistant = AssistantService::new(config)?;
            let answer = assistant
                .debug_help(&code, error.as_deref(), language.as_deref(), None)
                .await?;
            write_answer(out, &answer).await
        }
        Commands::Generate {
            description,
            language,
        } => {
            let assistant = AssistantService::new(config)?;
            let answer = assistant
                .generate_code(&description, &language, None)
                .await?;
            write_answer(out, &answer).await
        }
        Commands::Languages => run_languages(config, out).await,
    }
}

async fn run_ask<W>(
    config: BackendConfig,
    question: &str,
    context: Option<&str>,
    stream: bool,
    out: &mut W,
) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    let assistant = AssistantService::new(config)?;
    if !stream {
        let answer = assistant.ask(question, None, context).await?;
        return write_answer(out, &answer).await;
    }

    let mut fragments = assistant.ask_stream(question, None, context).await?;
    let mut received = false;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        received = true;
        out.write_all(fragment.as_bytes()).await?;
        out.flush().await?;
    }
    if received {
        out.write_all(b"\n").await?;
    } else {
        out.write_all(b"No response generated.\n").await?;
    }
    out.flush().await?;
    Ok(())
}

async fn run_models<W>(config: BackendConfig, out: &mut W) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    let assistant = AssistantService::new(config)?;
    let models = assistant.available_models().await?;
    out.write_all(render_models_text(&models).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn run_check<W>(config: BackendConfig, out: &mut W) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    let client = GenerationClient::new(&config)?;
    if !client.check_connection().await {
        return Err(format!("cannot connect to the model backend at {}", config.base_url).into());
    }
    let line = format!("Connected to the model backend at {}\n", config.base_url);
    out.write_all(line.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn run_analyze<W>(
    config: BackendConfig,
    file: &Path,
    ai: bool,
    threshold: Option<u8>,
    report: &OutputArgs,
    out: &mut W,
) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    let service = AnalysisService::new(config)?;
    let result = service.analyze_file(file, ai, None).await?;
    let verdict = threshold.map(|threshold| evaluate_result(&result, threshold));

    let contents = render_analysis(&result, verdict.as_ref(), report.format)?;
    emit_output(report, contents, out).await?;

    match verdict {
        Some(verdict) if !verdict.passed => Err(format!(
            "quality gate failed: score {} is below {}",
            verdict.score, verdict.threshold
        )
        .into()),
        _ => Ok(()),
    }
}

fn render_analysis(
    result: &AnalysisResult,
    verdict: Option<&QualityVerdict>,
    format: OutputFormat,
) -> CliResult<String> {
    let contents = match (format, verdict) {
        (OutputFormat::Json, Some(verdict)) => {
            render_json(&GatedAnalysis {
                analysis: result,
                verdict,
            })? + "\n"
        }
        (OutputFormat::Json, None) => render_json(result)? + "\n",
        (OutputFormat::Text, verdict) => {
            let mut output = render_analysis_text(result);
            if let Some(verdict) = verdict {
                output.push('\n');
                output.push_str(&render_verdict_text(verdict));
            }
            output
        }
        (OutputFormat::Markdown, verdict) => {
            let mut output = render_analysis_markdown(result);
            if let Some(verdict) = verdict {
                output.push_str("### Quality gate\n```text\n");
                output.push_str(&render_verdict_text(verdict));
                output.push_str("```\n");
            }
            output
        }
    };
    Ok(contents)
}

async fn run_languages<W>(config: BackendConfig, out: &mut W) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    let stats = AnalysisService::new(config)?.stats();
    let mut output = String::from("Supported languages:\n");
    for language in &stats.supported_languages {
        output.push_str(&format!("  - {language}\n"));
    }
    let analyzer = if stats.core_module_available {
        "native"
    } else {
        "heuristic"
    };
    output.push_str(&format!("Analyzer: {analyzer}\n"));
    out.write_all(output.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn emit_output<W>(output: &OutputArgs, contents: String, out: &mut W) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        out.write_all(contents.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}

async fn write_answer<W>(out: &mut W, answer: &str) -> CliResult<()>
where
    W: AsyncWrite + Unpin,
{
    if answer.trim().is_empty() {
        out.write_all(b"No response generated.\n").await?;
    } else {
        out.write_all(answer.trim_end().as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}

async fn read_source(path: &Path) -> CliResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("failed to read {}: {err}", path.display()).into())
}

fn guess_language(code: &str) -> Option<String> {
    match heuristic::detect_language(code) {
        "unknown" => None,
        language => Some(language.to_string()),
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use sheet_assistant::{AssistantAnswer, ResolverConfig, SheetSession};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-assistant")]
#[command(about = "Ask plain-language questions (English or Arabic) about a spreadsheet")]
struct Args {
    /// CSV, TSV, Parquet, JSON or NDJSON file
    file: PathBuf,

    /// Question to answer; without it, questions are read from stdin
    question: Option<String>,

    /// JSON resolver config (defaults to $SHEET_ASSISTANT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print answers as JSON
    #[arg(long)]
    json: bool,

    /// Print the column roles and exit
    #[arg(long)]
    describe: bool,

    /// Rows returned by top/bottom questions
    #[arg(long)]
    top: Option<usize>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheet_assistant=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ResolverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResolverConfig::from_env().context("Failed to load config from environment")?,
    };
    if let Some(top) = args.top {
        config.ranking_limit = top;
        config.validate()?;
    }

    let mut session = SheetSession::new(config);
    session
        .load_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    if args.describe {
        print!("{}", session.describe());
        return Ok(());
    }

    if let Some(question) = &args.question {
        let answer = session.ask(question);
        return print_answer(&answer, args.json);
    }

    info!("Reading questions from stdin (type 'exit' to quit)");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        let answer = session.ask(question);
        print_answer(&answer, args.json)?;
    }
    Ok(())
}

fn print_answer(answer: &AssistantAnswer, json: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string(answer)?)?;
    } else {
        writeln!(stdout, "{}", answer.message)?;
    }
    stdout.flush()?;
    Ok(())
}

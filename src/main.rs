use std::io::Write as _;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use lexgraf::config::Config;
use lexgraf::embed::{self, Embedder};
use lexgraf::error::AppError;
use lexgraf::graph::GraphStore;
use lexgraf::llm::ChatProvider;
use lexgraf::rag::RagEngine;
use lexgraf::reports::ReportWriter;
use lexgraf::{ingest, logger};

const USAGE: &str = "\
usage: lexgraf [--config <path>] <command>

commands:
  ingest     parse PDFs from the input directory into the graph and embed them
  backfill   embed nodes that are still missing a vector
  ask        interactive question loop (flags: --no-rag, --contract <name>, --user <name>)
  check      verify the graph connection and print a node count";

struct Cli {
    config_path: Option<String>,
    command: String,
    no_rag: bool,
    contract: String,
    user: String,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut cli = Cli {
        config_path: None,
        command: String::new(),
        no_rag: false,
        contract: "todos".to_string(),
        user: "anon".to_string(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                cli.config_path = Some(
                    iter.next()
                        .ok_or("--config needs a path")?
                        .clone(),
                );
            }
            "--no-rag" => cli.no_rag = true,
            "--contract" => {
                cli.contract = iter.next().ok_or("--contract needs a name")?.clone();
            }
            "--user" => {
                cli.user = iter.next().ok_or("--user needs a name")?.clone();
            }
            "-h" | "--help" => return Err(String::new()),
            cmd if cli.command.is_empty() && !cmd.starts_with('-') => {
                cli.command = cmd.to_string();
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    if cli.command.is_empty() {
        return Err("missing command".to_string());
    }
    Ok(cli)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Secrets come from .env in development; absence is fine in production.
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}\n");
            }
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::load(cli.config_path.as_deref())?;
    config.expand_dirs();
    logger::init(&config.assistant.log_level)?;
    info!(assistant = %config.assistant.name, command = %cli.command, "starting");

    match cli.command.as_str() {
        "ingest" => {
            let mut store = GraphStore::connect(&config.graph).await?;
            let stats = ingest::run(&config, &mut store).await?;
            println!(
                "loaded {} file(s), {} failed ({} sections, {} chunks, {} tables)",
                stats.loaded,
                stats.failed,
                stats.counts.sections,
                stats.counts.chunks,
                stats.counts.tables
            );
        }
        "backfill" => {
            let mut store = GraphStore::connect(&config.graph).await?;
            store
                .ensure_schema(&config.embedding.index_name, config.embedding.dimension)
                .await?;
            let mut embedder = Embedder::new(&config.embedding)?;
            let stats =
                embed::backfill::run(&store, &mut embedder, config.embedding.refresh_every).await?;
            println!("embedded {} node(s), {} failed", stats.embedded, stats.failed);
        }
        "ask" => ask_loop(&config, &cli).await?,
        "check" => {
            let store = GraphStore::connect(&config.graph).await?;
            let total = store.node_count().await?;
            println!("graph reachable, {total} node(s)");
        }
        other => {
            return Err(AppError::Config(format!(
                "unknown command: {other} (see --help)"
            )));
        }
    }
    Ok(())
}

/// Interactive loop. Each question gets both a plain and a grounded answer
/// unless `--no-rag` was passed; `:ticket` turns the conversation so far
/// into a draft for a human lawyer; an empty line or `:q` exits.
async fn ask_loop(config: &Config, cli: &Cli) -> Result<(), AppError> {
    let store = GraphStore::connect(&config.graph).await?;
    let total = store.node_count().await?;
    info!(nodes = total, "graph reachable");

    let embedder = Embedder::new(&config.embedding)?;
    let chat = ChatProvider::new(&config.chat)?;
    let engine = RagEngine::new(
        &store,
        &embedder,
        &chat,
        &config.embedding.index_name,
        config.chat.top_k,
    );
    let reports = ReportWriter::new(&config.reports.dir);

    println!("Asistente de contratos. Escribe tu pregunta, :ticket para generar un ticket, :q para salir.");
    let mut transcript = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question == ":q" {
            break;
        }

        if question == ":ticket" {
            if transcript.is_empty() {
                println!("Aún no hay conversación que convertir en ticket.");
                continue;
            }
            let draft = engine.ticket_draft(&transcript).await?;
            println!("Title: {}\nQuestion: {}", draft.title, draft.question);
            reports
                .append_ticket(
                    &cli.user,
                    &cli.contract,
                    &transcript,
                    &draft.title,
                    &draft.question,
                )
                .await?;
            continue;
        }

        let print_token = |token: &str| {
            print!("{token}");
            let _ = std::io::stdout().flush();
        };

        let (plain, grounded) = if cli.no_rag {
            let answer = engine.plain_answer(question, print_token).await?;
            (answer, String::new())
        } else {
            // The plain answer runs quietly for the comparison report; only
            // the grounded answer streams to the terminal.
            let plain = engine.plain_answer(question, |_| {}).await?;
            let grounded = engine.rag_answer(question, print_token).await?;
            (plain, grounded.answer)
        };
        println!();

        let shown = if cli.no_rag { &plain } else { &grounded };
        transcript.push_str(&format!("Usuario: {question}\nAsistente: {shown}\n"));
        reports
            .append_rag(&cli.contract, question, &plain, &grounded, &cli.user)
            .await?;
    }

    println!("Hasta pronto.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_command_and_flags() {
        let cli = parse_args(&args(&[
            "--config", "conf.toml", "ask", "--no-rag", "--user", "maria",
        ]))
        .expect("parse");
        assert_eq!(cli.command, "ask");
        assert_eq!(cli.config_path.as_deref(), Some("conf.toml"));
        assert!(cli.no_rag);
        assert_eq!(cli.user, "maria");
        assert_eq!(cli.contract, "todos");
    }

    #[test]
    fn missing_command_is_rejected() {
        assert!(parse_args(&args(&["--no-rag"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse_args(&args(&["ingest", "--frobnicate"])).is_err());
    }
}

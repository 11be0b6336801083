//! `tradecfg` binary

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tradecfg_cli::{load_document, render, save_document, Session};
use tradecfg_command::{rules, CommandParser, ParseContext};
use tradecfg_engine::{CommandResult, EngineSettings};

fn cli() -> Command {
    Command::new("tradecfg")
        .version(tradecfg_cli::VERSION)
        .about("Free-text command runner for trading configurations")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level unless RUST_LOG is set"),
        )
        .subcommand(
            Command::new("run")
                .about("Execute commands against a document")
                .arg(
                    Arg::new("document")
                        .long("document")
                        .short('d')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON or YAML configuration document"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine settings (TOML)"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .help("Single command; reads stdin lines when absent"),
                )
                .arg(
                    Arg::new("auto-approve")
                        .long("auto-approve")
                        .action(ArgAction::SetTrue)
                        .help("Apply plans without confirmation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print results as JSON"),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the resulting document here"),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse text and print the command as JSON")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .required(true)
                        .help("Text to parse"),
                ),
        )
        .subcommand(Command::new("rules").about("List semantic rules in evaluation order"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", args)) => {
            init_tracing(args.get_flag("verbose"));
            run(args).await
        }
        Some(("parse", args)) => {
            init_tracing(args.get_flag("verbose"));
            let input = args
                .get_one::<String>("input")
                .context("--input is required")?;
            let command = CommandParser::new().parse(input, &ParseContext::new()).await;
            println!("{}", serde_json::to_string_pretty(&command)?);
            Ok(ExitCode::SUCCESS)
        }
        Some(("rules", _)) => {
            for rule in rules() {
                println!("{:<26} {}", rule.name, rule.pattern.as_str());
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn run(args: &ArgMatches) -> Result<ExitCode> {
    let document_path = args
        .get_one::<PathBuf>("document")
        .context("--document is required")?;
    let document = load_document(document_path)?;

    let mut settings = match args.get_one::<PathBuf>("settings") {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };
    if args.get_flag("auto-approve") {
        settings = settings.with_auto_approve(true);
    }
    let json = args.get_flag("json");

    let mut session = Session::new(document, settings)?;
    let mut failed = 0usize;

    if let Some(input) = args.get_one::<String>("input") {
        if let Some(result) = session.handle_line(input).await {
            failed += usize::from(!result.success);
            print_result(&result, json)?;
        }
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(result) = session.handle_line(&line).await {
                failed += usize::from(!result.success);
                print_result(&result, json)?;
            }
        }
    }

    if let Some(plan) = session.executor().pending_plan() {
        warn!(plan = %plan.id, changes = plan.len(), "unconfirmed plan discarded");
    }
    if let Some(path) = args.get_one::<PathBuf>("save") {
        save_document(session.executor().document(), path)?;
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &CommandResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", render(result));
    }
    Ok(())
}

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use optbind::{ConfigError, ErrorKind, ParseError, Registry};
use optbind_schema::load_schema;
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing_subscriber::{EnvFilter, fmt};

use crate::report::{ParseReport, scopes};

/// Command line usage error (sysexits `EX_USAGE`).
const EXIT_USAGE: u8 = 64;
/// Input file missing or unreadable (`EX_NOINPUT`).
const EXIT_NO_INPUT: u8 = 66;
/// Configuration error (`EX_CONFIG`).
const EXIT_CONFIG: u8 = 78;

#[derive(Parser)]
#[command(name = "optbind")]
#[command(version, about = "Bind argument vectors against an option schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse arguments and print the bound values as JSON
    Parse(ParseArgs),

    /// Validate a schema and describe its command scopes
    Check(CheckArgs),

    /// Print the canonical form of an argument vector
    Canon(CanonArgs),
}

#[derive(Parser)]
struct ParseArgs {
    /// Schema file (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Use the process environment as a fallback for options that declare one
    #[arg(long)]
    env: bool,

    /// Arguments to parse (put them after `--`)
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Schema file (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Print the scope report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CanonArgs {
    /// Schema file (JSON)
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Print the tokens as a JSON array instead of one per line
    #[arg(long)]
    json: bool,

    /// Arguments to canonicalize (put them after `--`)
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse(args) => parse_command(args),
        Commands::Check(args) => check_command(args),
        Commands::Canon(args) => canon_command(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<ParseError>() {
        return match err.kind() {
            ErrorKind::Usage => EXIT_USAGE,
            ErrorKind::ResponseFile => EXIT_NO_INPUT,
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    1
}

fn load_registry(path: &Path) -> Result<Registry> {
    let schema = load_schema(path)?;
    tracing::debug!(
        name = %schema.name,
        options = schema.options.len(),
        commands = schema.commands.len(),
        "loaded schema"
    );
    schema
        .build()
        .with_context(|| format!("invalid schema: {}", path.display()))
}

fn parse_command(args: ParseArgs) -> Result<()> {
    tracing::debug!("executing parse command");

    let mut reg = load_registry(&args.schema)?;
    let env: Vec<(String, String)> = if args.env {
        std::env::vars().collect()
    } else {
        Vec::new()
    };
    let matches = reg.parse_with_env(args.args.as_slice(), &env)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&ParseReport::new(&matches))?
    );
    Ok(())
}

fn check_command(args: CheckArgs) -> Result<()> {
    tracing::debug!("executing check command");

    let reg = load_registry(&args.schema)?;
    let report = scopes(&reg);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!("=== Schema Check Results ===");
    eprintln!("Schema: {}", args.schema.display());
    for scope in &report {
        let name = if scope.path.is_empty() {
            reg.command_name(reg.root()).to_string()
        } else {
            scope.path.join(" ")
        };
        eprintln!();
        eprintln!("[{name}]");
        eprintln!("  options: {}", scope.options.join(", "));
        eprintln!("  operands: {}", scope.operands.join(", "));
        if !scope.subcommands.is_empty() {
            eprintln!("  subcommands: {}", scope.subcommands.join(", "));
        }
        eprintln!("  required operands: {}", scope.min_required_operands);
        if let Some(operand) = &scope.final_operand {
            eprintln!("  final operand: {operand}");
        }
    }
    eprintln!();
    eprintln!("OK: {} scope(s)", report.len());
    Ok(())
}

fn canon_command(args: CanonArgs) -> Result<()> {
    tracing::debug!("executing canon command");

    let mut reg = load_registry(&args.schema)?;
    let matches = reg.parse(args.args.as_slice())?;
    let tokens = reg.canonical_args(&matches);

    if args.json {
        println!("{}", serde_json::to_string(&tokens)?);
    } else {
        for token in &tokens {
            println!("{token}");
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

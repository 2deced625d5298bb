//! Binary entry point for the Quill query CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use quill::query::{parse_literal, Entity, MemoryBackend, ParsedQuery, QueryEngine, Value};
use quill::QueryConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    version,
    about = "Parse and run Quill queries against JSON data",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Engine configuration (TOML); defaults to the per-user config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Log filter, e.g. 'quill=debug' (overrides RUST_LOG)"
    )]
    log: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Parse a statement and print the resolved query")]
    Parse {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    #[command(about = "Run a statement against a JSON data file")]
    Run(RunCmd),

    #[command(about = "Print the effective engine configuration")]
    Config,
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(value_name = "QUERY")]
    query: String,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON object mapping entity names to arrays of records"
    )]
    data: PathBuf,

    #[arg(
        long = "param",
        value_name = "NAME=VALUE",
        help = "Bind a parameter; VALUE is a query literal, or a bare string"
    )]
    params: Vec<String>,

    #[arg(long, help = "Write the data file back after the statement runs")]
    write_back: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref())?;
    let config = QueryConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Parse { query } => {
            let engine = QueryEngine::with_config(config);
            let parsed = engine.parse(&query)?;
            emit(&cli.format, &parsed, |_| print_parsed_text(&parsed))?;
        }
        Command::Run(cmd) => {
            let engine = QueryEngine::with_config(config);
            let rows = run_query(&engine, &cmd)?;
            let json: Vec<serde_json::Value> = rows.iter().map(Entity::to_json).collect();
            emit(&cli.format, &json, |_| {
                for row in &json {
                    println!("{row}");
                }
            })?;
        }
        Command::Config => {
            let rendered = config.to_toml_string()?;
            emit(&cli.format, &config, |_| print!("{rendered}"))?;
        }
    }

    Ok(())
}

fn init_tracing(filter: Option<&str>) -> Result<(), Box<dyn Error>> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| err as Box<dyn Error>)
}

fn run_query(engine: &QueryEngine, cmd: &RunCmd) -> Result<Vec<Entity>, Box<dyn Error>> {
    let backend = load_data(&cmd.data)?;
    let parsed = engine.parse(&cmd.query)?;
    let rows = if parsed.is_parameterized() || !cmd.params.is_empty() {
        let mut prepared = engine.prepare(&cmd.query, &backend)?;
        for raw in &cmd.params {
            let (name, value) = parse_param(raw)?;
            prepared.bind(name, value);
        }
        prepared.execute()?
    } else {
        engine.query(&cmd.query, &backend)?
    };
    if cmd.write_back {
        let json = serde_json::to_string_pretty(&backend.to_json())?;
        fs::write(&cmd.data, json)?;
    }
    Ok(rows)
}

fn load_data(path: &Path) -> Result<MemoryBackend, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read data file {}: {err}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(MemoryBackend::from_json(json)?)
}

fn parse_param(raw: &str) -> Result<(&str, Value), Box<dyn Error>> {
    let (name, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid --param '{raw}', expected NAME=VALUE"))?;
    let name = name.trim().trim_start_matches('@');
    if name.is_empty() {
        return Err(format!("invalid --param '{raw}', empty name").into());
    }
    let value = parse_literal(text).unwrap_or_else(|_| Value::String(text.to_owned()));
    Ok((name, value))
}

fn print_parsed_text(parsed: &ParsedQuery) {
    println!("{}", parsed.statement);
    if parsed.is_parameterized() {
        println!("params: {}", parsed.params.names().join(", "));
    }
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

//! Compiles a definition document, invokes one operation and prints its JSON
//! result on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use request_builder::logging::{init_tracing, LOG_ENV};
use request_builder::{create_async_request_builder, BuilderConfig, RequestObject};
use serde_json::{Map, Value};
use tracing::error;

/// Invoke an operation from a request-builder definition document.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Definition document (JSON).
    #[arg(long, short = 'd')]
    definition: PathBuf,

    /// Settings file with `prefixes` and `params` (JSON).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Dotted path of the operation to invoke, e.g. `users.get`.
    #[arg(required_unless_present = "list")]
    operation: Option<String>,

    /// Call params as a JSON object.
    #[arg(long, value_parser = parse_object)]
    params: Option<Map<String, Value>>,

    /// Call payload as JSON.
    #[arg(long, value_parser = parse_json)]
    payload: Option<Value>,

    /// Call headers as a JSON object.
    #[arg(long, value_parser = parse_object)]
    headers: Option<Map<String, Value>>,

    /// Replaces the operation URL for this call.
    #[arg(long)]
    uri_override: Option<String>,

    /// Print the paths of every operation in the definition and exit.
    #[arg(long)]
    list: bool,

    /// Log filter directives.
    #[arg(long, env = LOG_ENV)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn request(&self) -> RequestObject {
        RequestObject {
            params: self.params.clone(),
            payload: self.payload.clone(),
            headers: self.headers.clone(),
            uri_override: self.uri_override.clone(),
        }
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|err| err.to_string())
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match parse_json(text)? {
        Value::Object(map) => Ok(map),
        _ => Err("expected a JSON object".to_string()),
    }
}

fn read_definition(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading definition {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing definition {}", path.display()))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let definition = read_definition(&args.definition)?;
    let config = match &args.config {
        Some(path) => BuilderConfig::from_json_file(path)?,
        None => BuilderConfig::default(),
    };
    let tree = create_async_request_builder(&definition, config);

    let Some(operation) = args.operation.as_deref().filter(|_| !args.list) else {
        for operation in tree.root().operations() {
            println!("{}", operation.path());
        }
        return tree.close_async_module_connections().await;
    };

    let outcome = tree.invoke(operation, args.request()).await;
    let shutdown = tree.close_async_module_connections().await;

    let value = outcome.with_context(|| format!("operation {operation} failed"))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    shutdown
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_tracing(args.log_level.as_deref(), args.log_json) {
        eprintln!("failed to initialise logging: {err:#}");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "request-builder failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

//! RQL CLI
//!
//! Command-line interface for the RQL compiler:
//! - Parse a query and print its AST
//! - Compile a query against a schema definition and print the plan
//! - Inspect a schema definition
//! - Print a default configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rql::cache::RequestMethod;
use rql::config::{generate_default_config, Config, LoggingConfig};
use rql::plan::BaseQuery;
use rql::query::parse_query;
use rql::schema::{FilterSchema, SchemaDefinition};
use rql::service::{decode_query, QueryService};

#[derive(Parser)]
#[command(name = "rql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resource Query Language compiler")]
#[command(long_about = "Parses RQL query strings and compiles them against declarative filter schemas.\nSchemas are loaded from TOML or JSON definition files.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Compact JSON output
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query and print the AST
    Parse {
        /// Raw (possibly percent-encoded) query string
        query: String,
    },

    /// Compile a query against a schema definition and print the plan
    Compile {
        /// Schema definition file (.toml or .json)
        #[arg(short, long)]
        schema: PathBuf,

        /// Raw (possibly percent-encoded) query string
        query: String,

        /// Base query file (JSON)
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Request method, read-only methods use the plan cache
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// Print the filters and projection tree of a schema definition
    Schema {
        /// Schema definition file (.toml or .json)
        schema: PathBuf,
    },

    /// Print a default configuration file
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match &cli.command {
        Commands::Parse { query } => {
            let query = decode_query(query)?;
            let ast = parse_query(&query)?;
            print_json(&ast, cli.compact)?;
        }
        Commands::Compile {
            schema,
            query,
            base,
            method,
        } => {
            let schema = load_schema(schema, &config)?;
            let base = match base {
                Some(path) => load_base(path)?,
                None => BaseQuery::default(),
            };
            let method: RequestMethod = method.parse().map_err(anyhow::Error::msg)?;

            let service = QueryService::from_config(schema, &config);
            let plan = service.apply(method, query, &base)?;
            print_json(plan.as_ref(), cli.compact)?;
        }
        Commands::Schema { schema } => {
            let schema = load_schema(schema, &config)?;
            let filters: Vec<_> = schema.filters().collect();
            let summary = serde_json::json!({
                "name": schema.name(),
                "options": schema.options(),
                "filters": filters,
                "ordering": schema.ordering_filters(),
                "search": schema.search_filters(),
                "projection": schema.projection(),
            });
            print_json(&summary, cli.compact)?;
        }
        Commands::Config => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rql={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn load_schema(path: &Path, config: &Config) -> Result<FilterSchema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema definition {:?}", path))?;

    let mut definition = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => SchemaDefinition::from_json(&content)?,
        _ => SchemaDefinition::from_toml(&content)?,
    };
    if let Some(policy) = config.compiler.unknown_filters {
        definition.options.unknown_filters = policy;
    }

    definition
        .build()
        .with_context(|| format!("Invalid schema definition {:?}", path))
}

fn load_base(path: &Path) -> Result<BaseQuery> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read base query {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid base query {:?}", path))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let output = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", output);
    Ok(())
}

//! Operator CLI for chill sites.
//!
//! Provides the `chill` binary for managing a site database (schema, Nodes,
//! Links, Routes, bindings), rendering a path without running the server,
//! and checking content for link cycles.
//!
//! Exit codes: 0 = success, 1 = usage or content error, 3 = I/O or database
//! error.

use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chill_core::{Method, NodeId, ParamSource, RequestParams, RuleTable, Value};
use chill_eval::{EvalConfig, EvalError, Evaluator, MiniJinjaRenderer, RouteResolver, ShortcodeRegistry};
use chill_storage::{ContentStore, OpenOptions, QueryStore, StorageError};

/// Manage and render chill sites.
#[derive(Parser)]
#[command(name = "chill", about = "Manage and render chill sites")]
struct Cli {
    /// Path to the site database file.
    #[arg(long, global = true, default_value = "chill.db")]
    db: String,

    /// Theme folder containing the template and SQL folders.
    #[arg(long, global = true, default_value = ".")]
    theme: PathBuf,

    /// Template folder, relative to the theme.
    #[arg(long, global = true, default_value = "templates")]
    templates: String,

    /// SQL folder, relative to the theme.
    #[arg(long, global = true, default_value = "queries")]
    queries: String,

    /// Accept databases that are not in WAL mode.
    #[arg(long, global = true)]
    testing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the content tables.
    Init,

    /// Drop every content table.
    Drop {
        /// Confirm dropping all content.
        #[arg(long)]
        yes: bool,
    },

    /// Add a Node and print its id.
    AddNode {
        name: String,

        /// Literal value.
        #[arg(long)]
        value: Option<String>,
    },

    /// Link a Node to a child Node.
    AddLink {
        node: i64,
        target: i64,

        /// Key for the child in the parent's value.
        #[arg(long)]
        name: Option<String>,
    },

    /// Bind a path (exact or pattern) and verb to a Node.
    AddRoute {
        path: String,
        node: i64,

        #[arg(long, default_value_t = 0)]
        weight: i64,

        #[arg(long, default_value = "GET")]
        method: String,
    },

    /// Bind a SQL file from the theme to a Node.
    BindQuery { node: i64, name: String },

    /// Bind a template from the theme to a Node.
    BindTemplate { node: i64, name: String },

    /// Delete a Node with its Links and Routes.
    DeleteNode { node: i64 },

    /// Resolve a path and print what the server would send.
    Render {
        path: String,

        #[arg(long, default_value = "GET")]
        method: String,

        /// Request parameter as key=value (repeatable).
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        #[arg(long, default_value_t = 32)]
        max_depth: usize,
    },

    /// Report link cycles and invalid route patterns.
    Check,
}

#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("{0}")]
    Content(String),

    #[error("{0}")]
    Database(String),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Failure::Content(_) => 1,
            Failure::Database(_) => 3,
        }
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NodeNotFound(_)
            | StorageError::QueryNotFound(_)
            | StorageError::ReadOnly
            | StorageError::IntentMismatch { .. } => Failure::Content(err.to_string()),
            _ => Failure::Database(err.to_string()),
        }
    }
}

impl From<EvalError> for Failure {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Storage(err) => err.into(),
            other => Failure::Content(other.to_string()),
        }
    }
}

impl From<chill_core::CoreError> for Failure {
    fn from(err: chill_core::CoreError) -> Self {
        Failure::Content(err.to_string())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match run(&cli) {
        Ok(()) => 0,
        Err(failure) => {
            eprintln!("Error: {}", failure);
            failure.exit_code()
        }
    };
    process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<(), Failure> {
    match &cli.command {
        Commands::Init => {
            let mut store = open(cli, false)?;
            store.init()?;
            println!("initialized {} (schema version {})", cli.db, version(&store)?);
        }
        Commands::Drop { yes } => {
            if !yes {
                return Err(Failure::Content(
                    "refusing to drop all content without --yes".to_string(),
                ));
            }
            open(cli, false)?.drop_tables()?;
            println!("dropped all tables in {}", cli.db);
        }
        Commands::AddNode { name, value } => {
            let id = open(cli, false)?.insert_node(name, value.as_deref())?;
            println!("{}", id);
        }
        Commands::AddLink { node, target, name } => {
            open(cli, false)?.insert_link(NodeId(*node), NodeId(*target), name.as_deref())?;
        }
        Commands::AddRoute {
            path,
            node,
            weight,
            method,
        } => {
            let method = Method::from_str(method)?;
            let stored = open(cli, false)?.insert_route(path, NodeId(*node), *weight, method)?;
            println!("{} {} -> {}", method, stored, node);
        }
        Commands::BindQuery { node, name } => {
            open(cli, false)?.bind_query_to_node(NodeId(*node), name)?;
        }
        Commands::BindTemplate { node, name } => {
            open(cli, false)?.bind_template_to_node(NodeId(*node), name)?;
        }
        Commands::DeleteNode { node } => {
            open(cli, false)?.delete_node(NodeId(*node))?;
        }
        Commands::Render {
            path,
            method,
            params,
            max_depth,
        } => {
            let method = Method::from_str(method)?;
            let output = render(cli, path, method, params, *max_depth)?;
            println!("{}", output);
        }
        Commands::Check => check(cli)?,
    }
    Ok(())
}

fn open(cli: &Cli, read_only: bool) -> Result<ContentStore, Failure> {
    let options = OpenOptions {
        read_only,
        testing: cli.testing,
    };
    ContentStore::open(&cli.db, options).map_err(|e| {
        Failure::Database(format!("failed to open database '{}': {}", cli.db, e))
    })
}

fn version(store: &ContentStore) -> Result<String, Failure> {
    Ok(store
        .schema_version()?
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string()))
}

/// Resolves `path` like the server would and returns the body text. For
/// PUT, PATCH and DELETE, reports the number of changed rows instead.
fn render(
    cli: &Cli,
    path: &str,
    method: Method,
    params: &[(String, String)],
    max_depth: usize,
) -> Result<String, Failure> {
    let store = open(cli, false)?;
    let Some(found) = RouteResolver::new(&store).resolve(path, method)? else {
        return Err(Failure::Content(format!("no route for {} {}", method, path)));
    };

    let params = RequestParams::new()
        .with(ParamSource::Path, found.params)
        .with(
            ParamSource::Query,
            params.iter().map(|(k, v)| (k.clone(), Value::Text(v.clone()))),
        )
        .merge(method)?;

    let theme = &cli.theme;
    let queries = QueryStore::with_theme_dir(theme.join(&cli.queries));
    let templates = MiniJinjaRenderer::from_dir(theme.join(&cli.templates));
    let shortcodes = ShortcodeRegistry::with_defaults();
    let evaluator = Evaluator::new(&store, &queries, &templates, &shortcodes)
        .with_config(EvalConfig { max_depth })
        .with_method(method);

    if method.is_mutating() {
        let result = evaluator.execute(found.node_id, &params)?;
        return Ok(format!("{} row(s) changed", result.changes));
    }

    let value = evaluator.resolve(found.node_id, &params)?;
    if value.is_scalar() {
        return Ok(value.to_string());
    }
    serde_json::to_string_pretty(&value.to_json())
        .map_err(|e| Failure::Content(format!("failed to serialize value: {}", e)))
}

fn check(cli: &Cli) -> Result<(), Failure> {
    let store = open(cli, true)?;
    println!("schema version: {}", version(&store)?);

    let mut problems = 0;
    for cycle in store.find_link_cycles()? {
        let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
        println!("link cycle: {}", ids.join(" -> "));
        problems += 1;
    }
    for method in [Method::Get, Method::Post, Method::Put, Method::Patch, Method::Delete] {
        let (_, rejected) = RuleTable::build(store.pattern_routes(method)?);
        for err in rejected {
            println!("{} route: {}", method, err);
            problems += 1;
        }
    }

    if problems > 0 {
        return Err(Failure::Content(format!("{} problem(s) found", problems)));
    }
    println!("ok");
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

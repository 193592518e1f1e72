use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ratatui::style::Color;
use std::path::PathBuf;
use std::sync::Arc;
use tfleet::config::Config;
use tfleet::context::{ExecContext, OperationContext, Region, ResourceFilter, Selection};
use tfleet::gcp::auth::CredentialStore;
use tfleet::gcp::http::{format_gcp_error, GcpHttpClient};
use tfleet::plugins::{register_builtin, GcpBackend};
use tfleet::resource::{
    CapabilityRegistry, FetchOrchestrator, Resource, ResourceItem, ResourceKind,
};
use tfleet::ui;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Browse GCP resources across several identities and regions at once
#[derive(Parser, Debug)]
#[command(name = "tfleet", version, about, long_about = None)]
struct Args {
    /// Credential selection: `default`, `env` or a configured identity (repeatable)
    #[arg(short, long = "profile", global = true)]
    profiles: Vec<String>,

    /// GCP region to query (repeatable)
    #[arg(short, long = "region", global = true)]
    regions: Vec<String>,

    /// Remember the given profiles and regions in the config file
    #[arg(long, global = true)]
    save: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Run in read-only mode (block all write operations)
    #[arg(long, global = true)]
    readonly: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered services and resource kinds
    Services,
    /// List resources of one kind
    List {
        /// Resource kind, e.g. compute/instances
        kind: ResourceKind,
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Filter, e.g. bucket=my-logs (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        /// Re-fetch every listed item with a get call
        #[arg(long)]
        describe: bool,
    },
    /// Show one resource
    Get {
        kind: ResourceKind,
        id: String,
        /// Where the resource lives: `<region>` or `<profile>/<region>`
        #[arg(long)]
        at: Option<String>,
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
    /// Delete one resource
    Delete {
        kind: ResourceKind,
        id: String,
        #[arg(long)]
        at: Option<String>,
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG directives refine the chosen level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(tracing_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("tfleet {} started with log level: {:?}", tfleet::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("tfleet").join("tfleet.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".tfleet").join("tfleet.log");
    }
    PathBuf::from("tfleet.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();
    let op = operation_context(&args, &mut config)?;
    let readonly = args.readonly || config.readonly;

    tracing::info!(
        "Selections: {:?}, regions: {:?}, readonly: {}",
        op.selections(),
        op.regions(),
        readonly
    );

    let credentials = Arc::new(CredentialStore::new(config.identities.clone()));
    let backend = GcpBackend::new(credentials.clone(), GcpHttpClient::new()?);

    let mut registry = CapabilityRegistry::new();
    register_builtin(&mut registry, &backend, &config);
    let registry = Arc::new(registry);

    let fetcher = FetchOrchestrator::new(registry.clone(), credentials, config.fetch_settings());

    // Ctrl-C cancels in-flight fetches
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling fetches");
                cancel.cancel();
            }
        });
    }
    let base = ExecContext::new().with_cancel(cancel);

    match args.command {
        Command::Services => print_services(&registry),
        Command::List {
            kind,
            pages,
            filters,
            describe,
        } => {
            let base = base.with_filters(parse_filters(&filters)?);
            list(&fetcher, &base, &kind, &op, pages, describe).await
        }
        Command::Get {
            kind,
            id,
            at,
            filters,
        } => {
            let base = base.with_filters(parse_filters(&filters)?);
            let op = target_context(&op, at.as_deref());
            let item = ResourceItem::Plain(Resource::new(kind.clone(), id.as_str(), id.as_str()));
            match fetcher.describe(&base, &kind, &op, &item).await {
                Ok(found) => ui::print_detail(registry.get_renderer(&kind)?.as_ref(), &found),
                Err(e) => ui::print_message(&format_gcp_error(&e), Color::Red),
            }
        }
        Command::Delete {
            kind,
            id,
            at,
            filters,
            yes,
        } => {
            if readonly {
                return ui::print_message("Read-only mode: delete is disabled", Color::Yellow);
            }
            if !yes {
                return ui::print_message(
                    &format!("Refusing to delete {} {} without --yes", kind, id),
                    Color::Yellow,
                );
            }
            let base = base.with_filters(parse_filters(&filters)?);
            let op = target_context(&op, at.as_deref());
            let item = ResourceItem::Plain(Resource::new(kind.clone(), id.as_str(), id.as_str()));
            match fetcher.delete(&base, &kind, &op, &item).await {
                Ok(()) => ui::print_message(&format!("Deleted {} {}", kind, id), Color::Green),
                Err(e) => ui::print_message(&format_gcp_error(&e), Color::Red),
            }
        }
    }
}

/// CLI selections/regions override the config file
fn operation_context(args: &Args, config: &mut Config) -> Result<OperationContext> {
    let selections: Vec<Selection> = if args.profiles.is_empty() {
        config.selections.iter().map(|s| Selection::parse(s)).collect()
    } else {
        args.profiles.iter().map(|s| Selection::parse(s)).collect()
    };
    let regions: Vec<Region> = if args.regions.is_empty() {
        config.regions.iter().map(|r| Region::new(r.as_str())).collect()
    } else {
        args.regions.iter().map(|r| Region::new(r.as_str())).collect()
    };

    let op = OperationContext::new(selections, regions)?;

    if args.save {
        config.set_selections(op.selections())?;
        config.set_regions(op.regions())?;
    }

    Ok(op)
}

fn parse_filters(raw: &[String]) -> Result<Vec<ResourceFilter>> {
    raw.iter()
        .map(|f| {
            ResourceFilter::parse(f)
                .with_context(|| format!("Invalid filter '{}', expected key=value", f))
        })
        .collect()
}

/// Narrow to one pair: `--at region` or `--at profile/region`, else the first pair
fn target_context(op: &OperationContext, at: Option<&str>) -> OperationContext {
    let first_selection = op.selections()[0].clone();
    match at {
        None => OperationContext::single(first_selection, op.regions()[0].clone()),
        Some(at) => match at.split_once('/') {
            Some((selection, region)) => {
                OperationContext::single(Selection::parse(selection), Region::new(region))
            }
            None => OperationContext::single(first_selection, Region::new(at)),
        },
    }
}

fn print_services(registry: &CapabilityRegistry) -> Result<()> {
    for (category, kinds) in registry.list_services_by_category() {
        println!("{}", category);
        for kind in kinds {
            let name = registry
                .entry(&kind)
                .map(|e| e.display_name.clone())
                .unwrap_or_default();
            println!("  {:<24} {}", kind.to_string(), name);
        }
    }
    Ok(())
}

async fn list(
    fetcher: &FetchOrchestrator,
    base: &ExecContext,
    kind: &ResourceKind,
    op: &OperationContext,
    pages: usize,
    describe: bool,
) -> Result<()> {
    let renderer = fetcher.registry().get_renderer(kind)?;

    let mut result = match fetcher.load_resources(base, kind, op).await {
        Ok(result) => result,
        Err(e) => return ui::print_message(&format_gcp_error(&e), Color::Red),
    };

    let mut fetched_pages = 1;
    while fetched_pages < pages && result.has_more() {
        match fetcher.load_next_page(base, kind, op, &result.page_tokens).await {
            Ok(next) => result.append(next),
            Err(e) => {
                result.partial_errors.push(format_gcp_error(&e));
                break;
            }
        }
        fetched_pages += 1;
    }

    if describe && !result.resources.is_empty() {
        match fetcher.describe_all(base, kind, op, &result.resources).await {
            Ok(described) => {
                result.resources = described.resources;
                result.partial_errors.extend(described.partial_errors);
            }
            Err(e) => result.partial_errors.push(format_gcp_error(&e)),
        }
    }

    ui::print_table(renderer.as_ref(), &result, fetched_pages)
}

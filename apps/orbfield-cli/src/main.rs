use anyhow::Context;
use clap::{Parser, Subcommand};
use orbfield_bundle::{ModuleRequest, ModuleScript};
use orbfield_common::ModulePath;
use orbfield_kernel::{Delivery, TaskScheduler};
use orbfield_stream::{DirectoryFetcher, Export, ModuleLoader, ModuleRegistry};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orbfield-cli", about = "CLI tool for orbfield module operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Print the script the server would send for a module
    Script {
        /// Module path as it would follow `/require/`
        path: String,
        /// Directory holding module sources
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Print only the entity tag
        #[arg(long)]
        etag: bool,
    },
    /// Resolve the module graph reachable from an entry module
    Graph {
        /// Entry module, e.g. `src/main` or `src/main.js`
        entry: String,
        /// Directory holding module sources
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Emit the graph as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct GraphReport {
    entry: ModulePath,
    modules: BTreeMap<ModulePath, Vec<ModulePath>>,
    fetches: usize,
    joins: usize,
}

fn load_graph(root: PathBuf, entry: &str) -> anyhow::Result<GraphReport> {
    let scheduler = TaskScheduler::new();
    let fetcher = DirectoryFetcher::new(root, scheduler.clone());
    let loader = ModuleLoader::new(ModuleRegistry::new(), fetcher, scheduler.clone());

    let got: Rc<RefCell<Option<_>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&got);
    loader
        .require(None, entry)
        .resolve(Delivery::new(move |outcome| *sink.borrow_mut() = Some(outcome)));
    let ticks = scheduler.run_until_idle();
    tracing::debug!(ticks, jobs = scheduler.executed(), "scheduler idle");

    let outcome = got.take().context("module load never completed")?;
    let module: Export = outcome.with_context(|| format!("failed to load {entry}"))?;
    let stats = loader.registry().stats();
    Ok(GraphReport {
        entry: module.path().clone(),
        modules: module.graph(),
        fetches: stats.fetches,
        joins: stats.joins,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("orbfield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", orbfield_common::crate_info());
            println!("kernel: {}", orbfield_kernel::crate_info());
            println!("stream: {}", orbfield_stream::crate_info());
            println!("bundle: {}", orbfield_bundle::crate_info());
        }
        Commands::Script { path, root, etag } => {
            let request = ModuleRequest::parse(&path)?;
            let script = ModuleScript::load(&request, &root)
                .with_context(|| format!("failed to assemble {path}"))?;
            if etag {
                println!("{}", script.etag());
            } else {
                print!("{}", script.render());
            }
        }
        Commands::Graph { entry, root, json } => {
            let report = load_graph(root, &entry)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Module graph from {}:", report.entry);
                for (module, imports) in &report.modules {
                    println!("  {module}");
                    for import in imports {
                        println!("    -> {import}");
                    }
                }
                println!(
                    "{} modules, {} fetches, {} joins",
                    report.modules.len(),
                    report.fetches,
                    report.joins
                );
            }
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crosswalk_core::{
    Confidence, EdgeId, EdgeStatus, FrameworkCode, FrameworkPair, ItemKey, NewEdge,
    RelationshipKind,
};
use crosswalk_query::{coverage, translate, FactsError, MetricFacts};
use crosswalk_storage::{CrosswalkStore, EdgeFilter};
use crosswalk_validator::{CancelToken, Validator, ValidatorConfig};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod render;
mod seed;

#[derive(Parser)]
#[command(name = "crosswalk")]
#[command(about = "Cross-standard disclosure mapping and consistency toolkit", long_about = None)]
struct Cli {
    /// SQLite database path; falls back to CROSSWALK_DB, then crosswalk.db.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consistency validator and render its report
    Validate {
        /// Framework pairs in scope, e.g. SDG:GRI,GRI:TSRS
        #[arg(long, default_value = "SDG:GRI,GRI:TSRS,SDG:ESRS")]
        pairs: String,
        /// Frameworks whose unmapped items should be flagged as orphans
        #[arg(long)]
        fully_mapped: Option<String>,
        /// Also flag equivalence chains with no explicit closing edge
        #[arg(long)]
        require_closure: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// What does an item correspond to in another framework
    Translate {
        /// Source item, e.g. SDG:13.2
        #[arg(long)]
        from: String,
        /// Target framework code, e.g. GRI
        #[arg(long)]
        to: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Disclosure coverage of a company against a framework
    Coverage {
        #[arg(long)]
        company: String,
        #[arg(long)]
        framework: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Curate mapping edges
    Edge {
        #[command(subcommand)]
        action: EdgeCommands,
    },
    /// Inspect the framework registry
    Item {
        #[command(subcommand)]
        action: ItemCommands,
    },
    /// Load the built-in demonstration registry and crosswalk
    Seed,
}

#[derive(Subcommand)]
enum EdgeCommands {
    Add {
        /// Source item, e.g. SDG:13.2
        #[arg(long)]
        from: String,
        /// Target item, e.g. GRI:305-5
        #[arg(long)]
        to: String,
        #[arg(long)]
        kind: String,
        #[arg(long, default_value = "derived")]
        confidence: String,
        #[arg(long, default_value = "")]
        provenance: String,
    },
    Retract {
        #[arg(long)]
        id: i64,
    },
    List {
        /// Restrict to one framework pair, e.g. SDG:GRI
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    List {
        #[arg(long)]
        framework: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Adapter exposing the store's company metrics through the read-only fact
/// seam the query layer expects.
struct StoreFacts<'a>(&'a CrosswalkStore);

impl MetricFacts for StoreFacts<'_> {
    fn reported_items(&self, company_id: &str) -> Result<BTreeSet<ItemKey>, FactsError> {
        self.0
            .reported_items(company_id)
            .map_err(|err| FactsError::Backend(err.to_string()))
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let store = open_store(cli.db.as_deref())?;

    match cli.command {
        Commands::Validate {
            pairs,
            fully_mapped,
            require_closure,
            format,
            timeout_secs,
        } => {
            let mut config = ValidatorConfig::for_pairs(parse_pairs(&pairs)?);
            if let Some(raw) = fully_mapped {
                config.fully_mapped = parse_frameworks(&raw)?;
            }
            config.require_equivalence_closure = require_closure;

            let cancel = match timeout_secs {
                Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };

            match Validator::new(config).run_over_store(&store, &cancel) {
                Ok(report) => {
                    match format {
                        OutputFormat::Text => render::print_report_text(&report),
                        OutputFormat::Json => {
                            println!("{}", report.canonical_json().context("serialize report")?)
                        }
                    }
                    if report.has_errors() {
                        std::process::exit(1);
                    }
                }
                Err(err) => {
                    eprintln!("run failed: {err} (0 findings produced)");
                    std::process::exit(2);
                }
            }
        }
        Commands::Translate { from, to, format } => {
            let source: ItemKey = from.parse()?;
            let target: FrameworkCode = to.parse()?;
            let snapshot = store.snapshot(&all_pairs())?;
            let translations = translate(&snapshot, &source, target)?;
            match format {
                OutputFormat::Text => render::print_translations_text(&source, target, &translations),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&translations).context("serialize translations")?
                ),
            }
        }
        Commands::Coverage {
            company,
            framework,
            format,
        } => {
            let framework: FrameworkCode = framework.parse()?;
            let snapshot = store.snapshot(&all_pairs())?;
            let facts = StoreFacts(&store);
            let report = coverage(&snapshot, &facts, &company, framework)?;
            match format {
                OutputFormat::Text => render::print_coverage_text(&report),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize coverage")?
                ),
            }
        }
        Commands::Edge { action } => match action {
            EdgeCommands::Add {
                from,
                to,
                kind,
                confidence,
                provenance,
            } => {
                let edge = NewEdge::new(
                    from.parse()?,
                    to.parse()?,
                    kind.parse::<RelationshipKind>()?,
                    confidence.parse::<Confidence>()?,
                    provenance,
                )?;
                let id = store.add_edge(&edge).context("add edge")?;
                println!("added edge #{id}: {} -[{}]-> {}", edge.source, edge.kind, edge.target);
            }
            EdgeCommands::Retract { id } => {
                store.retract_edge(EdgeId(id)).context("retract edge")?;
                println!("retracted edge #{id}");
            }
            EdgeCommands::List { pair, status } => {
                let mut filter = EdgeFilter::default();
                if let Some(raw) = pair {
                    filter.pair = Some(raw.parse::<FrameworkPair>()?);
                }
                if let Some(raw) = status {
                    filter.status = Some(raw.parse::<EdgeStatus>()?);
                }
                let edges = store.list_edges(&filter)?;
                render::print_edges_text(&edges);
            }
        },
        Commands::Item { action } => match action {
            ItemCommands::List { framework } => {
                let framework: FrameworkCode = framework.parse()?;
                let items = store.list_items(framework)?;
                render::print_items_text(framework, &items);
            }
        },
        Commands::Seed => {
            let summary = seed::seed(&store)?;
            println!(
                "seeded {} items and {} edges",
                summary.items, summary.edges
            );
        }
    }

    Ok(())
}

fn open_store(path: Option<&std::path::Path>) -> Result<CrosswalkStore> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::var("CROSSWALK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("crosswalk.db")),
    };
    tracing::debug!(path = %path.display(), "opening store");
    CrosswalkStore::open(&path).with_context(|| format!("open database {}", path.display()))
}

fn parse_pairs(raw: &str) -> Result<Vec<FrameworkPair>> {
    let mut pairs = Vec::new();
    for chunk in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        pairs.push(chunk.parse::<FrameworkPair>()?);
    }
    anyhow::ensure!(!pairs.is_empty(), "no framework pairs given");
    Ok(pairs)
}

fn parse_frameworks(raw: &str) -> Result<BTreeSet<FrameworkCode>> {
    let mut frameworks = BTreeSet::new();
    for chunk in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        frameworks.insert(chunk.parse::<FrameworkCode>()?);
    }
    Ok(frameworks)
}

/// Every supported pair; translate/coverage want the whole graph in view.
fn all_pairs() -> Vec<FrameworkPair> {
    let mut pairs = Vec::new();
    for (i, a) in FrameworkCode::ALL.iter().enumerate() {
        for b in FrameworkCode::ALL.iter().skip(i + 1) {
            if let Ok(pair) = FrameworkPair::new(*a, *b) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

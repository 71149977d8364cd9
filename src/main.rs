use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod controller;
mod derived;
mod error;
mod export;
mod filters;
mod loader;
mod models;
mod normalize;
mod queue;
mod report;
mod session;

use api::HttpTransport;
use config::ApiConfig;
use controller::Dashboard;
use filters::FilterState;

#[derive(Parser)]
#[command(name = "churn-radar")]
#[command(about = "Client for the churn-risk analytics API", long_about = None)]
struct Cli {
    /// Backend host; `/api/churn` is appended. Falls back to CHURN_API_BASE.
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

/// Filter inputs are taken as text and sanitized, never rejected.
#[derive(Args, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    mrr_min: Option<String>,
    #[arg(long)]
    mrr_max: Option<String>,
    #[arg(long)]
    risco_min: Option<String>,
    #[arg(long)]
    risco_max: Option<String>,
    #[arg(long)]
    renovacao_min: Option<String>,
    #[arg(long)]
    renovacao_max: Option<String>,
    /// State (UF); "Todas" means no filter
    #[arg(long)]
    uf: Option<String>,
    /// Risk threshold of the prioritized view (same field as --risco-min)
    #[arg(long)]
    threshold: Option<String>,
    /// Segment, UF or revenue band to focus on
    #[arg(long)]
    category: Option<String>,
    /// segmento | uf | faixa
    #[arg(long)]
    dim: Option<String>,
    /// Renewal window label, e.g. "0–30"
    #[arg(long)]
    window: Option<String>,
}

impl FilterArgs {
    fn to_state(&self) -> FilterState {
        let mut state = FilterState::default();
        let edits = [
            ("mrr_min", &self.mrr_min),
            ("mrr_max", &self.mrr_max),
            ("risco_min", &self.risco_min),
            ("risco_max", &self.risco_max),
            ("renovacao_min", &self.renovacao_min),
            ("renovacao_max", &self.renovacao_max),
            ("uf", &self.uf),
            ("threshold", &self.threshold),
            ("dim", &self.dim),
            ("category", &self.category),
            ("window", &self.window),
        ];
        for (key, value) in edits {
            if let Some(value) = value {
                state.apply(key, value);
            }
        }
        state
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load everything once and print a summary
    Snapshot {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Fetch one page of the risk queue
    Queue {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long)]
        json: bool,
    },
    /// Walk the risk queue in batches up to the cap
    Walk {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "churn-report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Export the prioritized queue as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Interactive session reading `key=value`, next, prev, refresh, quit
    Watch {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("churn_radar=info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ApiConfig::resolve(cli.api_base.as_deref(), cli.timeout_secs);
    let transport = HttpTransport::new(&config).context("failed to build HTTP client")?;
    info!(root = transport.root(), "using analytics API");

    match cli.command {
        Commands::Snapshot { filters, top } => {
            let mut dash = Dashboard::new(config, filters.to_state());
            dash.refresh(&transport).await;
            print!("{}", report::summary(&dash, top));
        }
        Commands::Queue {
            filters,
            page,
            json,
        } => {
            let mut dash = Dashboard::new(config, filters.to_state());
            if !dash.load_page(&transport, page).await {
                anyhow::bail!("page {page} is out of range");
            }
            if let Some(err) = dash.error.take() {
                anyhow::bail!(err);
            }
            let view = dash.queue_view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!(
                    "Página {}/{} ({} no total, {} na visão):",
                    dash.pager.page + 1,
                    dash.pager.page_count().max(1),
                    dash.pager.total,
                    view.len()
                );
                for record in &view {
                    println!("- {}", report::queue_line(record));
                }
            }
        }
        Commands::Walk { filters, json } => {
            let dash = Dashboard::new(config, filters.to_state());
            let params = dash.params(0, dash.config.batch_size);
            let walk = queue::fetch_all(
                &transport,
                &params,
                dash.config.batch_size,
                dash.config.batch_cap,
            )
            .await
            .context("failed to walk the risk queue")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&walk)?);
            } else {
                println!(
                    "Loaded {} of {} customers in {} requests.",
                    walk.records.len(),
                    walk.total,
                    walk.requests
                );
            }
        }
        Commands::Report { filters, out, top } => {
            let mut dash = Dashboard::new(config, filters.to_state());
            dash.refresh(&transport).await;
            let report = report::build_report(&dash, chrono::Utc::now(), top);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
            if let Some(err) = &dash.error {
                warn!(error = %err, "report written without the risk queue");
            }
        }
        Commands::Export { filters, out } => {
            let mut dash = Dashboard::new(config, filters.to_state());
            dash.refresh(&transport).await;
            if let Some(err) = dash.error.take() {
                anyhow::bail!(err);
            }
            let view = dash.queue_view();
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let written = export::write_csv(&view, file)?;
                    println!("Exported {written} rows to {}.", path.display());
                }
                None => {
                    export::write_csv(&view, std::io::stdout().lock())?;
                }
            }
        }
        Commands::Watch { filters, top } => {
            let mut dash = Dashboard::new(config, filters.to_state());
            dash.refresh(&transport).await;
            print!("{}", report::summary(&dash, top));
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session::run(&mut dash, &transport, stdin, |dash| {
                print!("{}", report::summary(dash, top));
            })
            .await?;
        }
    }

    Ok(())
}

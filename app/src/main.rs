use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use common::{
    config::{BenchmarkSpec, GraphSpec, MissingPolicy},
    persist,
};
use console::style;
use eyre::Result;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod bench;

const MODULES: &[&str] = &["common"];

#[derive(Parser)]
#[command(about = "Benchmark PDDL planners and plot their results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    /// Extra tracing directives, ie. `common=debug`
    #[arg(long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved benchmark results
    Ls {
        #[arg(short, long, default_value = "benchmarks")]
        results_dir: PathBuf,
    },
    /// Run benchmarks, load saved results and plot them
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// YAML config file, command line options are added to it
    #[arg(short, long)]
    pub config_file: Option<String>,
    /// `domain=<path>;planner=<name>;[args=<args>;][min=<n>;][max=<n>;]`
    #[arg(short, long)]
    pub bench: Vec<BenchmarkSpec>,
    /// Saved result file, or a folder of them
    #[arg(short, long)]
    pub load: Vec<PathBuf>,
    /// `domain=<group>;variable=<planLength|timeSpent>;planner=<reference>;`
    #[arg(short, long)]
    pub graph: Vec<GraphSpec>,
    /// Save every result under the results dir
    #[arg(short, long, default_value_t = false)]
    pub save: bool,
    /// Folder that benchmark and load paths are relative to
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Plot missing results as `zero` or `exclude` them
    #[arg(long)]
    pub missing: Option<MissingPolicy>,
    /// Do not generate plots
    #[arg(long, default_value_t = false)]
    pub skip_plot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("planbench={log_level}"));
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    match args.command {
        Commands::Ls { results_dir } => list_benchmarks(&results_dir).await?,
        Commands::Run(run_args) => {
            if let Err(err) = bench::run_benchmark(run_args, args.no_progress).await {
                error!("{err:#?}");
                return Err(err);
            }
        }
    };

    Ok(())
}

async fn list_benchmarks(results_dir: &Path) -> Result<()> {
    for ((planner, group), files) in persist::list(results_dir).await? {
        println!(
            "{} -> {} ({} results)",
            style(planner).bold(),
            group,
            files.len()
        );
    }
    Ok(())
}

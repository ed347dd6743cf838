use common::{
    bench::{CommandPlanner, SweepEvent},
    config::Config,
    context::RunContext,
    layout::planner_short_name,
    plot::{PythonPlot, RenderSink},
};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::read_to_string;
use tracing::debug;

use crate::RunArgs;

pub async fn run_benchmark(args: RunArgs, no_progress: bool) -> Result<()> {
    let mut config = match &args.config_file {
        Some(config_file) => Config::from_yaml(
            &read_to_string(config_file)
                .await
                .context(format!("Reading {config_file}"))?,
        )?,
        None => Config::default(),
    };

    config.benches.extend(args.bench);
    config.loads.extend(args.load);
    config.graphs.extend(args.graph);
    config.save |= args.save;
    if let Some(root) = args.root {
        config.settings.root = root;
    }
    if let Some(missing) = args.missing {
        config.settings.missing = missing;
    }
    let config = config.resolve();
    debug!(
        "benches={} loads={} graphs={} save={}",
        config.benches.len(),
        config.loads.len(),
        config.graphs.len(),
        config.save
    );

    let mut context = RunContext::from(config);
    let planner = CommandPlanner::from_settings(&context.settings);
    let plot = PythonPlot::new(&context.settings.plot_dir);
    let sink: Option<&dyn RenderSink> = if args.skip_plot { None } else { Some(&plot) };

    let style = ProgressStyle::with_template("{msg:20} [{bar:40}] {pos}/{len} ({elapsed})")?
        .progress_chars("=> ");
    let mut bar: Option<ProgressBar> = None;
    let summary = context
        .run(&planner, sink, |spec, event| {
            if no_progress {
                return;
            }
            match event {
                SweepEvent::Started { estimate } => {
                    if let Some(previous) = bar.take() {
                        previous.finish();
                    }
                    let next = ProgressBar::new(estimate).with_style(style.clone());
                    next.set_message(planner_short_name(&spec.planner).to_owned());
                    bar = Some(next);
                }
                SweepEvent::Problem { index, found_plan } => {
                    if let Some(bar) = &bar {
                        if !found_plan {
                            bar.println(format!("No plan for problem {index}"));
                        }
                        bar.inc(1);
                    }
                }
            }
        })
        .await;
    if let Some(bar) = bar {
        bar.finish();
    }

    if context.save && summary.records_swept > 0 {
        println!(
            "Results saved in folder: {}",
            context.settings.results_dir.display()
        );
    }
    if summary.graphs_rendered > 0 {
        println!(
            "Plots created in folder: {}",
            context.settings.plot_dir.display()
        );
    }
    Ok(())
}

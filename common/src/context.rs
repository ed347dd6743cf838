use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::{
    bench::{Planner, SweepEvent, sweep},
    config::{BenchmarkSpec, Config, GraphSpec, Settings},
    persist,
    plot::{RenderSink, build_graph},
    record::ResultRecord,
};

/// Everything queued for one run, plus the results gathered so far.
#[derive(Debug, Default, Clone)]
pub struct RunContext {
    pub settings: Settings,
    pub benches: Vec<BenchmarkSpec>,
    pub loads: Vec<PathBuf>,
    pub graphs: Vec<GraphSpec>,
    pub results: Vec<ResultRecord>,
    pub save: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub sweeps_failed: usize,
    pub records_swept: usize,
    pub records_loaded: usize,
    pub loads_failed: usize,
    pub graphs_rendered: usize,
    pub graphs_failed: usize,
}

impl From<Config> for RunContext {
    fn from(config: Config) -> Self {
        Self {
            settings: config.settings,
            benches: config.benches,
            loads: config.loads,
            graphs: config.graphs,
            results: Vec::new(),
            save: config.save,
        }
    }
}

impl RunContext {
    /// Runs every sweep, then loads every record, then renders every graph.
    /// A failing sweep, load or graph is logged and the run moves on.
    pub async fn run(
        &mut self,
        planner: &dyn Planner,
        sink: Option<&dyn RenderSink>,
        on_event: impl FnMut(&BenchmarkSpec, SweepEvent),
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        self.run_benches(planner, on_event, &mut summary).await;
        self.load_records(&mut summary).await;
        match sink {
            Some(sink) => self.render_graphs(sink, &mut summary).await,
            None => debug!("Skipping {} graphs", self.graphs.len()),
        }
        info!("{summary:?}");
        summary
    }

    pub async fn run_benches(
        &mut self,
        planner: &dyn Planner,
        mut on_event: impl FnMut(&BenchmarkSpec, SweepEvent),
        summary: &mut RunSummary,
    ) {
        for spec in &self.benches {
            let results = sweep(spec, planner, &self.settings, self.save, |event| {
                on_event(spec, event)
            })
            .await;
            match results {
                Ok(results) => {
                    summary.records_swept += results.len();
                    self.results.extend(results);
                }
                Err(err) => {
                    error!("Benchmark of {spec} failed: {err:#}");
                    summary.sweeps_failed += 1;
                }
            }
        }
    }

    pub async fn load_records(&mut self, summary: &mut RunSummary) {
        let report = persist::load(&self.settings.root, &self.loads).await;
        summary.records_loaded += report.records.len();
        summary.loads_failed += report.failed.len();
        self.results.extend(report.records);
    }

    pub async fn render_graphs(&self, sink: &dyn RenderSink, summary: &mut RunSummary) {
        for spec in &self.graphs {
            let Some(graph) = build_graph(spec, &self.results, self.settings.missing) else {
                debug!("No results to plot for {}", spec.domain);
                continue;
            };
            match sink.render(&graph).await {
                Ok(()) => summary.graphs_rendered += 1,
                Err(err) => {
                    error!("Plotting {} failed: {err:#}", graph.title);
                    summary.graphs_failed += 1;
                }
            }
        }
    }
}

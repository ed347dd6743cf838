use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result, bail, eyre};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    config::{GraphSpec, MissingPolicy},
    record::ResultRecord,
};

pub const X_LABEL: &str = "Problem index";

/// One planner's values, aligned on the problem indices of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub x: Vec<u32>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub title: String,
    pub domain: String,
    pub variable: String,
    /// Planner whose values order the x-axis
    pub reference: String,
    pub x_label: String,
    pub y_label: String,
    /// Problem indices sorted by the reference planner's value
    pub x: Vec<u32>,
    pub series: Vec<Series>,
}

/// Builds one series per planner with results on `spec.domain`.
///
/// The x-axis holds the problem indices solved by the reference planner,
/// sorted ascending by its value of `spec.variable`. When the requested
/// reference planner has no results at all, the first planner by name is used
/// instead. Returns `None` when there are no records.
pub fn build_graph(
    spec: &GraphSpec,
    records: &[ResultRecord],
    missing: MissingPolicy,
) -> Option<Graph> {
    let planners: BTreeSet<&str> = records.iter().map(|r| r.planner_short_name()).collect();
    let first = *planners.first()?;
    let reference = if planners.contains(spec.planner.as_str()) {
        spec.planner.as_str()
    } else {
        warn!(
            "Planner {} has no results, ordering x-axis by {first}",
            spec.planner
        );
        first
    };

    let variable = spec.variable();
    let mut values: BTreeMap<&str, HashMap<u32, f64>> = BTreeMap::new();
    for record in records {
        if record.benchmark_group().as_deref() != Some(spec.domain.as_str()) {
            continue;
        }
        let Some(value) = record.evaluated_value(&variable) else {
            continue;
        };
        values
            .entry(record.planner_short_name())
            .or_default()
            .insert(record.problem_index, value);
    }
    debug!(
        "Graph {} of {} has {} planners",
        spec.domain,
        spec.variable,
        values.len()
    );

    let x = values
        .get(reference)
        .map(|by_index| {
            by_index
                .iter()
                .sorted_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(b.0)))
                .map(|(index, _)| *index)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let series = values
        .iter()
        .map(|(planner, by_index)| {
            let (xs, ys): (Vec<u32>, Vec<f64>) = x
                .iter()
                .filter_map(|index| match (by_index.get(index), missing) {
                    (Some(value), _) => Some((*index, *value)),
                    (None, MissingPolicy::Zero) => Some((*index, 0.0)),
                    (None, MissingPolicy::Exclude) => None,
                })
                .unzip();
            Series {
                label: planner.to_string(),
                x: xs,
                y: ys,
            }
        })
        .collect();

    Some(Graph {
        title: format!("Benchmarks results: {}", spec.domain),
        domain: spec.domain.clone(),
        variable: spec.variable.clone(),
        reference: reference.to_owned(),
        x_label: X_LABEL.to_owned(),
        y_label: variable.label(),
        x,
        series,
    })
}

/// Turns a [`Graph`] into a plot.
#[async_trait::async_trait]
pub trait RenderSink: Send + Sync {
    async fn render(&self, graph: &Graph) -> Result<()>;
}

/// Hands graphs to `plots/planner_series.py` as JSON.
#[derive(Debug, Clone)]
pub struct PythonPlot {
    pub plot_dir: PathBuf,
    pub script: PathBuf,
}

impl PythonPlot {
    pub fn new(plot_dir: impl Into<PathBuf>) -> Self {
        Self {
            plot_dir: plot_dir.into(),
            script: PathBuf::from("plots/planner_series.py"),
        }
    }

    /// Writes the plot data, returning the data file and the plot file paths.
    pub fn write_plot_data(&self, graph: &Graph) -> Result<(PathBuf, PathBuf)> {
        let plot_data_dir = self.plot_dir.join("plot_data");
        if !plot_data_dir.exists() {
            fs::create_dir_all(&plot_data_dir)
                .context(format!("Create {}", plot_data_dir.display()))?;
        }

        let stem = format!("{}-{}-{}", graph.domain, graph.variable, graph.reference);
        let data_path = plot_data_dir.join(format!("{stem}.json"));
        fs::write(&data_path, serde_json::to_string(graph)?)?;
        Ok((data_path, self.plot_dir.join(format!("{stem}.pdf"))))
    }
}

#[async_trait::async_trait]
impl RenderSink for PythonPlot {
    async fn render(&self, graph: &Graph) -> Result<()> {
        let (data_path, filepath) = self.write_plot_data(graph)?;
        let args = [
            path_arg(&self.script)?,
            "--data",
            path_arg(&data_path)?,
            "--filepath",
            path_arg(&filepath)?,
        ];
        debug!("python3 {}", args.join(" "));

        let status = Command::new("python3")
            .args(args)
            .status()
            .await
            .context("Running python3")?;
        if !status.success() {
            bail!("Plotting {} exited with {status}", data_path.display());
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| eyre!("Invalid path for plot: {:?}", path))
}

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
    time::Duration,
};

use eyre::{Context, Result};
use regex::Regex;
use thiserror::Error;
use tokio::{
    fs::{read_dir, try_exists},
    process::Command,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::{BenchmarkSpec, Settings},
    layout::DomainLayout,
    persist,
    record::ResultRecord,
};

pub const STATS_MARKER: &str = "STATS:";

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TIME=(?P<time>[^;]*)").expect("valid TIME pattern"));
static PLAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PLAN=(?P<plan>[^;]*)").expect("valid PLAN pattern"));

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Command failed with return code {}", .code.map_or_else(|| "none".to_owned(), |c| c.to_string()))]
    Failed { code: Option<i32>, stderr: String },
    #[error("Command timed out after {0}s")]
    TimedOut(u64),
    #[error("Command is empty")]
    EmptyCommand,
    #[error("Could not start command: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("stats block has no {0} field")]
    MissingField(&'static str),
    #[error("invalid {key} value `{value}` in stats block")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub time_ms: f64,
    pub plan_length: u64,
}

/// Extracts `TIME=<float>;` and `PLAN=<int>;` from the text following the
/// first `STATS:` marker. `None` when the planner printed no stats block.
pub fn parse_stats(output: &str) -> Result<Option<Stats>, StatsError> {
    let Some((_, after)) = output.split_once(STATS_MARKER) else {
        return Ok(None);
    };
    let block = after.split(STATS_MARKER).next().unwrap_or(after);

    let time = capture(&TIME_RE, block, "time", "TIME")?;
    let plan = capture(&PLAN_RE, block, "plan", "PLAN")?;
    Ok(Some(Stats {
        time_ms: time.parse().map_err(|_| StatsError::InvalidValue {
            key: "TIME",
            value: time.to_owned(),
        })?,
        plan_length: plan.parse().map_err(|_| StatsError::InvalidValue {
            key: "PLAN",
            value: plan.to_owned(),
        })?,
    }))
}

fn capture<'a>(
    re: &Regex,
    block: &'a str,
    group: &str,
    key: &'static str,
) -> Result<&'a str, StatsError> {
    re.captures(block)
        .and_then(|caps| caps.name(group))
        .map(|m| m.as_str().trim())
        .ok_or(StatsError::MissingField(key))
}

/// External planner, run once per problem file.
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    /// Runs the planner of `spec` on `problem` and returns its standard output
    async fn run(&self, spec: &BenchmarkSpec, problem: &Path) -> Result<String, InvocationError>;
}

/// Runs the planner as a process built from a command template.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    pub template: String,
    pub root: PathBuf,
    pub timeout: Option<Duration>,
}

impl CommandPlanner {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            template: settings.command.clone(),
            root: settings.root.clone(),
            timeout: settings.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Substitutes `{planner}`, `{domain}` and `{problem}` in every template
    /// token, a lone `{args}` token expands to the whitespace separated args.
    pub fn command_line(&self, spec: &BenchmarkSpec, problem: &Path) -> Vec<String> {
        let problem = problem.to_string_lossy();
        let mut argv = Vec::new();
        for token in self.template.split_whitespace() {
            if token == "{args}" {
                argv.extend(spec.args.split_whitespace().map(str::to_owned));
                continue;
            }
            argv.push(
                token
                    .replace("{planner}", &spec.planner)
                    .replace("{domain}", &spec.domain)
                    .replace("{problem}", &problem)
                    .replace("{args}", &spec.args),
            );
        }
        argv
    }
}

#[async_trait::async_trait]
impl Planner for CommandPlanner {
    async fn run(&self, spec: &BenchmarkSpec, problem: &Path) -> Result<String, InvocationError> {
        let argv = self.command_line(spec, problem);
        let (program, args) = argv.split_first().ok_or(InvocationError::EmptyCommand)?;
        debug!("program={} args={}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| InvocationError::TimedOut(limit.as_secs()))??,
            None => command.output().await?,
        };

        if !output.status.success() {
            return Err(InvocationError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Problem file names of a benchmark folder, `p<index>.pddl` with the index
/// zero padded to the digit count of the number of problems.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemTemplate {
    pub folder: PathBuf,
    pub width: usize,
    pub count: usize,
}

impl ProblemTemplate {
    /// `folder` is relative to `root`. Every entry but the domain file is
    /// counted as a problem.
    pub async fn for_folder(root: &Path, folder: &Path) -> Result<Self> {
        let full_path = root.join(folder);
        let mut entries = read_dir(&full_path)
            .await
            .context(format!("Read benchmark folder {}", full_path.display()))?;
        let mut count = 0usize;
        while entries.next_entry().await?.is_some() {
            count += 1;
        }
        let count = count.saturating_sub(1);
        Ok(Self {
            folder: folder.to_path_buf(),
            width: digit_count(count),
            count,
        })
    }

    pub fn path(&self, index: u32) -> PathBuf {
        self.folder
            .join(format!("p{index:0width$}.pddl", width = self.width))
    }
}

/// Number of decimal digits of `n`, 0 for 0.
pub fn digit_count(mut n: usize) -> usize {
    let mut digits = 0;
    while n >= 1 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    /// Sweep begins, `estimate` is the expected number of problems
    Started { estimate: u64 },
    Problem { index: u32, found_plan: bool },
}

/// Runs the planner of `spec` on consecutive problem files starting at
/// `index_min`. Stops after `index_max` or at the first problem file that
/// does not exist, even when later indices exist. Failed runs and runs
/// without stats produce no record.
pub async fn sweep(
    spec: &BenchmarkSpec,
    planner: &dyn Planner,
    settings: &Settings,
    save_results: bool,
    mut on_event: impl FnMut(SweepEvent),
) -> Result<Vec<ResultRecord>> {
    info!("Start benchmark of {spec}");
    let layout = DomainLayout::new(&spec.domain);
    let template = ProblemTemplate::for_folder(&settings.root, &layout.benchmark_folder).await?;

    let last = spec
        .index_max
        .map_or(template.count as u64, |max| (max as u64).min(template.count as u64));
    on_event(SweepEvent::Started {
        estimate: (last + 1).saturating_sub(spec.index_min as u64),
    });

    let mut results = Vec::new();
    let mut counter = spec.index_min;
    while spec.contains(counter) {
        let problem = template.path(counter);
        if !try_exists(settings.root.join(&problem)).await? {
            debug!("{} does not exist, ending sweep", problem.display());
            break;
        }

        let record = run_problem(spec, planner, &problem, counter).await;
        on_event(SweepEvent::Problem {
            index: counter,
            found_plan: record.is_some(),
        });

        if let Some(record) = record {
            if save_results {
                let saved =
                    persist::save(&settings.results_dir, std::slice::from_ref(&record)).await;
                if let Err(err) = saved {
                    error!("Failed to save result of problem {counter}: {err:#}");
                }
            }
            results.push(record);
        }

        match counter.checked_add(1) {
            Some(next) => counter = next,
            None => break,
        }
    }

    info!(
        "Benchmark of {} on {} produced {} results",
        spec.planner,
        spec.domain,
        results.len()
    );
    Ok(results)
}

async fn run_problem(
    spec: &BenchmarkSpec,
    planner: &dyn Planner,
    problem: &Path,
    index: u32,
) -> Option<ResultRecord> {
    let output = match planner.run(spec, problem).await {
        Ok(output) => output,
        Err(err) => {
            error!("Problem {}: {err}", problem.display());
            if let InvocationError::Failed { stderr, .. } = &err {
                debug!("stderr: {stderr}");
            }
            return None;
        }
    };
    debug!("{output}");

    match parse_stats(&output) {
        Ok(Some(stats)) => Some(ResultRecord {
            domain: spec.domain.clone(),
            problem_index: index,
            planner: spec.planner.clone(),
            plan_length: stats.plan_length,
            time_spent_ms: stats.time_ms,
        }),
        Ok(None) => {
            debug!("No stats for problem {}", problem.display());
            None
        }
        Err(err) => {
            warn!("Problem {}: {err}", problem.display());
            None
        }
    }
}

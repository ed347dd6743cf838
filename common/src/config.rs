use std::{
    fmt,
    path::PathBuf,
    str::FromStr,
};

use eyre::{Context, ContextCompat, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{kv::Fields, persist::expand_load_path, record::Variable};

pub const DEFAULT_COMMAND: &str =
    "java -cp classes:lib/pddl4j-4.0.0.jar {planner} {domain} {problem} {args}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub settings: Settings,
    pub benches: Vec<BenchmarkSpec>,
    pub loads: Vec<PathBuf>,
    pub graphs: Vec<GraphSpec>,
    pub save: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory that domain, problem and load paths are relative to. The
    /// planner runs with this as its working directory.
    pub root: PathBuf,
    /// Planner command, `{planner}`, `{domain}`, `{problem}` and `{args}` are
    /// substituted per invocation
    pub command: String,
    pub results_dir: PathBuf,
    pub plot_dir: PathBuf,
    /// Kill a planner run after this many seconds, unset waits forever
    pub timeout_secs: Option<u64>,
    pub missing: MissingPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            command: DEFAULT_COMMAND.to_owned(),
            results_dir: PathBuf::from("benchmarks"),
            plot_dir: PathBuf::from("plots/output"),
            timeout_secs: None,
            missing: MissingPolicy::default(),
        }
    }
}

/// How a problem index without a result for some planner is plotted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Plot the missing point as 0
    #[default]
    Zero,
    /// Leave the point out of the planner's series
    Exclude,
}

impl FromStr for MissingPolicy {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(Self::Zero),
            "exclude" => Ok(Self::Exclude),
            other => bail!("Unsupported missing policy {other}"),
        }
    }
}

/// One sweep of a planner over the problem files of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBenchmarkSpec", into = "RawBenchmarkSpec")]
pub struct BenchmarkSpec {
    pub domain: String,
    pub planner: String,
    pub args: String,
    pub index_min: u32,
    /// Inclusive, `None` runs until the problem files run out
    pub index_max: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBenchmarkSpec {
    domain: String,
    planner: String,
    #[serde(default)]
    args: String,
    min: Option<i64>,
    max: Option<i64>,
}

impl BenchmarkSpec {
    /// Clamps the index range so that `1 <= index_min <= index_max`.
    pub fn new(
        domain: impl Into<String>,
        planner: impl Into<String>,
        args: impl Into<String>,
        index_min: Option<i64>,
        index_max: Option<i64>,
    ) -> Self {
        let index_min = index_min.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let index_max = index_max.map(|max| max.clamp(index_min as i64, u32::MAX as i64) as u32);
        Self {
            domain: domain.into(),
            planner: planner.into(),
            args: args.into(),
            index_min,
            index_max,
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.index_min && self.index_max.is_none_or(|max| index <= max)
    }
}

impl fmt::Display for BenchmarkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max = self
            .index_max
            .map_or("max".to_owned(), |max| max.to_string());
        write!(
            f,
            "domain={} planner={} args={:?} from test {} to test {max}",
            self.domain, self.planner, self.args, self.index_min
        )
    }
}

impl TryFrom<RawBenchmarkSpec> for BenchmarkSpec {
    type Error = eyre::Report;

    fn try_from(raw: RawBenchmarkSpec) -> Result<Self> {
        Ok(Self::new(raw.domain, raw.planner, raw.args, raw.min, raw.max))
    }
}

impl From<BenchmarkSpec> for RawBenchmarkSpec {
    fn from(spec: BenchmarkSpec) -> Self {
        Self {
            domain: spec.domain,
            planner: spec.planner,
            args: spec.args,
            min: Some(spec.index_min as i64),
            max: spec.index_max.map(i64::from),
        }
    }
}

/// Parses `domain=..;planner=..;args=..;min=..;max=..;`
impl FromStr for BenchmarkSpec {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let fields = Fields::parse(s);
        let domain = fields.get("domain").context("Bench is missing domain")?;
        let planner = fields.get("planner").context("Bench is missing planner")?;
        let bound = |key: &str| -> Result<Option<i64>> {
            fields
                .get(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<i64>()
                        .context(format!("Parse bench {key}: {value}"))
                })
                .transpose()
        };
        Ok(Self::new(
            domain,
            planner,
            fields.get("args").unwrap_or_default(),
            bound("min")?,
            bound("max")?,
        ))
    }
}

/// One plot of `variable` for every planner on a benchmark group, ordered by
/// the results of `planner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSpec {
    pub domain: String,
    pub variable: String,
    pub planner: String,
}

impl GraphSpec {
    pub fn variable(&self) -> Variable {
        Variable::from(self.variable.as_str())
    }
}

/// Parses `domain=..;variable=..;planner=..;`
impl FromStr for GraphSpec {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let fields = Fields::parse(s);
        let get = |key: &str| {
            fields
                .get(key)
                .map(str::to_owned)
                .context(format!("Graph is missing {key}"))
        };
        Ok(Self {
            domain: get("domain")?,
            variable: get("variable")?,
            planner: get("planner")?,
        })
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yml::from_str(text).context("Parsing config file")
    }

    /// Drops benches whose domain file does not exist and expands load
    /// directories into the files they contain. A load path that cannot be
    /// expanded is logged and skipped.
    pub fn resolve(mut self) -> Self {
        let root = self.settings.root.clone();
        self.benches.retain(|bench| {
            let exists = root.join(&bench.domain).exists();
            if !exists {
                warn!("Domain file {} does not exist, skipping bench", bench.domain);
            }
            exists
        });

        let mut loads = Vec::new();
        for path in &self.loads {
            match expand_load_path(&root, path) {
                Ok(files) => loads.extend(files),
                Err(err) => error!("Skipping load path {}: {err:#}", path.display()),
            }
        }
        debug!("Resolved {} load paths", loads.len());
        self.loads = loads;
        self
    }
}

use std::path::{Path, PathBuf};

/// Extension of persisted result records.
pub const RECORD_EXTENSION: &str = "benchDATA";

/// Benchmarks are laid out as `<group>/<subfolder>/domain.pddl` with the
/// problem files sitting next to the domain file.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainLayout {
    pub domain_file: PathBuf,
    pub benchmark_folder: PathBuf,
    pub benchmark_group: Option<String>,
}

impl DomainLayout {
    pub fn new(domain: impl AsRef<Path>) -> Self {
        let domain_file = domain.as_ref().to_path_buf();
        let benchmark_folder = domain_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let benchmark_group = benchmark_folder
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .map(str::to_owned);

        Self {
            domain_file,
            benchmark_folder,
            benchmark_group,
        }
    }
}

/// Collapses a qualified planner identifier (`a.b.MCTS`) to its last segment.
pub fn planner_short_name(planner: &str) -> &str {
    planner.rsplit('.').next().unwrap_or(planner)
}

/// Name of the `index`-th record file of a group, ie. `benchmark0007.benchDATA`.
pub fn record_file_name(index: u32) -> String {
    format!("benchmark{index:04}.{RECORD_EXTENSION}")
}

/// Directory holding every record of one planner on one benchmark group.
pub fn group_dir(results_dir: &Path, planner: &str, group: &str) -> PathBuf {
    results_dir.join(planner_short_name(planner)).join(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_roles_from_domain_path() {
        let layout =
            DomainLayout::new("src/test/resources/benchmarks/pddl/ipc2002/depots/strips-automatic/domain.pddl");
        assert_eq!(
            layout.benchmark_folder,
            PathBuf::from("src/test/resources/benchmarks/pddl/ipc2002/depots/strips-automatic")
        );
        assert_eq!(layout.benchmark_group.as_deref(), Some("depots"));
    }

    #[test]
    fn shallow_path_has_no_group() {
        assert_eq!(DomainLayout::new("domain.pddl").benchmark_group, None);
        assert_eq!(DomainLayout::new("strips/domain.pddl").benchmark_group, None);
        assert_eq!(
            DomainLayout::new("depots/strips/domain.pddl")
                .benchmark_group
                .as_deref(),
            Some("depots")
        );
    }

    #[test]
    fn short_name_is_last_dotted_segment() {
        assert_eq!(planner_short_name("fr.uga.pddl4j.planners.statespace.HSP"), "HSP");
        assert_eq!(planner_short_name("MCTS"), "MCTS");
    }

    #[test]
    fn record_names_are_zero_padded() {
        assert_eq!(record_file_name(1), "benchmark0001.benchDATA");
        assert_eq!(record_file_name(12345), "benchmark12345.benchDATA");
        assert_eq!(
            group_dir(Path::new("benchmarks"), "a.b.MCTS", "depots"),
            PathBuf::from("benchmarks/MCTS/depots")
        );
    }
}

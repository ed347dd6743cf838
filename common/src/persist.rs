use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use eyre::{Context, ContextCompat, Result};
use regex::Regex;
use thiserror::Error;
use tokio::{
    fs::{OpenOptions, create_dir_all, read_dir, read_to_string, try_exists},
    io::AsyncWriteExt,
};
use tracing::{debug, error, warn};

use crate::{
    layout::{RECORD_EXTENSION, group_dir, record_file_name},
    record::{RecordError, ResultRecord},
};

/// Writes every record to the first free `benchmark<NNNN>.benchDATA` of its
/// `<results_dir>/<planner>/<group>/` directory. Existing files are never
/// overwritten.
pub async fn save(results_dir: &Path, records: &[ResultRecord]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(records.len());
    for record in records {
        let group = record
            .benchmark_group()
            .context(format!("No benchmark group in domain path {}", record.domain))?;
        let dir = group_dir(results_dir, &record.planner, &group);
        create_dir_all(&dir)
            .await
            .context(format!("Create {}", dir.display()))?;

        let mut index = 1;
        loop {
            let path = dir.join(record_file_name(index));
            if try_exists(&path).await? {
                index += 1;
                continue;
            }
            // create_new fails if another writer took the name in between
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    index += 1;
                    continue;
                }
                Err(err) => return Err(err).context(format!("Create {}", path.display())),
            };
            file.write_all(record.encode().as_bytes()).await?;
            file.flush().await?;
            debug!("Saved {}", path.display());
            written.push(path);
            break;
        }
    }
    Ok(written)
}

/// Why a record file could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<ResultRecord>,
    pub failed: Vec<(PathBuf, LoadError)>,
    pub missing: Vec<PathBuf>,
}

/// Reads one record per path. Missing files are skipped, files that cannot be
/// read or do not decode are reported per path without stopping the batch.
pub async fn load(root: &Path, paths: &[PathBuf]) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        let full_path = root.join(path);
        match try_exists(&full_path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Skipping missing record {}", full_path.display());
                report.missing.push(path.clone());
                continue;
            }
            Err(err) => {
                error!("Cannot access record {}: {err}", full_path.display());
                report.failed.push((path.clone(), err.into()));
                continue;
            }
        }

        let decoded = read_to_string(&full_path)
            .await
            .map_err(LoadError::from)
            .and_then(|text| ResultRecord::decode(&text).map_err(LoadError::from));
        match decoded {
            Ok(record) => {
                debug!("Benchmark loaded:\n{record}");
                report.records.push(record);
            }
            Err(err) => {
                error!("Malformed record {}: {err}", full_path.display());
                report.failed.push((path.clone(), err));
            }
        }
    }
    report
}

/// A file loads as itself, a directory loads every file directly inside it.
pub fn expand_load_path(root: &Path, path: &Path) -> Result<Vec<PathBuf>> {
    let full_path = root.join(path);
    if full_path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !full_path.is_dir() {
        warn!("Load path {} does not exist", full_path.display());
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&full_path).context(format!("Read {}", full_path.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(path.join(entry.file_name()));
        }
    }
    files.sort();
    Ok(files)
}

/// Record file names of every `<planner>/<group>` under `results_dir`.
pub async fn list(results_dir: &Path) -> Result<BTreeMap<(String, String), Vec<String>>> {
    let pattern = Regex::new(&format!(r"^benchmark\d{{4,}}\.{RECORD_EXTENSION}$"))?;
    let mut groups = BTreeMap::new();
    if !try_exists(results_dir).await? {
        return Ok(groups);
    }

    for planner_dir in sub_dirs(results_dir).await? {
        for group_dir in sub_dirs(&planner_dir).await? {
            let mut files = Vec::new();
            let mut entries = read_dir(&group_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if pattern.is_match(&name) {
                    files.push(name);
                }
            }
            files.sort();
            groups.insert((dir_name(&planner_dir), dir_name(&group_dir)), files);
        }
    }
    Ok(groups)
}

async fn sub_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut entries = read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(planner: &str, index: u32) -> ResultRecord {
        ResultRecord {
            domain: "pddl/depots/strips/domain.pddl".to_owned(),
            problem_index: index,
            planner: planner.to_owned(),
            plan_length: 12,
            time_spent_ms: 250.0,
        }
    }

    #[tokio::test]
    async fn save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("benchmarks");

        let first = save(&results, &[record("a.b.MCTS", 1)]).await.unwrap();
        let second = save(&results, &[record("a.b.MCTS", 1)]).await.unwrap();
        assert_eq!(first, vec![results.join("MCTS/depots/benchmark0001.benchDATA")]);
        assert_eq!(second, vec![results.join("MCTS/depots/benchmark0002.benchDATA")]);
        assert_eq!(
            fs::read_to_string(&first[0]).unwrap(),
            record("a.b.MCTS", 1).encode()
        );
    }

    #[tokio::test]
    async fn save_fills_first_free_index() {
        let dir = tempfile::tempdir().unwrap();
        let group = dir.path().join("HSP/depots");
        fs::create_dir_all(&group).unwrap();
        fs::write(group.join("benchmark0001.benchDATA"), "keep").unwrap();
        fs::write(group.join("benchmark0003.benchDATA"), "keep").unwrap();

        let written = save(dir.path(), &[record("HSP", 1), record("HSP", 2)])
            .await
            .unwrap();
        assert_eq!(
            written,
            vec![
                group.join("benchmark0002.benchDATA"),
                group.join("benchmark0004.benchDATA")
            ]
        );
        assert_eq!(fs::read_to_string(group.join("benchmark0003.benchDATA")).unwrap(), "keep");
    }

    #[tokio::test]
    async fn save_requires_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut shallow = record("HSP", 1);
        shallow.domain = "domain.pddl".to_owned();
        assert!(save(dir.path(), &[shallow]).await.is_err());
    }

    #[tokio::test]
    async fn load_skips_missing_and_reports_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let written = save(dir.path(), &[record("HSP", 1), record("MCTS", 2)])
            .await
            .unwrap();
        fs::write(dir.path().join("broken.benchDATA"), "domain=x;pbIndex=1;").unwrap();

        let mut paths = written
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect::<Vec<_>>();
        paths.push(PathBuf::from("broken.benchDATA"));
        paths.push(PathBuf::from("gone.benchDATA"));

        let report = load(dir.path(), &paths).await;
        assert_eq!(report.records, vec![record("HSP", 1), record("MCTS", 2)]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].1,
            LoadError::Record(RecordError::MissingField("planner"))
        ));
        assert_eq!(report.missing, vec![PathBuf::from("gone.benchDATA")]);
    }

    #[tokio::test]
    async fn load_keeps_records_around_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("saved");
        fs::create_dir_all(&saved).unwrap();
        fs::write(saved.join("a.benchDATA"), record("HSP", 1).encode()).unwrap();
        fs::write(saved.join("b.benchDATA"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(saved.join("c.benchDATA"), record("HSP", 3).encode()).unwrap();

        let paths = expand_load_path(dir.path(), Path::new("saved")).unwrap();
        let report = load(dir.path(), &paths).await;
        assert_eq!(report.records, vec![record("HSP", 1), record("HSP", 3)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, PathBuf::from("saved/b.benchDATA"));
        assert!(matches!(report.failed[0].1, LoadError::Read(_)));
    }

    #[tokio::test]
    async fn list_groups_by_planner_and_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), &[record("HSP", 1), record("HSP", 2), record("x.MCTS", 1)])
            .await
            .unwrap();
        fs::write(dir.path().join("HSP/depots/notes.txt"), "").unwrap();

        let groups = list(dir.path()).await.unwrap();
        assert_eq!(
            groups.get(&("HSP".to_owned(), "depots".to_owned())),
            Some(&vec![
                "benchmark0001.benchDATA".to_owned(),
                "benchmark0002.benchDATA".to_owned()
            ])
        );
        assert_eq!(groups.len(), 2);
        assert!(list(&dir.path().join("none")).await.unwrap().is_empty());
    }
}

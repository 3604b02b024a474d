//! Run storage API.
//!
//! A run is staged in `.staging-<run_id>` next to its final directory and
//! renamed into place by [`StagedRun::commit`]. A staged run that is dropped
//! without being committed removes itself.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::hydraulic::{HydraulicHeader, HydraulicStreamReader, HydraulicStreamWriter};
use crate::quality::{QualityStreamReader, QualityStreamWriter};
use crate::types::RunManifest;
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";
const HYDRAULICS: &str = "hydraulics.bin";
const QUALITY: &str = "quality.bin";
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

fn open_err(path: &Path) -> impl FnOnce(std::io::Error) -> ResultsError + '_ {
    move |source| ResultsError::Open {
        path: path.to_path_buf(),
        source,
    }
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir).map_err(open_err(&root_dir))?;
        }
        Ok(Self { root_dir })
    }

    /// Store beside a network file: `<dir>/.waternet/runs`.
    pub fn for_network(network_path: &Path) -> ResultsResult<Self> {
        let dir = network_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(".waternet").join("runs"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    /// Start staging a run. Leftovers of an earlier aborted attempt are removed.
    pub fn begin(&self, run_id: &str) -> ResultsResult<StagedRun> {
        let dir = self.root_dir.join(format!("{STAGING_PREFIX}{run_id}"));
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(ResultsError::Write)?;
        }
        fs::create_dir_all(&dir).map_err(open_err(&dir))?;
        Ok(StagedRun {
            dir,
            final_dir: self.run_dir(run_id),
            run_id: run_id.to_string(),
            committed: false,
        })
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id).join(MANIFEST);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(ResultsError::Read)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn open_hydraulics(
        &self,
        run_id: &str,
    ) -> ResultsResult<HydraulicStreamReader<BufReader<File>>> {
        let path = self.existing_file(run_id, HYDRAULICS)?;
        let file = File::open(&path).map_err(open_err(&path))?;
        HydraulicStreamReader::new(BufReader::new(file))
    }

    pub fn open_quality(&self, run_id: &str) -> ResultsResult<QualityStreamReader<BufReader<File>>> {
        let path = self.existing_file(run_id, QUALITY)?;
        let file = File::open(&path).map_err(open_err(&path))?;
        QualityStreamReader::new(BufReader::new(file))
    }

    pub fn has_quality(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(QUALITY).exists()
    }

    fn existing_file(&self, run_id: &str, name: &str) -> ResultsResult<PathBuf> {
        if !self.has_run(run_id) {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(self.run_dir(run_id).join(name))
    }

    /// Manifests of all committed runs of the named network, oldest first.
    pub fn list_runs(&self, network_name: &str) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir).map_err(ResultsError::Read)? {
            let entry = entry.map_err(ResultsError::Read)?;
            let run_id = entry.file_name().to_string_lossy().to_string();
            if !entry.path().is_dir() || run_id.starts_with(STAGING_PREFIX) {
                continue;
            }
            if let Ok(manifest) = self.load_manifest(&run_id)
                && manifest.network_name == network_name
            {
                runs.push(manifest);
            }
        }
        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir).map_err(ResultsError::Write)?;
        }
        Ok(())
    }
}

/// A run being written. Nothing is visible under the run id until `commit`.
#[derive(Debug)]
pub struct StagedRun {
    dir: PathBuf,
    final_dir: PathBuf,
    run_id: String,
    committed: bool,
}

impl StagedRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn hydraulics_path(&self) -> PathBuf {
        self.dir.join(HYDRAULICS)
    }

    pub fn quality_path(&self) -> PathBuf {
        self.dir.join(QUALITY)
    }

    pub fn create_hydraulics(
        &self,
        header: HydraulicHeader,
    ) -> ResultsResult<HydraulicStreamWriter<BufWriter<File>>> {
        let path = self.hydraulics_path();
        let file = File::create(&path).map_err(open_err(&path))?;
        HydraulicStreamWriter::new(BufWriter::new(file), header)
    }

    /// Reopen the staged hydraulic stream, e.g. to drive the quality pass.
    pub fn read_hydraulics(&self) -> ResultsResult<HydraulicStreamReader<BufReader<File>>> {
        let path = self.hydraulics_path();
        let file = File::open(&path).map_err(open_err(&path))?;
        HydraulicStreamReader::new(BufReader::new(file))
    }

    pub fn create_quality(
        &self,
        node_count: usize,
        link_count: usize,
    ) -> ResultsResult<QualityStreamWriter<BufWriter<File>>> {
        let path = self.quality_path();
        let file = File::create(&path).map_err(open_err(&path))?;
        QualityStreamWriter::new(BufWriter::new(file), node_count, link_count)
    }

    /// Write the manifest and move the run into place, replacing an older run with the same id.
    pub fn commit(mut self, manifest: &RunManifest) -> ResultsResult<PathBuf> {
        if manifest.run_id != self.run_id {
            return Err(ResultsError::Mismatch {
                what: format!(
                    "manifest is for run {}, staged run is {}",
                    manifest.run_id, self.run_id
                ),
            });
        }
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.dir.join(MANIFEST), json).map_err(ResultsError::Write)?;

        if self.final_dir.exists() {
            fs::remove_dir_all(&self.final_dir).map_err(ResultsError::Write)?;
        }
        fs::rename(&self.dir, &self.final_dir).map_err(ResultsError::Write)?;
        self.committed = true;
        tracing::info!(run_id = %self.run_id, dir = %self.final_dir.display(), "run committed");
        Ok(self.final_dir.clone())
    }

    /// Discard everything staged so far.
    pub fn abort(self) {
        // Drop does the work
    }
}

impl Drop for StagedRun {
    fn drop(&mut self) {
        if !self.committed && self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot remove staged run");
            } else {
                tracing::debug!(run_id = %self.run_id, "staged run discarded");
            }
        }
    }
}

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::error::{Error, Result};

const CORPUS_DIR: &str = "corpus";
const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The HAYSTACK_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/haystack/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("HAYSTACK_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("haystack")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn corpus_root(&self) -> PathBuf {
        self.root.join(CORPUS_DIR)
    }

    /// Directory of the active corpus generation, if a fetch has completed.
    pub fn current_corpus(&self) -> Result<Option<PathBuf>> {
        let pointer = self.corpus_root().join(CURRENT_FILE);
        let name = match std::fs::read_to_string(&pointer) {
            Ok(name) => name,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let name = name.trim();
        if !is_generation_name(name) {
            tracing::warn!(pointer = name, "ignoring invalid corpus pointer");
            return Ok(None);
        }

        let dir = self.corpus_root().join(name);
        Ok(dir.is_dir().then_some(dir))
    }

    /// Like [`DataDir::current_corpus`], but a missing corpus is an error.
    pub fn require_corpus(&self) -> Result<PathBuf> {
        self.current_corpus()?
            .ok_or_else(|| Error::MissingCorpus(self.root.clone()))
    }

    /// Create an empty directory for a new corpus generation.
    ///
    /// Nothing reads it until [`DataDir::promote`] is called.
    pub fn stage_corpus(&self) -> Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let name =
            format!("{GENERATION_PREFIX}{nanos}-{}", std::process::id());
        let dir = self.corpus_root().join(name);
        std::fs::create_dir_all(&dir)
            .map_err(|_| Error::DataDir(dir.clone()))?;
        Ok(dir)
    }

    /// Make `staged` the active generation and remove older ones.
    ///
    /// The switch is a rename of the pointer file, so readers see either
    /// the old generation or the new one.
    pub fn promote(&self, staged: &Path) -> Result<()> {
        let name = staged
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::Config(format!(
                    "invalid corpus directory: {}",
                    staged.display()
                ))
            })?;

        let corpus_root = self.corpus_root();
        let tmp = corpus_root.join(format!("{CURRENT_FILE}.tmp"));
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(name.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, corpus_root.join(CURRENT_FILE))?;
        tracing::info!(generation = name, "corpus promoted");

        for entry in std::fs::read_dir(&corpus_root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(GENERATION_PREFIX) && file_name != name {
                self.discard(&entry.path());
            }
        }
        Ok(())
    }

    /// Best-effort removal of a corpus generation.
    pub fn discard(&self, dir: &Path) {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!(
                path = %dir.display(),
                "could not remove corpus generation: {e}"
            );
        }
    }
}

/// A generation name is a single `gen-` prefixed path component.
fn is_generation_name(name: &str) -> bool {
    name.len() > GENERATION_PREFIX.len()
        && name.starts_with(GENERATION_PREFIX)
        && !name.contains(['/', '\\'])
}

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    catalog::Device,
    corpus_db::{CorpusDb, settings},
    error::Result,
    ingestion,
    search::ResultRow,
    tantivy_index::{SearchIndex, WRITER_MEMORY_BUDGET},
};

const DB_FILE: &str = "corpus.redb";
const INDEX_DIR: &str = "tantivy";

/// Where a corpus came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchInfo {
    pub apiserver: String,
    pub include_inactive: bool,
}

/// One corpus generation: the device table plus its search index.
#[derive(Debug)]
pub struct Corpus {
    dir: PathBuf,
    db: CorpusDb,
    index: SearchIndex,
}

impl Corpus {
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            dir: dir.to_path_buf(),
            db: CorpusDb::open(&dir.join(DB_FILE))?,
            index: SearchIndex::open(&dir.join(INDEX_DIR))?,
        })
    }

    /// Populate a fresh generation directory with `devices`.
    pub fn build(
        dir: &Path,
        devices: &[Device],
        info: &FetchInfo,
    ) -> Result<Self> {
        let corpus = Self::open(dir)?;

        let mut writer = corpus.index.writer(WRITER_MEMORY_BUDGET)?;
        let count = ingestion::ingest_devices(
            &corpus.index,
            &mut writer,
            &corpus.db,
            devices,
        )?;

        let fetched_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        corpus.db.set_setting(settings::APISERVER, &info.apiserver)?;
        corpus
            .db
            .set_setting(settings::FETCHED_AT, &fetched_at.to_string())?;
        corpus.db.set_setting(
            settings::INCLUDE_INACTIVE,
            &info.include_inactive.to_string(),
        )?;

        tracing::info!(devices = count, dir = %dir.display(), "corpus built");
        Ok(corpus)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn db(&self) -> &CorpusDb {
        &self.db
    }

    /// Candidate rows for an engine query, highest score first.
    ///
    /// The index supplies scores; hostname and config come from the
    /// device table. A hit with no table row is skipped.
    pub fn retrieve(&self, engine_query: &str) -> Result<Vec<ResultRow>> {
        let hits = self.index.search(engine_query)?;
        let mut rows = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(device) = self.db.get_device(&hit.serial_number)? else {
                tracing::warn!(
                    serial = %hit.serial_number,
                    "indexed device missing from the device table"
                );
                continue;
            };
            rows.push(ResultRow {
                hostname: device.hostname,
                serial_number: device.serial_number,
                score: hit.score,
                config: device.config,
            });
        }
        Ok(rows)
    }
}

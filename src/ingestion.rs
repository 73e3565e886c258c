use tantivy::IndexWriter;

use crate::{
    catalog::Device,
    corpus_db::CorpusDb,
    error::Result,
    tantivy_index::SearchIndex,
};

/// Store a batch of assembled devices in the device table and the search
/// index. Commits the index at the end.
pub fn ingest_devices(
    index: &SearchIndex,
    writer: &mut IndexWriter,
    db: &CorpusDb,
    devices: &[Device],
) -> Result<usize> {
    for device in devices {
        if device.config.is_none() {
            tracing::warn!(
                serial = %device.serial_number,
                "indexing device without a config"
            );
        }
        index.add_device(writer, device)?;
    }
    writer.commit()?;

    db.put_devices(devices)?;
    Ok(devices.len())
}

use rayon::prelude::*;

use crate::{
    assembler,
    catalog::Device,
    error::Result,
    records::{LinkNode, LinkedRecordStore},
};

/// Fetch and assemble the running config of every device.
///
/// `fetch_nodes_for` returns the raw line records of one device. Devices
/// are processed in parallel; each worker owns its device, and the output
/// keeps input order. The first fetch or assembly failure aborts the whole
/// run so that a partially populated corpus is never produced.
pub fn populate<F>(
    devices: Vec<Device>,
    fetch_nodes_for: F,
) -> Result<Vec<Device>>
where
    F: Fn(&Device) -> Result<Vec<LinkNode>> + Sync,
{
    devices
        .into_par_iter()
        .map(|mut device| {
            let config = fetch_and_assemble(&device, &fetch_nodes_for)
                .inspect_err(|e| {
                    tracing::error!(
                        serial = %device.serial_number,
                        hostname = %device.hostname,
                        "failed to build config: {e}"
                    );
                })?;
            tracing::debug!(
                serial = %device.serial_number,
                hostname = %device.hostname,
                bytes = config.len(),
                "config assembled"
            );
            device.config = Some(config);
            Ok(device)
        })
        .collect()
}

fn fetch_and_assemble<F>(device: &Device, fetch_nodes_for: &F) -> Result<String>
where
    F: Fn(&Device) -> Result<Vec<LinkNode>>,
{
    let store: LinkedRecordStore = fetch_nodes_for(device)?.into_iter().collect();
    assembler::assemble(&store)
}

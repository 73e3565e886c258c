use crate::{
    error::{Error, Result},
    records::{LinkNode, LinkedRecordStore},
};

/// Largest config, in lines, that [`assemble`] will walk.
pub const DEFAULT_MAX_LINES: usize = 1_000_000;

/// Rebuild a device's config text from its linked line records.
///
/// Walks successor links from the single head node and joins each node's
/// text with `\n`. The result does not depend on the order in which the
/// records were absorbed.
///
/// Fails with [`Error::MalformedList`] unless the records form one simple
/// path: exactly one head, exactly one tail, no dangling or inconsistent
/// links, and every node reachable from the head.
pub fn assemble(store: &LinkedRecordStore) -> Result<String> {
    assemble_with_limit(store, DEFAULT_MAX_LINES)
}

/// Like [`assemble`], but refuses to walk more than `max_lines` nodes.
///
/// Cyclic successor chains fail with [`Error::TraversalLimitExceeded`]
/// once the walk has taken more steps than there are nodes.
pub fn assemble_with_limit(
    store: &LinkedRecordStore,
    max_lines: usize,
) -> Result<String> {
    if store.is_empty() {
        return Err(Error::MalformedList("no head node found".into()));
    }
    if store.len() > max_lines {
        return Err(Error::TraversalLimitExceeded { limit: max_lines });
    }

    let head = find_head(store)?;
    check_single_tail(store)?;

    let limit = store.len();
    let mut lines: Vec<&str> = Vec::with_capacity(limit);
    let mut current = head;

    loop {
        if lines.len() == limit {
            return Err(Error::TraversalLimitExceeded { limit });
        }
        lines.push(&current.text);

        let Some(next_id) = current.successor.as_deref() else {
            break;
        };
        let next = store.get(next_id).ok_or_else(|| {
            Error::MalformedList(format!(
                "node {} links to missing successor {next_id}",
                current.id
            ))
        })?;
        if next.predecessor.as_deref() != Some(current.id.as_str()) {
            return Err(Error::MalformedList(format!(
                "node {} names {} as successor, but {} does not link back",
                current.id, next.id, next.id
            )));
        }
        current = next;
    }

    if lines.len() != store.len() {
        return Err(Error::MalformedList(format!(
            "{} of {} nodes are unreachable from the head",
            store.len() - lines.len(),
            store.len()
        )));
    }

    tracing::debug!(lines = lines.len(), "assembled config");
    Ok(lines.join("\n"))
}

fn find_head(store: &LinkedRecordStore) -> Result<&LinkNode> {
    let mut heads: Vec<&LinkNode> =
        store.nodes().filter(|n| n.is_head()).collect();

    match heads.len() {
        0 => Err(Error::MalformedList("no head node found".into())),
        1 => Ok(heads.remove(0)),
        n => {
            let mut ids: Vec<&str> =
                heads.iter().map(|h| h.id.as_str()).collect();
            ids.sort_unstable();
            Err(Error::MalformedList(format!(
                "found {n} head nodes: {}",
                ids.join(", ")
            )))
        }
    }
}

fn check_single_tail(store: &LinkedRecordStore) -> Result<()> {
    match store.nodes().filter(|n| n.is_tail()).count() {
        1 => Ok(()),
        0 => Err(Error::MalformedList("no tail node found".into())),
        n => Err(Error::MalformedList(format!("found {n} tail nodes"))),
    }
}

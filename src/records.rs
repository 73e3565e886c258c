use std::collections::HashMap;

/// One line of a device's running config, stored as a doubly linked list
/// node.
///
/// `predecessor` is `None` only on the head, `successor` is `None` only on
/// the tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub id: String,
    pub text: String,
    pub predecessor: Option<String>,
    pub successor: Option<String>,
}

impl LinkNode {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        predecessor: Option<&str>,
        successor: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            predecessor: predecessor.map(str::to_string),
            successor: successor.map(str::to_string),
        }
    }

    pub fn is_head(&self) -> bool {
        self.predecessor.is_none()
    }

    pub fn is_tail(&self) -> bool {
        self.successor.is_none()
    }
}

/// Node records for a single device, keyed by node id.
///
/// Records arrive in no particular order; the store only indexes them.
/// Ordering is recovered by [`crate::assembler::assemble`].
#[derive(Debug, Default, Clone)]
pub struct LinkedRecordStore {
    nodes: HashMap<String, LinkNode>,
}

impl LinkedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record. A repeated id replaces the earlier record.
    pub fn absorb(&mut self, node: LinkNode) {
        if let Some(previous) = self.nodes.insert(node.id.clone(), node) {
            tracing::warn!(
                id = %previous.id,
                "duplicate config node id, keeping the later record"
            );
        }
    }

    pub fn get(&self, id: &str) -> Option<&LinkNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LinkNode> {
        self.nodes.values()
    }
}

impl FromIterator<LinkNode> for LinkedRecordStore {
    fn from_iter<I: IntoIterator<Item = LinkNode>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl Extend<LinkNode> for LinkedRecordStore {
    fn extend<I: IntoIterator<Item = LinkNode>>(&mut self, iter: I) {
        for node in iter {
            self.absorb(node);
        }
    }
}

use std::collections::HashMap;

pub type StackIndex = usize;

/// Deduplicates stacks by the exact sequence of node ids from leaf to root.
///
/// Keys are compared structurally, so id chains such as `[1, 23]` and
/// `[12, 3]` can never collide. Lookups go through a reused scratch buffer
/// and only allocate when a new stack is inserted.
#[derive(Debug, Default)]
pub struct StackIdentityTable {
    lookup: HashMap<Box<[u32]>, StackIndex>,
    scratch: Vec<u32>,
}

impl StackIdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index already assigned to this id chain, or assigns
    /// `candidate` to it and returns `candidate`.
    pub fn resolve<I>(&mut self, node_ids: I, candidate: StackIndex) -> StackIndex
    where
        I: IntoIterator<Item = u32>,
    {
        self.scratch.clear();
        self.scratch.extend(node_ids);

        if let Some(index) = self.lookup.get(self.scratch.as_slice()) {
            return *index;
        }
        self.lookup
            .insert(self.scratch.as_slice().into(), candidate);
        candidate
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

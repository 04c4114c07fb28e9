//! Pending batch of not-yet-committed mutations.

use bugstore_core::{EntityKey, Record};

/// One registered mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a new entity.
    Add(Record),
    /// Replace an existing entity, matched by identity.
    Update(Record),
    /// Delete an existing entity.
    Remove(EntityKey),
}

impl Mutation {
    /// The identity this mutation targets.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Add(record) | Self::Update(record) => record.key(),
            Self::Remove(key) => *key,
        }
    }
}

/// Mutations accumulated since the last commit, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBatch {
    mutations: Vec<Mutation>,
}

impl PendingBatch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mutations: Vec::new(),
        }
    }

    /// Append a mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Number of registered mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Iterate in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    /// Drop every pending mutation.
    pub fn clear(&mut self) {
        self.mutations.clear();
    }
}

impl<'a> IntoIterator for &'a PendingBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Mutation> for PendingBatch {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}

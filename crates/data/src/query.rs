//! Filtered views over committed entities.

use core::fmt;
use std::sync::Arc;

use bugstore_core::Entity;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Entities of one type matching a predicate.
///
/// A query holds a snapshot of the committed rows taken when
/// [`Store::query`](crate::Store::query) ran; the predicate is evaluated
/// lazily each time the query is iterated. Pending, uncommitted changes are
/// never visible.
#[derive(Clone)]
pub struct Query<E: Entity> {
    rows: Arc<[E]>,
    predicate: Predicate<E>,
}

impl<E: Entity> Query<E> {
    pub(crate) fn new<P>(rows: Vec<E>, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            rows: rows.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Narrow this query with a further predicate.
    #[must_use]
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let outer = self.predicate;
        Self {
            rows: self.rows,
            predicate: Arc::new(move |e: &E| outer(e) && predicate(e)),
        }
    }

    /// Iterate matching entities.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            rows: self.rows.iter(),
            predicate: &*self.predicate,
        }
    }

    /// Number of matching entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// First matching entity.
    #[must_use]
    pub fn first(&self) -> Option<&E> {
        self.iter().next()
    }

    /// Whether nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// Clone matching entities into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }
}

impl<E: Entity> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("kind", &E::KIND)
            .field("rows", &self.rows.len())
            .finish_non_exhaustive()
    }
}

/// Iterator over the entities matched by a [`Query`].
pub struct Iter<'a, E> {
    rows: std::slice::Iter<'a, E>,
    predicate: &'a (dyn Fn(&E) -> bool + Send + Sync),
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        let predicate = self.predicate;
        self.rows.find(|e| predicate(e))
    }
}

impl<'a, E: Entity> IntoIterator for &'a Query<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

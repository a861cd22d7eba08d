//! Run-scoped registry of named in-memory views.

use crate::engine::{Dataset, Frame, StreamPlan};
use std::collections::BTreeMap;
use tracing::debug;

/// Maps view names to datasets for the duration of one run.
///
/// Names are case-insensitive and stored in lower case, matching how SQL
/// resolves unquoted identifiers. Registering an existing name replaces it.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    views: BTreeMap<String, Dataset>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl ViewRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a view, returning the dataset it replaced.
    pub fn register(&mut self, name: &str, dataset: Dataset) -> Option<Dataset> {
        let key = normalize(name);
        debug!(view = %key, kind = %dataset.kind(), "Registering view");
        self.views.insert(key, dataset)
    }

    /// Looks up a view.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.views.get(&normalize(name))
    }

    /// Returns true if a view with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.views.contains_key(&normalize(name))
    }

    /// Removes a view.
    pub fn remove(&mut self, name: &str) -> Option<Dataset> {
        self.views.remove(&normalize(name))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Number of registered views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if no views are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Removes every view.
    pub fn clear(&mut self) {
        self.views.clear();
    }

    /// Batch views with their frames.
    pub fn batch_views(&self) -> impl Iterator<Item = (&str, &Frame)> {
        self.views
            .iter()
            .filter_map(|(name, dataset)| dataset.as_batch().map(|frame| (name.as_str(), frame)))
    }

    /// Streaming views with their plans.
    pub fn stream_views(&self) -> impl Iterator<Item = (&str, &StreamPlan)> {
        self.views
            .iter()
            .filter_map(|(name, dataset)| dataset.as_stream().map(|plan| (name.as_str(), plan)))
    }
}

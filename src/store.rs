//! Contracts for the external node and measurement stores.
//!
//! The filter, session and aggregator never reach for a process-wide
//! handle; a store is always passed in explicitly, so any of them can run
//! against a fake in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::model::{Node, TrendSeries};

/// Failures surfaced by the external stores. Never retried here; retry and
/// backoff policy belongs to the store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not resolve a node path (invalid or stale).
    #[error("cannot resolve node path '{path}'")]
    Resolution { path: String },
    /// The named measurement source is absent or disabled on the node.
    #[error("node '{path}' has no enabled source named '{attribute}'")]
    NoSuchAttribute { path: String, attribute: String },
}

/// Read access to the asset hierarchy.
///
/// `resolve` returns containers with their children unfetched
/// ([`Children::Unexpanded`](crate::model::Children)); child lists come
/// from `children_of`, in the store's natural order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<Node, StoreError>;
    async fn children_of(&self, path: &str) -> Result<Vec<Node>, StoreError>;
}

/// Read access to recorded measurement data.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Series for the named source on a node over the half-open range
    /// `[start, end)`. Fails with [`StoreError::NoSuchAttribute`] when the
    /// source is absent or disabled on that node.
    async fn series_for(
        &self,
        path: &str,
        attribute: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TrendSeries, StoreError>;
}

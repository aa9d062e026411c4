//! Lazy, stateful tree browsing: the eager filter's per-level pruning rule
//! applied one store round trip at a time, with every expansion cached for
//! the life of the session.
//!
//! Unlike the eager filter, a session cannot know whether a container
//! subtree is empty after filtering without walking all of it, so child
//! containers are always kept provisionally. A container with no
//! qualifying descendants appears expandable and then turns out empty when
//! opened. That trade is deliberate: each call does one level of
//! network-call-sized work.
//!
//! Cache state machine, per container path:
//! `Unexpanded -> Expanding -> Expanded(children)`. A failed fetch rolls
//! `Expanding` back to `Unexpanded` so a later call can retry; nothing ever
//! transitions out of `Expanded`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::filter::{retain_leaf, AttributeFilter};
use crate::model::{Children, Node};
use crate::store::{NodeStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Expansion was requested for a path this session has never seen as a
    /// container.
    #[error("node '{path}' is not a known container in this session")]
    UnknownNode { path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Expansion state for one container path.
enum Slot {
    Unexpanded,
    /// One caller is resolving this path; everyone else waits here.
    Expanding(Arc<Notify>),
    Expanded(Vec<Node>),
}

/// A per-client browsing session over one tree, with a fixed attribute
/// filter.
///
/// Sessions share nothing with each other. The internal lock is held only
/// for slot bookkeeping, never across store calls, so expansions of
/// different paths run in parallel while duplicate expansions of the same
/// path collapse into a single store fetch.
pub struct LazyTreeSession<S> {
    id: Uuid,
    store: Arc<S>,
    root_path: String,
    filter: AttributeFilter,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<S: NodeStore> LazyTreeSession<S> {
    /// The filter is fixed for the session's lifetime; open a new session
    /// to browse with different source names.
    pub fn new(store: Arc<S>, root_path: impl Into<String>, filter: AttributeFilter) -> Self {
        let id = Uuid::new_v4();
        let root_path = root_path.into();
        info!(session = %id, root = %root_path, sources = ?filter.names(), "lazy tree session opened");
        Self {
            id,
            store,
            root_path,
            filter,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resolve the root together with its first level of filtered
    /// children.
    ///
    /// The root is the anchor the caller asked to browse, so it is
    /// returned even when no child qualifies. Calling this again reuses
    /// the cached first level.
    pub async fn open_root(&self) -> Result<Node, SessionError> {
        let root = self.store.resolve(&self.root_path).await?;
        if !root.is_container() {
            return Ok(root);
        }
        {
            let mut slots = self.slots.lock().await;
            slots.entry(root.path.clone()).or_insert(Slot::Unexpanded);
        }
        let children = self.expand(&root.path).await?;
        Ok(Node {
            children: Children::Expanded(children),
            ..root
        })
    }

    /// Fetch (or recall) the filtered children of a container seen earlier
    /// in this session.
    ///
    /// Repeated calls return the cached level without touching the store.
    /// Concurrent calls for the same path resolve it exactly once; the
    /// rest observe the cached result.
    pub async fn expand(&self, path: &str) -> Result<Vec<Node>, SessionError> {
        loop {
            let mut slots = self.slots.lock().await;
            let in_flight = match slots.get(path) {
                None => {
                    return Err(SessionError::UnknownNode {
                        path: path.to_string(),
                    })
                }
                Some(Slot::Expanded(children)) => {
                    debug!(session = %self.id, path = %path, "expansion served from cache");
                    return Ok(children.clone());
                }
                Some(Slot::Expanding(notify)) => Some(Arc::clone(notify)),
                Some(Slot::Unexpanded) => None,
            };

            match in_flight {
                Some(notify) => {
                    // The waiter future must exist before the lock drops,
                    // or a wakeup landing in between would be lost.
                    let notified = notify.notified();
                    drop(slots);
                    notified.await;
                    // Re-check the slot; it is now Expanded, or Unexpanded
                    // again if the resolving call failed.
                }
                None => {
                    slots.insert(
                        path.to_string(),
                        Slot::Expanding(Arc::new(Notify::new())),
                    );
                    drop(slots);
                    return self.fetch_level(path).await;
                }
            }
        }
    }

    /// Resolve one level from the store and publish it into the slot this
    /// caller claimed.
    async fn fetch_level(&self, path: &str) -> Result<Vec<Node>, SessionError> {
        debug!(session = %self.id, path = %path, "resolving children");
        let fetched = self.store.children_of(path).await;

        let mut slots = self.slots.lock().await;
        let notify = match slots.remove(path) {
            Some(Slot::Expanding(notify)) => notify,
            // Only the claiming caller transitions a slot out of
            // Expanding, so nothing else can be here.
            _ => Arc::new(Notify::new()),
        };
        match fetched {
            Ok(children) => {
                let level = self.filter_level(children);
                for child in &level {
                    if child.is_container() {
                        slots
                            .entry(child.path.clone())
                            .or_insert(Slot::Unexpanded);
                    }
                }
                debug!(session = %self.id, path = %path, kept = level.len(), "level expanded");
                slots.insert(path.to_string(), Slot::Expanded(level.clone()));
                notify.notify_waiters();
                Ok(level)
            }
            Err(err) => {
                warn!(session = %self.id, path = %path, error = %err, "expansion failed");
                slots.insert(path.to_string(), Slot::Unexpanded);
                notify.notify_waiters();
                Err(err.into())
            }
        }
    }

    /// Per-child rule shared with the eager filter: leaves must carry a
    /// qualifying attribute to be kept; containers are kept provisionally
    /// because their relevance is unknown until expanded further.
    fn filter_level(&self, children: Vec<Node>) -> Vec<Node> {
        children
            .into_iter()
            .filter_map(|child| {
                if child.is_container() {
                    Some(Node {
                        children: Children::Unexpanded,
                        ..child
                    })
                } else {
                    retain_leaf(&child, &self.filter)
                }
            })
            .collect()
    }
}

//! In-memory node and series stores loaded from a fixture file.
//!
//! A fixture describes a whole asset tree plus the recorded samples per
//! (node, source) pair. The stores behave the way a real backend does at
//! the contract level: containers resolve with their children unfetched,
//! series are sliced to the half-open request range, and bookends are
//! synthesized from the nearest samples outside it. Disabled sources are
//! invisible, both in the node's attribute list and at series-fetch time.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Attribute, Children, Node, TrendEvent, TrendSample, TrendSeries};
use crate::store::{NodeStore, SeriesStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read fixture file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse fixture file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate node path '{0}' in fixture")]
    DuplicatePath(String),
}

/// Serde shape of a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub root: FixtureNode,
    #[serde(default)]
    pub series: Vec<FixtureSeries>,
}

/// A node entry. Anything with children (or marked `container`) resolves
/// as a container; everything else is a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureNode {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub container: bool,
    #[serde(default)]
    pub sources: Vec<FixtureSource>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

/// A measurement source on a node. Disabled sources behave as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSource {
    pub name: String,
    /// Store-side identity; defaults to the name when omitted.
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

/// Recorded data for one source, in time order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSeries {
    pub path: String,
    pub attribute: String,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub samples: Vec<FixtureSample>,
    #[serde(default)]
    pub holes: Vec<FixtureHole>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixtureSample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixtureHole {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

struct StoredNode {
    node: Node,
    child_paths: Vec<String>,
}

/// Implements both store contracts from a [`Fixture`].
pub struct FixtureStore {
    root_path: String,
    nodes: HashMap<String, StoredNode>,
    series: Vec<FixtureSeries>,
}

impl FixtureStore {
    pub fn new(fixture: Fixture) -> Result<Self, FixtureError> {
        let mut nodes = HashMap::new();
        index(&fixture.root, &mut nodes)?;
        Ok(Self {
            root_path: fixture.root.path.clone(),
            nodes,
            series: fixture.series,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(&path)?;
        let fixture: Fixture = serde_json::from_str(&content)?;
        let store = Self::new(fixture)?;
        info!(path = %path.as_ref().display(), nodes = store.nodes.len(), "fixture loaded");
        Ok(store)
    }

    /// Path of the fixture's root node.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    fn stored(&self, path: &str) -> Result<&StoredNode, StoreError> {
        self.nodes.get(path).ok_or_else(|| StoreError::Resolution {
            path: path.to_string(),
        })
    }
}

fn index(entry: &FixtureNode, nodes: &mut HashMap<String, StoredNode>) -> Result<(), FixtureError> {
    let attributes = entry
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| Attribute {
            name: s.name.clone(),
            source_ref: s.source_ref.clone().unwrap_or_else(|| s.name.clone()),
        })
        .collect();
    let is_container = entry.container || !entry.children.is_empty();
    let node = Node {
        path: entry.path.clone(),
        display_name: entry.name.clone(),
        attributes,
        children: if is_container {
            Children::Unexpanded
        } else {
            Children::Leaf
        },
    };
    let stored = StoredNode {
        node,
        child_paths: entry.children.iter().map(|c| c.path.clone()).collect(),
    };
    if nodes.insert(entry.path.clone(), stored).is_some() {
        return Err(FixtureError::DuplicatePath(entry.path.clone()));
    }
    for child in &entry.children {
        index(child, nodes)?;
    }
    Ok(())
}

#[async_trait]
impl NodeStore for FixtureStore {
    async fn resolve(&self, path: &str) -> Result<Node, StoreError> {
        Ok(self.stored(path)?.node.clone())
    }

    async fn children_of(&self, path: &str) -> Result<Vec<Node>, StoreError> {
        let stored = self.stored(path)?;
        let mut children = Vec::with_capacity(stored.child_paths.len());
        for child_path in &stored.child_paths {
            children.push(self.stored(child_path)?.node.clone());
        }
        Ok(children)
    }
}

#[async_trait]
impl SeriesStore for FixtureStore {
    async fn series_for(
        &self,
        path: &str,
        attribute: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TrendSeries, StoreError> {
        let stored = self.stored(path)?;
        let source = stored
            .node
            .attribute_named(attribute)
            .ok_or_else(|| StoreError::NoSuchAttribute {
                path: path.to_string(),
                attribute: attribute.to_string(),
            })?;
        let recorded = self.series.iter().find(|s| {
            s.path == path
                && s.attribute == attribute
                && s.source_ref.as_deref().unwrap_or(&s.attribute) == source.source_ref
        });
        Ok(slice_series(recorded, start, end))
    }
}

/// Cut recorded data down to `[start, end)`: in-range samples become
/// events, holes are clipped to the range, and the nearest out-of-range
/// samples become bookends. An enabled source with nothing recorded
/// yields an empty series.
fn slice_series(
    recorded: Option<&FixtureSeries>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> TrendSeries {
    let mut leading = None;
    let mut trailing = None;
    let mut events = Vec::new();

    if let Some(data) = recorded {
        for s in &data.samples {
            if s.at < start {
                leading = Some(TrendSample {
                    timestamp: s.at,
                    value: s.value,
                });
            } else if s.at >= end {
                if trailing.is_none() {
                    trailing = Some(TrendSample {
                        timestamp: s.at,
                        value: s.value,
                    });
                }
            } else {
                events.push(TrendEvent::Sample(TrendSample {
                    timestamp: s.at,
                    value: s.value,
                }));
            }
        }
        for h in &data.holes {
            let from = h.from.max(start);
            let to = h.to.min(end);
            if from < to {
                events.push(TrendEvent::Hole {
                    start: from,
                    end: to,
                });
            }
        }
        events.sort_by_key(event_time);
    }

    TrendSeries {
        start,
        end,
        leading_bookend: leading,
        trailing_bookend: trailing,
        events,
    }
}

fn event_time(event: &TrendEvent) -> DateTime<Utc> {
    match *event {
        TrendEvent::Sample(s) => s.timestamp,
        TrendEvent::Hole { start, .. } => start,
    }
}

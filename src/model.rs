use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named measurement source attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Match key for filtering; compared by exact, case-sensitive equality.
    pub name: String,
    /// Store-side identity of the concrete source. Names are not unique on
    /// a node, so lookups by name break ties on this key.
    pub source_ref: String,
}

/// Child state of a node.
///
/// An unexpanded container is a state of the node itself, not a synthetic
/// placeholder child, so "expandable but not yet loaded" cannot be confused
/// with real data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Children {
    /// Leaf node; never has children.
    Leaf,
    /// Container whose children have not been fetched yet.
    Unexpanded,
    /// Container with materialized children, in store order.
    Expanded(Vec<Node>),
}

/// One entity in the asset tree: a site, an area or a piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque stable identifier, unique within the tree. Used to resolve
    /// the node again later, e.g. when expanding it in a lazy session.
    pub path: String,
    /// Human label; not unique.
    pub display_name: String,
    /// Measurement sources on this node. In practice only leaves carry
    /// them, but the model does not forbid them on containers.
    pub attributes: Vec<Attribute>,
    pub children: Children,
}

impl Node {
    pub fn is_container(&self) -> bool {
        !matches!(self.children, Children::Leaf)
    }

    /// The attribute with the given name. When several sources share a
    /// name, the lexicographically smallest `source_ref` wins so repeated
    /// lookups stay deterministic.
    pub fn attribute_named(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.name == name)
            .min_by(|a, b| a.source_ref.cmp(&b.source_ref))
    }
}

/// A single timestamped measurement (e.g. power in kW).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One entry in a series: a recorded sample, or a gap in which nothing was
/// recorded and the value is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrendEvent {
    Sample(TrendSample),
    Hole {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Recorded data for a half-open time range `[start, end)`.
///
/// Bookends are the best-known values just outside the range; `None` means
/// unknown before/after. Samples, bookends and holes are monotonic in time
/// and never overlap each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub leading_bookend: Option<TrendSample>,
    pub trailing_bookend: Option<TrendSample>,
    /// Samples and holes interleaved in time order.
    pub events: Vec<TrendEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(attrs: Vec<(&str, &str)>) -> Node {
        Node {
            path: "/eq".to_string(),
            display_name: "eq".to_string(),
            attributes: attrs
                .into_iter()
                .map(|(name, source_ref)| Attribute {
                    name: name.to_string(),
                    source_ref: source_ref.to_string(),
                })
                .collect(),
            children: Children::Leaf,
        }
    }

    #[test]
    fn test_is_container() {
        let leaf = leaf_with(vec![]);
        assert!(!leaf.is_container());

        let unexpanded = Node {
            children: Children::Unexpanded,
            ..leaf.clone()
        };
        assert!(unexpanded.is_container());

        let expanded = Node {
            children: Children::Expanded(vec![leaf.clone()]),
            ..leaf
        };
        assert!(expanded.is_container());
    }

    #[test]
    fn test_attribute_named_exact_match() {
        let node = leaf_with(vec![("kW Demand", "trend1"), ("Zone Temp", "trend2")]);
        assert_eq!(
            node.attribute_named("Zone Temp").map(|a| a.source_ref.as_str()),
            Some("trend2")
        );
        assert!(node.attribute_named("zone temp").is_none()); // case-sensitive
        assert!(node.attribute_named("Humidity").is_none());
    }

    #[test]
    fn test_attribute_named_tie_break() {
        // Two sources share a name; the smaller source_ref wins regardless
        // of declaration order.
        let node = leaf_with(vec![("kW Demand", "trend9"), ("kW Demand", "trend2")]);
        assert_eq!(
            node.attribute_named("kW Demand").map(|a| a.source_ref.as_str()),
            Some("trend2")
        );
    }
}

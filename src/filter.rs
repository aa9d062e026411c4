//! Eager tree pruning: walk the whole hierarchy once and keep only the
//! branches that lead to a qualifying measurement source.
//!
//! The decision for a node is made after its whole subtree has been
//! visited, so an uninteresting branch disappears entirely instead of
//! showing up as an empty container.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::model::{Attribute, Children, Node};
use crate::store::{NodeStore, StoreError};

/// Set of requested source names shared by both tree modes.
///
/// An empty set means "any source qualifies"; matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct AttributeFilter {
    names: Vec<String>,
}

impl AttributeFilter {
    pub fn new<I, T>(names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that accepts every source.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Leaf rule shared by both tree modes: keep the leaf with only its
/// qualifying attributes, or prune it when none match. A leaf with no
/// attributes at all is always pruned.
pub(crate) fn retain_leaf(node: &Node, filter: &AttributeFilter) -> Option<Node> {
    let retained: Vec<Attribute> = node
        .attributes
        .iter()
        .filter(|a| filter.matches(&a.name))
        .cloned()
        .collect();
    if retained.is_empty() {
        return None;
    }
    Some(Node {
        path: node.path.clone(),
        display_name: node.display_name.clone(),
        attributes: retained,
        children: Children::Leaf,
    })
}

/// Walks a tree from the node store and produces a pruned snapshot
/// containing only the nodes relevant to the requested source names.
pub struct TreeFilter<S> {
    store: Arc<S>,
}

impl<S: NodeStore> TreeFilter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Prune the tree rooted at `root_path`.
    ///
    /// Returns `None` when nothing under the root qualifies, including the
    /// root itself. Callers that need an always-visible root anchor handle
    /// that themselves.
    pub async fn filter(
        &self,
        root_path: &str,
        filter: &AttributeFilter,
    ) -> Result<Option<Node>, StoreError> {
        let root = self.store.resolve(root_path).await?;
        debug!(path = %root.path, sources = ?filter.names(), "filtering tree");
        self.visit(root, filter).await
    }

    /// Depth-first walk. Each call decides for one node after its subtree
    /// has been visited: leaves by the attribute rule, containers by
    /// whether any child survived.
    fn visit<'a>(
        &'a self,
        node: Node,
        filter: &'a AttributeFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Node>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if !node.is_container() {
                return Ok(retain_leaf(&node, filter));
            }
            let mut kept = Vec::new();
            for child in self.store.children_of(&node.path).await? {
                if let Some(snapshot) = self.visit(child, filter).await? {
                    kept.push(snapshot);
                }
            }
            if kept.is_empty() {
                return Ok(None);
            }
            Ok(Some(Node {
                children: Children::Expanded(kept),
                ..node
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Fixture, FixtureNode, FixtureSource, FixtureStore};
    use crate::model::Children;

    fn source(name: &str) -> FixtureSource {
        FixtureSource {
            name: name.to_string(),
            source_ref: None,
            enabled: true,
        }
    }

    fn leaf(path: &str, sources: Vec<FixtureSource>) -> FixtureNode {
        FixtureNode {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            container: false,
            sources,
            children: vec![],
        }
    }

    fn area(path: &str, children: Vec<FixtureNode>) -> FixtureNode {
        FixtureNode {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            container: true,
            sources: vec![],
            children,
        }
    }

    /// system
    ///   area1 { eq5[A] }
    ///   eq2 []
    ///   area3 { eq6[A], area7 { eq8[], eq9[] } }
    fn scenario_store() -> Arc<FixtureStore> {
        let root = area(
            "/system",
            vec![
                area("/system/area1", vec![leaf("/system/area1/eq5", vec![source("A")])]),
                leaf("/system/eq2", vec![]),
                area(
                    "/system/area3",
                    vec![
                        leaf("/system/area3/eq6", vec![source("A")]),
                        area(
                            "/system/area3/area7",
                            vec![
                                leaf("/system/area3/area7/eq8", vec![]),
                                leaf("/system/area3/area7/eq9", vec![]),
                            ],
                        ),
                    ],
                ),
            ],
        );
        Arc::new(
            FixtureStore::new(Fixture {
                root,
                series: vec![],
            })
            .unwrap(),
        )
    }

    fn child_names(node: &Node) -> Vec<&str> {
        match &node.children {
            Children::Expanded(children) => {
                children.iter().map(|c| c.display_name.as_str()).collect()
            }
            _ => vec![],
        }
    }

    #[tokio::test]
    async fn test_scenario_prunes_uninteresting_branches() {
        let filter = TreeFilter::new(scenario_store());
        let tree = filter
            .filter("/system", &AttributeFilter::new(["A"]))
            .await
            .unwrap()
            .expect("root should survive");

        // system{area1{eq5}, area3{eq6}}: eq2, area7 and its children gone
        assert_eq!(tree.display_name, "system");
        assert_eq!(child_names(&tree), vec!["area1", "area3"]);

        let Children::Expanded(children) = &tree.children else {
            panic!("root should be expanded");
        };
        assert_eq!(child_names(&children[0]), vec!["eq5"]);
        assert_eq!(child_names(&children[1]), vec!["eq6"]);
    }

    #[tokio::test]
    async fn test_no_container_kept_without_descendant_leaf() {
        let filter = TreeFilter::new(scenario_store());
        let tree = filter
            .filter("/system", &AttributeFilter::any())
            .await
            .unwrap()
            .unwrap();

        // Empty filter keeps anything with at least one source: eq5 and
        // eq6 survive, eq2/eq8/eq9 (no sources) do not, so area7 is gone.
        assert_eq!(child_names(&tree), vec!["area1", "area3"]);
        let Children::Expanded(children) = &tree.children else {
            panic!("root should be expanded");
        };
        assert_eq!(child_names(&children[1]), vec!["eq6"]);
    }

    #[tokio::test]
    async fn test_match_is_case_sensitive() {
        let filter = TreeFilter::new(scenario_store());
        let tree = filter
            .filter("/system", &AttributeFilter::new(["a"]))
            .await
            .unwrap();
        assert!(tree.is_none());
    }

    #[tokio::test]
    async fn test_root_pruned_when_nothing_matches() {
        let filter = TreeFilter::new(scenario_store());
        let tree = filter
            .filter("/system", &AttributeFilter::new(["Humidity"]))
            .await
            .unwrap();
        assert!(tree.is_none());
    }

    #[tokio::test]
    async fn test_leaf_keeps_only_matching_attributes() {
        let root = area(
            "/plant",
            vec![leaf(
                "/plant/eq1",
                vec![source("kW Demand"), source("Zone Temp")],
            )],
        );
        let store = Arc::new(FixtureStore::new(Fixture { root, series: vec![] }).unwrap());

        let tree = TreeFilter::new(store)
            .filter("/plant", &AttributeFilter::new(["kW Demand"]))
            .await
            .unwrap()
            .unwrap();

        let Children::Expanded(children) = &tree.children else {
            panic!("root should be expanded");
        };
        let names: Vec<&str> = children[0].attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["kW Demand"]);
    }

    #[tokio::test]
    async fn test_children_order_is_a_subsequence_of_source_order() {
        let root = area(
            "/site",
            vec![
                leaf("/site/eq1", vec![source("A")]),
                leaf("/site/eq2", vec![source("B")]),
                leaf("/site/eq3", vec![source("A")]),
                leaf("/site/eq4", vec![source("A")]),
            ],
        );
        let store = Arc::new(FixtureStore::new(Fixture { root, series: vec![] }).unwrap());

        let tree = TreeFilter::new(store)
            .filter("/site", &AttributeFilter::new(["A"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child_names(&tree), vec!["eq1", "eq3", "eq4"]);
    }

    #[tokio::test]
    async fn test_leaf_root_follows_leaf_rule() {
        let root = leaf("/meter", vec![source("kW Demand")]);
        let store = Arc::new(FixtureStore::new(Fixture { root, series: vec![] }).unwrap());
        let filter = TreeFilter::new(store);

        let kept = filter
            .filter("/meter", &AttributeFilter::new(["kW Demand"]))
            .await
            .unwrap();
        assert!(kept.is_some());

        let pruned = filter
            .filter("/meter", &AttributeFilter::new(["Zone Temp"]))
            .await
            .unwrap();
        assert!(pruned.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_root_propagates() {
        let filter = TreeFilter::new(scenario_store());
        let err = filter
            .filter("/nowhere", &AttributeFilter::any())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Resolution { .. }));
    }
}

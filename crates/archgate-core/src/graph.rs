//! Dependency graph consumed by rule evaluation, and the provider interface.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DiscoveryConfig;

/// Relation an edge represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// `import` / `require` of another module.
    #[default]
    Import,
    /// Any other use (re-export, dynamic reference).
    Usage,
}

/// A source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    /// Module path, relative to the project root.
    pub path: String,
    /// Marked as an entry point by the provider.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub entry_point: bool,
    /// Free-form tags custom rules can select on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ModuleNode {
    /// Creates a node with no tags.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_point: false,
            tags: Vec::new(),
        }
    }

    /// Marks the node as an entry point.
    #[must_use]
    pub fn entry_point(mut self) -> Self {
        self.entry_point = true;
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// A directed dependency between two modules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Depending module.
    pub from: String,
    /// Depended-on module.
    pub to: String,
    /// Relation kind.
    #[serde(default)]
    pub kind: EdgeKind,
}

/// Serialized form read by [`JsonGraphProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes with metadata; edge endpoints not listed here are added bare.
    #[serde(default)]
    pub nodes: Vec<ModuleNode>,
    /// Edges.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Modules and their import/usage edges.
///
/// Nodes are kept sorted by path so traversals are deterministic. Cycles are
/// ordinary data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, ModuleNode>,
    outgoing: BTreeMap<String, Vec<Edge>>,
    inbound: HashMap<String, usize>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, merging metadata if it already exists.
    pub fn add_node(&mut self, node: ModuleNode) {
        match self.nodes.get_mut(&node.path) {
            Some(existing) => {
                existing.entry_point |= node.entry_point;
                for tag in node.tags {
                    if !existing.tags.contains(&tag) {
                        existing.tags.push(tag);
                    }
                }
            }
            None => {
                self.nodes.insert(node.path.clone(), node);
            }
        }
    }

    /// Adds an edge, registering both endpoints as nodes.
    ///
    /// Identical edges (same endpoints and kind) are stored once.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) {
        let edge = Edge {
            from: from.into(),
            to: to.into(),
            kind,
        };
        self.ensure_node(&edge.from);
        self.ensure_node(&edge.to);
        let edges = self.outgoing.entry(edge.from.clone()).or_default();
        if edges.contains(&edge) {
            return;
        }
        let first_from_source = !edges.iter().any(|e| e.to == edge.to);
        if first_from_source && edge.from != edge.to {
            *self.inbound.entry(edge.to.clone()).or_default() += 1;
        }
        edges.push(edge);
        self.edge_count += 1;
    }

    /// Builder-style [`DependencyGraph::add_edge`] for import edges.
    #[must_use]
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(from, to, EdgeKind::Import);
        self
    }

    /// Builder-style [`DependencyGraph::add_node`].
    #[must_use]
    pub fn with_node(mut self, node: ModuleNode) -> Self {
        self.add_node(node);
        self
    }

    fn ensure_node(&mut self, path: &str) {
        if !self.nodes.contains_key(path) {
            self.nodes.insert(path.to_string(), ModuleNode::new(path));
        }
    }

    /// Nodes sorted by path.
    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    /// Node paths sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Looks up node metadata.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&ModuleNode> {
        self.nodes.get(path)
    }

    /// Edges leaving `path`, in insertion order.
    #[must_use]
    pub fn edges_from(&self, path: &str) -> &[Edge] {
        self.outgoing.get(path).map_or(&[], Vec::as_slice)
    }

    /// All edges, grouped by sorted source path.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.outgoing.values().flatten()
    }

    /// Distinct successors of `path`, sorted.
    #[must_use]
    pub fn successors(&self, path: &str) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .edges_from(path)
            .iter()
            .map(|e| e.to.as_str())
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Number of distinct other modules depending on `path`.
    #[must_use]
    pub fn inbound_count(&self, path: &str) -> usize {
        self.inbound.get(path).copied().unwrap_or(0)
    }

    /// Returns `true` if `path` depends on itself.
    #[must_use]
    pub fn has_self_edge(&self, path: &str) -> bool {
        self.edges_from(path).iter().any(|e| e.to == path)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns `true` if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a graph from its serialized form.
    #[must_use]
    pub fn from_document(document: GraphDocument) -> Self {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node);
        }
        for edge in document.edges {
            graph.add_edge(edge.from, edge.to, edge.kind);
        }
        graph
    }

    /// Serialized form of this graph.
    #[must_use]
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    /// Copy of the graph without nodes matching any of `ignore`, and their edges.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidIgnorePattern`] if a glob does not parse.
    pub fn without_ignored(&self, ignore: &[String]) -> Result<Self, GraphError> {
        if ignore.is_empty() {
            return Ok(self.clone());
        }
        let patterns = ignore
            .iter()
            .map(|raw| {
                glob::Pattern::new(raw).map_err(|e| GraphError::InvalidIgnorePattern {
                    pattern: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ignored = |path: &str| patterns.iter().any(|p| p.matches(path));

        let mut graph = Self::new();
        for node in self.nodes.values().filter(|n| !ignored(&n.path)) {
            graph.add_node(node.clone());
        }
        for edge in self.edges() {
            if !ignored(&edge.from) && !ignored(&edge.to) {
                graph.add_edge(edge.from.clone(), edge.to.clone(), edge.kind);
            }
        }
        debug!(
            dropped = self.node_count() - graph.node_count(),
            "Applied discovery ignore patterns"
        );
        Ok(graph)
    }
}

// ────────────────────────────────────────────
// Codebase metadata
// ────────────────────────────────────────────

/// Facts about the codebase that are not part of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseMeta {
    /// Module paths that are entry points.
    #[serde(default)]
    pub entry_points: BTreeSet<String>,
    /// Boolean hints from `discovery.hints`.
    #[serde(default)]
    pub hints: BTreeMap<String, bool>,
}

/// Hint key prefix marking an entry point (`entry:src/main.ts = true`).
pub const ENTRY_HINT_PREFIX: &str = "entry:";

impl CodebaseMeta {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry point.
    #[must_use]
    pub fn with_entry_point(mut self, path: impl Into<String>) -> Self {
        self.entry_points.insert(path.into());
        self
    }

    /// Merges the hints of a discovery section.
    #[must_use]
    pub fn with_discovery(mut self, discovery: &DiscoveryConfig) -> Self {
        for (key, value) in &discovery.hints {
            self.hints.insert(key.clone(), *value);
        }
        self
    }

    /// Returns `true` if `path` is listed as an entry point or hinted as one.
    #[must_use]
    pub fn is_entry_point(&self, path: &str) -> bool {
        self.entry_points.contains(path)
            || self
                .hints
                .get(&format!("{ENTRY_HINT_PREFIX}{path}"))
                .copied()
                .unwrap_or(false)
    }
}

// ────────────────────────────────────────────
// Providers
// ────────────────────────────────────────────

/// Errors from building a dependency graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph file could not be read.
    #[error("failed to read graph {}: {source}", .path.display())]
    Io {
        /// The unreadable path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The graph document is malformed.
    #[error("failed to parse graph {}: {message}", .path.display())]
    Parse {
        /// The graph file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A `discovery.ignore` glob does not parse.
    #[error("invalid ignore pattern `{pattern}`: {reason}")]
    InvalidIgnorePattern {
        /// The rejected glob.
        pattern: String,
        /// Parser message.
        reason: String,
    },

    /// Any other provider-specific failure.
    #[error("{0}")]
    Provider(String),
}

/// Builds the dependency graph of a codebase.
pub trait GraphProvider: Send + Sync {
    /// Builds the graph, honoring `discovery.ignore`.
    ///
    /// # Errors
    ///
    /// Returns an error if the codebase cannot be read.
    fn build(&self, discovery: &DiscoveryConfig) -> Result<DependencyGraph, GraphError>;
}

/// An in-memory graph serves as its own provider.
impl GraphProvider for DependencyGraph {
    fn build(&self, discovery: &DiscoveryConfig) -> Result<DependencyGraph, GraphError> {
        self.without_ignored(&discovery.ignore)
    }
}

/// Reads a `{nodes, edges}` JSON document from disk.
#[derive(Debug, Clone)]
pub struct JsonGraphProvider {
    path: PathBuf,
}

impl JsonGraphProvider {
    /// Creates a provider for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The graph file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GraphProvider for JsonGraphProvider {
    fn build(&self, discovery: &DiscoveryConfig) -> Result<DependencyGraph, GraphError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| GraphError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: GraphDocument =
            serde_json::from_str(&content).map_err(|e| GraphError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        let graph = DependencyGraph::from_document(document);
        debug!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded dependency graph"
        );
        graph.without_ignored(&discovery.ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_edge_registers_endpoints() {
        let graph = DependencyGraph::new().with_edge("a", "b");
        assert_eq!(graph.node_count(), 2);
        assert!(graph.node("b").is_some());
        assert_eq!(graph.edges_from("a").len(), 1);
        assert!(graph.edges_from("b").is_empty());
    }

    #[test]
    fn inbound_counts_distinct_other_sources() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "c", EdgeKind::Import);
        graph.add_edge("a", "c", EdgeKind::Usage);
        graph.add_edge("b", "c", EdgeKind::Import);
        graph.add_edge("c", "c", EdgeKind::Import);
        assert_eq!(graph.inbound_count("c"), 2);
        assert_eq!(graph.inbound_count("a"), 0);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.has_self_edge("c"));
    }

    #[test]
    fn duplicate_edges_are_stored_once() {
        let graph = DependencyGraph::new().with_edge("a", "b").with_edge("a", "b");
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.inbound_count("b"), 1);
    }

    #[test]
    fn successors_are_sorted_and_distinct() {
        let mut graph = DependencyGraph::new().with_edge("a", "z").with_edge("a", "m");
        graph.add_edge("a", "m", EdgeKind::Usage);
        assert_eq!(graph.successors("a"), vec!["m", "z"]);
    }

    #[test]
    fn add_node_merges_metadata() {
        let graph = DependencyGraph::new()
            .with_edge("src/main.ts", "src/lib.ts")
            .with_node(ModuleNode::new("src/main.ts").entry_point().with_tags(["cli"]));
        let node = graph.node("src/main.ts").unwrap();
        assert!(node.entry_point);
        assert_eq!(node.tags, vec!["cli"]);
    }

    #[test]
    fn without_ignored_drops_nodes_and_edges() {
        let graph = DependencyGraph::new()
            .with_edge("src/a.ts", "dist/a.js")
            .with_edge("src/a.ts", "src/b.ts");
        let filtered = graph.without_ignored(&["dist/**".to_string()]).unwrap();
        assert_eq!(filtered.node_count(), 2);
        assert_eq!(filtered.edge_count(), 1);
        assert!(filtered.node("dist/a.js").is_none());
    }

    #[test]
    fn invalid_ignore_pattern_is_an_error() {
        let err = DependencyGraph::new()
            .without_ignored(&["[".to_string()])
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidIgnorePattern { .. }));
    }

    #[test]
    fn meta_entry_points_from_hints() {
        let discovery = DiscoveryConfig {
            ignore: vec![],
            hints: [
                ("entry:src/main.ts".to_string(), true),
                ("entry:src/old.ts".to_string(), false),
            ]
            .into_iter()
            .collect(),
        };
        let meta = CodebaseMeta::new()
            .with_entry_point("src/cli.ts")
            .with_discovery(&discovery);
        assert!(meta.is_entry_point("src/main.ts"));
        assert!(meta.is_entry_point("src/cli.ts"));
        assert!(!meta.is_entry_point("src/old.ts"));
    }

    #[test]
    fn json_provider_reads_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(
            &path,
            r#"{
                "nodes": [{"path": "src/main.ts", "entry_point": true}],
                "edges": [
                    {"from": "src/main.ts", "to": "src/app.ts"},
                    {"from": "src/app.ts", "to": "node_modules/x.js", "kind": "usage"}
                ]
            }"#,
        )
        .unwrap();
        let discovery = DiscoveryConfig {
            ignore: vec!["node_modules/**".into()],
            hints: BTreeMap::new(),
        };
        let graph = JsonGraphProvider::new(&path).build(&discovery).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.node("src/main.ts").unwrap().entry_point);
    }

    #[test]
    fn json_provider_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = JsonGraphProvider::new(dir.path().join("none.json"))
            .build(&DiscoveryConfig::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn json_provider_reports_malformed_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, r#"{"edges": [{"from": "a"}]}"#).unwrap();
        let err = JsonGraphProvider::new(&path)
            .build(&DiscoveryConfig::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }

    #[test]
    fn document_round_trip_keeps_metadata() {
        let graph = DependencyGraph::new()
            .with_node(ModuleNode::new("a").with_tags(["core"]))
            .with_edge("a", "b");
        assert_eq!(DependencyGraph::from_document(graph.to_document()), graph);
    }
}

//! Context passed to rules during evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{ArchitectureConfig, Layer};
use crate::error::EvaluationError;
use crate::graph::{CodebaseMeta, DependencyGraph};
use crate::pattern::segments;

/// Nodes visited between cancellation checks.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Shared flag used to stop a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token; every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancellationToken::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Classifies module paths into configured layers.
///
/// A path belongs to the layer whose path prefix matches on a segment
/// boundary; the longest prefix wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerResolver {
    /// `(segments, name, position)`, longest prefix first.
    layers: Vec<(Vec<String>, String, usize)>,
}

impl LayerResolver {
    /// Builds a resolver; `None` if there are no layers.
    #[must_use]
    pub fn new(layers: &[Layer]) -> Option<Self> {
        if layers.is_empty() {
            return None;
        }
        let mut entries: Vec<(Vec<String>, String, usize)> = layers
            .iter()
            .enumerate()
            .map(|(position, layer)| {
                (
                    segments(&layer.path).map(str::to_string).collect(),
                    layer.name.clone(),
                    position,
                )
            })
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.2.cmp(&b.2)));
        Some(Self { layers: entries })
    }

    /// Layer name and its position in the configured order.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<(&str, usize)> {
        let parts: Vec<&str> = segments(path).collect();
        self.layers
            .iter()
            .find(|(prefix, _, _)| {
                !prefix.is_empty()
                    && prefix.len() <= parts.len()
                    && prefix.iter().zip(&parts).all(|(a, b)| a == b)
            })
            .map(|(_, name, position)| (name.as_str(), *position))
    }

    /// Position of a layer by name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.layers
            .iter()
            .find(|(_, n, _)| n == name)
            .map(|(_, _, position)| *position)
    }
}

/// Everything a rule may read while evaluating.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    /// The dependency graph.
    pub graph: &'a DependencyGraph,
    /// Codebase metadata.
    pub meta: &'a CodebaseMeta,
    /// Architecture section of the effective configuration.
    pub architecture: Option<&'a ArchitectureConfig>,
    layers: Option<LayerResolver>,
    cancel: CancellationToken,
    batch_size: usize,
}

impl<'a> RuleContext<'a> {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new(
        graph: &'a DependencyGraph,
        meta: &'a CodebaseMeta,
        architecture: Option<&'a ArchitectureConfig>,
    ) -> Self {
        Self {
            graph,
            meta,
            architecture,
            layers: architecture.and_then(|a| LayerResolver::new(&a.layers)),
            cancel: CancellationToken::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Uses a shared cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the checkpoint interval (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Layer resolver, if layers are configured.
    #[must_use]
    pub fn layers(&self) -> Option<&LayerResolver> {
        self.layers.as_ref()
    }

    /// Layer resolver, failing the rule if no layers are configured.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::MissingLayers`].
    pub fn require_layers(&self) -> Result<&LayerResolver, EvaluationError> {
        self.layers.as_ref().ok_or(EvaluationError::MissingLayers)
    }

    /// Layer name of a module path.
    #[must_use]
    pub fn layer_of(&self, path: &str) -> Option<&str> {
        self.layers
            .as_ref()
            .and_then(|l| l.resolve(path))
            .map(|(name, _)| name)
    }

    /// Returns `true` once the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation check for traversals; call with the number of nodes visited.
    ///
    /// Only every `batch_size`-th call actually reads the token.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::Cancelled`] once the run is cancelled.
    pub fn checkpoint(&self, visited: usize) -> Result<(), EvaluationError> {
        if visited % self.batch_size == 0 && self.cancel.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }
        Ok(())
    }
}

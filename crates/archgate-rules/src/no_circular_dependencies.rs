//! Rule to forbid import cycles between modules.
//!
//! # Detection
//!
//! Strongly connected components are found with Tarjan's algorithm, run
//! iteratively so deep graphs cannot exhaust the stack. A component with more
//! than one module, or a single module importing itself, is one violation.
//!
//! The violation is reported at the lexicographically smallest module of the
//! cycle. `related_paths` lists the other members in the order a walk from
//! that module along sorted successor edges reaches them.
//!
//! # Configuration
//!
//! None.

use std::collections::{HashMap, HashSet};

use archgate_core::{
    DependencyGraph, EvaluationError, GraphRule, RuleContext, RuleDefinition, Severity, Violation,
};
use tracing::debug;

/// Rule name for no-circular-dependencies.
pub const NAME: &str = "no-circular-dependencies";

/// Forbids dependency cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCircularDependencies;

impl NoCircularDependencies {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl GraphRule for NoCircularDependencies {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Forbids circular dependencies between modules"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        let graph = ctx.graph;
        let cycles = find_cycles(graph, ctx)?;
        debug!(cycles = cycles.len(), "Cycle detection finished");

        Ok(cycles
            .into_iter()
            .map(|members| {
                let order = walk_cycle(graph, &members);
                let chain = order
                    .iter()
                    .chain(order.first())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(" -> ");
                let mut related = order.into_iter();
                let representative = related.next().unwrap_or_default();
                Violation::for_rule(
                    rule,
                    representative,
                    format!("circular dependency: {chain}"),
                )
                .with_related_paths(related.map(str::to_string))
            })
            .collect())
    }
}

// ────────────────────────────────────────────
// Tarjan
// ────────────────────────────────────────────

struct Frame {
    node: usize,
    successors: Vec<usize>,
    next: usize,
}

struct Tarjan<'g> {
    graph: &'g DependencyGraph,
    paths: Vec<&'g str>,
    ids: HashMap<&'g str, usize>,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    frames: Vec<Frame>,
    counter: usize,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        let paths: Vec<&'g str> = graph.paths().collect();
        let ids = paths.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let n = paths.len();
        Self {
            graph,
            paths,
            ids,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            frames: Vec::new(),
            counter: 0,
        }
    }

    /// Assigns the next index to `node` and pushes its frame; returns the
    /// number of nodes visited so far.
    fn enter(&mut self, node: usize) -> usize {
        self.index[node] = Some(self.counter);
        self.low[node] = self.counter;
        self.counter += 1;
        self.on_stack[node] = true;
        self.stack.push(node);
        let successors = self
            .graph
            .successors(self.paths[node])
            .into_iter()
            .filter_map(|s| self.ids.get(s).copied())
            .collect();
        self.frames.push(Frame {
            node,
            successors,
            next: 0,
        });
        self.counter
    }

    /// Cyclic components, each sorted, in order of their smallest member.
    fn run(mut self, ctx: &RuleContext<'_>) -> Result<Vec<Vec<&'g str>>, EvaluationError> {
        let mut cycles = Vec::new();
        for root in 0..self.paths.len() {
            if self.index[root].is_some() {
                continue;
            }
            let visited = self.enter(root);
            ctx.checkpoint(visited)?;

            loop {
                let Some(frame) = self.frames.last_mut() else {
                    break;
                };
                let node = frame.node;
                if let Some(&next) = frame.successors.get(frame.next) {
                    frame.next += 1;
                    match self.index[next] {
                        None => {
                            let visited = self.enter(next);
                            ctx.checkpoint(visited)?;
                        }
                        Some(next_index) if self.on_stack[next] => {
                            self.low[node] = self.low[node].min(next_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                self.frames.pop();
                if let Some(parent) = self.frames.last() {
                    self.low[parent.node] = self.low[parent.node].min(self.low[node]);
                }
                if Some(self.low[node]) == self.index[node] {
                    if let Some(members) = self.pop_component(node) {
                        cycles.push(members);
                    }
                }
            }
        }
        cycles.sort();
        Ok(cycles)
    }

    /// Pops the component rooted at `node`; `Some` if it is a cycle.
    fn pop_component(&mut self, node: usize) -> Option<Vec<&'g str>> {
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack[member] = false;
            component.push(member);
            if member == node {
                break;
            }
        }
        if component.len() == 1 && !self.graph.has_self_edge(self.paths[node]) {
            return None;
        }
        let mut members: Vec<&'g str> = component.into_iter().map(|m| self.paths[m]).collect();
        members.sort_unstable();
        Some(members)
    }
}

fn find_cycles<'g>(
    graph: &'g DependencyGraph,
    ctx: &RuleContext<'_>,
) -> Result<Vec<Vec<&'g str>>, EvaluationError> {
    Tarjan::new(graph).run(ctx)
}

/// Members of a cycle in visiting order, starting at the smallest one.
fn walk_cycle<'g>(graph: &'g DependencyGraph, members: &[&'g str]) -> Vec<&'g str> {
    let Some(&start) = members.first() else {
        return Vec::new();
    };
    let mut order = Vec::with_capacity(members.len());
    let mut seen = HashSet::new();
    let mut pending = vec![start];
    while let Some(node) = pending.pop() {
        if !seen.insert(node) {
            continue;
        }
        order.push(node);
        let next = graph
            .successors(node)
            .into_iter()
            .filter(|s| members.binary_search(s).is_ok() && !seen.contains(s));
        let mut next: Vec<&'g str> = next.collect();
        next.reverse();
        pending.extend(next);
    }
    order
}

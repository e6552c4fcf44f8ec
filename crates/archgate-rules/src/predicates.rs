//! Built-in predicates for custom rules.
//!
//! | `condition.type` | Holds for `(subject, target)` when |
//! |------------------|------------------------------------|
//! | `dependency` | the subject has a direct edge to the target |
//! | `transitive-dependency` | the target is reachable from the subject |

use std::collections::{HashSet, VecDeque};

use archgate_core::{EvaluationError, Matcher, Predicate, PredicateMatches, RuleContext};

/// Condition type of [`DependencyPredicate`].
pub const DEPENDENCY: &str = "dependency";

/// Condition type of [`TransitiveDependencyPredicate`].
pub const TRANSITIVE_DEPENDENCY: &str = "transitive-dependency";

fn subjects<'g>(ctx: &RuleContext<'g>, from: &Matcher) -> Vec<&'g str> {
    let graph = ctx.graph;
    graph
        .nodes()
        .filter(|node| from.matches(node, ctx.layer_of(&node.path)))
        .map(|node| node.path.as_str())
        .collect()
}

fn target_matches(ctx: &RuleContext<'_>, to: &Matcher, path: &str) -> bool {
    ctx.graph
        .node(path)
        .is_some_and(|node| to.matches(node, ctx.layer_of(path)))
}

/// Direct dependency between modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyPredicate;

impl Predicate for DependencyPredicate {
    fn name(&self) -> &'static str {
        DEPENDENCY
    }

    fn description(&self) -> &'static str {
        "Subject imports or uses the target directly"
    }

    fn find(
        &self,
        ctx: &RuleContext<'_>,
        from: &Matcher,
        to: &Matcher,
    ) -> Result<PredicateMatches, EvaluationError> {
        let mut found = PredicateMatches::default();
        for (visited, subject) in subjects(ctx, from).into_iter().enumerate() {
            ctx.checkpoint(visited)?;
            for target in ctx.graph.successors(subject) {
                if target != subject && target_matches(ctx, to, target) {
                    found.matches.push((subject.to_string(), target.to_string()));
                }
            }
            found.subjects.push(subject.to_string());
        }
        Ok(found)
    }
}

/// Dependency through any number of intermediate modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveDependencyPredicate;

impl Predicate for TransitiveDependencyPredicate {
    fn name(&self) -> &'static str {
        TRANSITIVE_DEPENDENCY
    }

    fn description(&self) -> &'static str {
        "Target is reachable from the subject"
    }

    fn find(
        &self,
        ctx: &RuleContext<'_>,
        from: &Matcher,
        to: &Matcher,
    ) -> Result<PredicateMatches, EvaluationError> {
        let mut found = PredicateMatches::default();
        let mut visited = 0usize;
        for subject in subjects(ctx, from) {
            let mut seen: HashSet<&str> = HashSet::from([subject]);
            let mut queue: VecDeque<&str> = VecDeque::from([subject]);
            let mut reached = Vec::new();
            while let Some(node) = queue.pop_front() {
                visited += 1;
                ctx.checkpoint(visited)?;
                for next in ctx.graph.successors(node) {
                    if seen.insert(next) {
                        queue.push_back(next);
                        if target_matches(ctx, to, next) {
                            reached.push(next);
                        }
                    }
                }
            }
            reached.sort_unstable();
            found.matches.extend(
                reached
                    .into_iter()
                    .map(|target| (subject.to_string(), target.to_string())),
            );
            found.subjects.push(subject.to_string());
        }
        Ok(found)
    }
}

//! Measurement Planner
//!
//! Builds the execution plan: which strategies to run, in which order, over
//! which problem sizes.
//!
//! Selection options:
//! - Explicit strategy ids, as typed by the user. Anything that does not name
//!   a registered strategy (negative, non-numeric, out of range) is warned
//!   about and skipped. Aliases resolve to their strategy.
//! - Regex pattern matching on strategy name
//!
//! Ordering: strategies run in ascending id order for deterministic output.

use offbench_core::{DispatchStrategy, StrategyId, StrategyRegistry};
use regex::Regex;

/// Largest problem size in the sweep ladder
pub const SWEEP_MAX_SIZE: usize = 8192;

/// Execution plan for one driver run
pub struct ExecutionPlan<'r> {
    /// Ordered strategies to measure
    pub strategies: Vec<&'r dyn DispatchStrategy>,
    /// Problem sizes, measured in this order for every strategy
    pub sizes: Vec<usize>,
    /// Requested ids that do not name a registered strategy, verbatim
    pub skipped: Vec<String>,
}

/// Powers of two from 1 up to [`SWEEP_MAX_SIZE`]
pub fn size_ladder() -> Vec<usize> {
    std::iter::successors(Some(1usize), |&n| n.checked_mul(2))
        .take_while(|&n| n <= SWEEP_MAX_SIZE)
        .collect()
}

/// Select strategies from the registry
///
/// An empty `ids` selects every registered strategy. Duplicated ids run once.
pub fn select_strategies<'r, S: AsRef<str>>(
    registry: &'r StrategyRegistry,
    ids: &[S],
    filter: Option<&Regex>,
) -> (Vec<&'r dyn DispatchStrategy>, Vec<String>) {
    let mut skipped = Vec::new();
    let mut wanted: Vec<StrategyId> = if ids.is_empty() {
        registry.ids()
    } else {
        ids.iter()
            .filter_map(|raw| {
                let raw = raw.as_ref().trim();
                let resolved = raw
                    .parse::<u32>()
                    .ok()
                    .and_then(|id| registry.resolve(StrategyId(id)));
                if resolved.is_none() {
                    tracing::warn!(id = raw, "Invalid strategy {raw}. Ignoring.");
                    skipped.push(raw.to_string());
                }
                resolved
            })
            .collect()
    };
    wanted.sort();
    wanted.dedup();

    let selected = wanted
        .into_iter()
        .filter_map(|id| registry.get(id))
        .filter(|s| filter.is_none_or(|re| re.is_match(s.name())))
        .collect();

    (selected, skipped)
}

/// Build execution plan from the registry and selection options
pub fn build_plan<'r, S: AsRef<str>>(
    registry: &'r StrategyRegistry,
    ids: &[S],
    filter: Option<&Regex>,
    sizes: Vec<usize>,
) -> ExecutionPlan<'r> {
    let (strategies, skipped) = select_strategies(registry, ids, filter);
    ExecutionPlan {
        strategies,
        sizes,
        skipped,
    }
}

//! Dispatch Strategies
//!
//! A [`DispatchStrategy`] routes one [`Workload`] into a [`Device`] under a
//! particular data-movement or concurrency policy. The harness only ever sees
//! `&dyn DispatchStrategy`, so new policies plug in through the
//! [`StrategyRegistry`] without touching the measurement code.
//!
//! Built-in strategies register themselves with `inventory::submit!` and are
//! collected by [`StrategyRegistry::builtin`].

use crate::device::{Device, DeviceError};
use crate::workload::Workload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Stable numeric identifier of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(pub u32);

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure while dispatching a workload
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Failed(String),
}

/// A policy for routing work into the measured execution context.
///
/// `dispatch` must not return until everything it started has finished,
/// including any asynchronous portion, so callers always observe completion
/// latency rather than submission latency.
pub trait DispatchStrategy: Send + Sync {
    /// Stable identifier
    fn id(&self) -> StrategyId;

    /// Short name used in tables and file names
    fn name(&self) -> &str;

    /// One-line description of the policy
    fn description(&self) -> &str {
        ""
    }

    /// Additional ids that select this strategy.
    ///
    /// Kept for the OpenMP method numbering, where several map clauses
    /// (`map(to: a[0:N])`, `map(tofrom: a[0:N])`) got ids of their own.
    fn aliases(&self) -> &[u32] {
        &[]
    }

    /// Run `workload` against `host` through `device` and wait for it
    fn dispatch(
        &self,
        device: &Device,
        host: &mut [f64],
        workload: Workload,
    ) -> Result<(), DispatchError>;
}

/// Registry entry for a strategy that lives in a `static`
struct Static(&'static dyn DispatchStrategy);

impl DispatchStrategy for Static {
    fn id(&self) -> StrategyId {
        self.0.id()
    }

    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn aliases(&self) -> &[u32] {
        self.0.aliases()
    }

    fn dispatch(
        &self,
        device: &Device,
        host: &mut [f64],
        workload: Workload,
    ) -> Result<(), DispatchError> {
        self.0.dispatch(device, host, workload)
    }
}

/// Static registration record for a built-in strategy
pub struct StrategyDef {
    /// The strategy instance
    pub strategy: &'static dyn DispatchStrategy,
}

inventory::collect!(StrategyDef);

/// Mapping from strategy id to implementation
#[derive(Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<StrategyId, Box<dyn DispatchStrategy>>,
    aliases: BTreeMap<StrategyId, StrategyId>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every strategy submitted through `inventory`
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in inventory::iter::<StrategyDef> {
            if let Some(previous) = registry.register_static(def.strategy) {
                tracing::warn!(
                    id = %previous.id(),
                    name = previous.name(),
                    "duplicate strategy registration replaced"
                );
            }
        }
        registry
    }

    /// Add a strategy, returning the one it replaced, if any
    pub fn register(
        &mut self,
        strategy: impl DispatchStrategy + 'static,
    ) -> Option<Box<dyn DispatchStrategy>> {
        self.insert(Box::new(strategy))
    }

    /// Add a strategy that lives in a `static`
    pub fn register_static(
        &mut self,
        strategy: &'static dyn DispatchStrategy,
    ) -> Option<Box<dyn DispatchStrategy>> {
        self.insert(Box::new(Static(strategy)))
    }

    fn insert(&mut self, strategy: Box<dyn DispatchStrategy>) -> Option<Box<dyn DispatchStrategy>> {
        let id = strategy.id();
        self.aliases.remove(&id);
        for &alias in strategy.aliases() {
            let alias = StrategyId(alias);
            if alias == id || self.entries.contains_key(&alias) {
                tracing::warn!(%alias, name = strategy.name(), "alias shadows a strategy id; ignored");
                continue;
            }
            self.aliases.insert(alias, id);
        }
        self.entries.insert(id, strategy)
    }

    /// Look up a strategy by id
    pub fn get(&self, id: StrategyId) -> Option<&dyn DispatchStrategy> {
        self.entries.get(&id).map(|s| s.as_ref())
    }

    /// Map a requested id, or one of the aliases, to a registered id
    pub fn resolve(&self, id: StrategyId) -> Option<StrategyId> {
        if self.entries.contains_key(&id) {
            return Some(id);
        }
        self.aliases.get(&id).copied()
    }

    /// Aliases that resolve to `id`, ascending
    pub fn aliases_of(&self, id: StrategyId) -> Vec<StrategyId> {
        self.aliases
            .iter()
            .filter(|&(_, target)| *target == id)
            .map(|(alias, _)| *alias)
            .collect()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: StrategyId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<StrategyId> {
        self.entries.keys().copied().collect()
    }

    /// Strategies in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &dyn DispatchStrategy> {
        self.entries.values().map(|s| s.as_ref())
    }

    /// Number of registered strategies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, s)| (id, s.name())))
            .finish()
    }
}

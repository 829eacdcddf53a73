//! Built-in Dispatch Strategies
//!
//! | id | name               | policy                                               |
//! |----|--------------------|------------------------------------------------------|
//! | 1  | `roundtrip`        | copy in, run, copy out                               |
//! | 2  | `copy-in`          | copy in, run                                         |
//! | 3  | `copy-out`         | allocate, run, copy out                              |
//! | 4  | `alloc`            | allocate, run, free                                  |
//! | 5  | `direct`           | run on the device-resident buffer                    |
//! | 6  | `teams`            | round-trip, 8 team replicas                          |
//! | 7  | `teams-parallel`   | round-trip, 8 teams x 32 members                     |
//! | 8  | `teams-distribute` | round-trip, 64 loop iterations spread over the pool  |
//! | 9  | `async`            | round-trip launched without waiting, then waited on  |
//! | 12 | `teams-wide`       | round-trip, one replica per pool thread              |
//!
//! Ids 10 and 11 are aliases of `copy-in` and `roundtrip`: they name the
//! same transfer with an explicit `a[0:N]` array section in OpenMP terms.
//!
//! Grouped strategies apply the workload once to the mapped buffer on the
//! launching device thread; every other replica works on a private scratch
//! buffer of the same size so replicas never alias. The launching thread
//! counts towards the width: a width-`w` launch runs `w - 1` replicas.

use crate::device::{Completion, Device, DeviceContext, DeviceError};
use crate::strategy::{DispatchError, DispatchStrategy, StrategyDef, StrategyId};
use crate::workload::Workload;
use rayon::prelude::*;

/// Data movement between host and device around a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// Copy in before, copy out after
    ToFrom,
    /// Copy in only
    To,
    /// Fresh allocation, copy out after
    From,
    /// Fresh allocation, no transfer
    Alloc,
    /// Device-resident buffer, no transfer
    Resident,
}

impl Mapping {
    fn copies_in(self) -> bool {
        matches!(self, Mapping::ToFrom | Mapping::To)
    }

    fn copies_out(self) -> bool {
        matches!(self, Mapping::ToFrom | Mapping::From)
    }
}

/// Launch `body` on the device with `host` mapped according to `mapping`.
///
/// The completion yields the device buffer when the mapping copies out.
fn launch_mapped<F>(
    device: &Device,
    host: &[f64],
    mapping: Mapping,
    body: F,
) -> Result<Completion<Option<Vec<f64>>>, DeviceError>
where
    F: FnOnce(&rayon::ThreadPool, &mut [f64]) + Send + 'static,
{
    let len = host.len();
    let staged = mapping.copies_in().then(|| host.to_vec());

    device.launch(move |ctx: &mut DeviceContext| {
        if mapping == Mapping::Resident {
            let (buffer, pool) = ctx.resident_with_pool(len);
            body(pool, buffer);
            return None;
        }
        let mut buffer = staged.unwrap_or_else(|| ctx.allocate(len));
        body(ctx.pool(), &mut buffer);
        mapping.copies_out().then_some(buffer)
    })
}

fn copy_back(host: &mut [f64], output: Option<Vec<f64>>) {
    if let Some(buffer) = output {
        host.copy_from_slice(&buffer);
    }
}

fn replica(workload: Workload, len: usize) {
    let mut scratch = vec![0.0; len.max(1)];
    workload.apply(&mut scratch);
    std::hint::black_box(&scratch);
}

/// Single launch with a data-mapping policy
#[derive(Debug)]
pub struct MappedDispatch {
    id: StrategyId,
    name: &'static str,
    description: &'static str,
    mapping: Mapping,
    aliases: &'static [u32],
}

impl MappedDispatch {
    /// Create a mapped strategy
    pub const fn new(
        id: u32,
        name: &'static str,
        description: &'static str,
        mapping: Mapping,
    ) -> Self {
        Self {
            id: StrategyId(id),
            name,
            description,
            mapping,
            aliases: &[],
        }
    }

    /// Additional ids selecting this strategy
    pub const fn with_aliases(mut self, aliases: &'static [u32]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Mapping policy
    pub fn mapping(&self) -> Mapping {
        self.mapping
    }
}

impl DispatchStrategy for MappedDispatch {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn aliases(&self) -> &[u32] {
        self.aliases
    }

    fn dispatch(
        &self,
        device: &Device,
        host: &mut [f64],
        workload: Workload,
    ) -> Result<(), DispatchError> {
        let output = launch_mapped(device, host, self.mapping, move |_, buffer| {
            workload.apply(buffer);
        })?
        .wait()?;
        copy_back(host, output);
        Ok(())
    }
}

/// Shape of a grouped launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamShape {
    /// `teams` replicas
    Teams { teams: usize },
    /// `teams` replicas, each forking `threads` members
    TeamsParallel { teams: usize, threads: usize },
    /// `iterations` loop iterations distributed over the pool
    Distribute { iterations: usize },
    /// One replica per pool thread
    PoolWide,
}

impl TeamShape {
    /// Declared parallel width, or `None` when it follows the pool
    pub fn width(self) -> Option<usize> {
        match self {
            TeamShape::Teams { teams } => Some(teams),
            TeamShape::TeamsParallel { teams, threads } => Some(teams * threads),
            TeamShape::Distribute { iterations } => Some(iterations),
            TeamShape::PoolWide => None,
        }
    }

    /// Width on a pool of `pool_threads` threads
    pub fn width_on(self, pool_threads: usize) -> usize {
        self.width().unwrap_or(pool_threads.max(1))
    }

    fn run(self, pool: &rayon::ThreadPool, buffer: &mut [f64], workload: Workload) {
        self.run_with(pool, buffer, workload, replica);
    }

    fn run_with<R>(self, pool: &rayon::ThreadPool, buffer: &mut [f64], workload: Workload, replica: R)
    where
        R: Fn(Workload, usize) + Copy + Send + Sync,
    {
        let len = buffer.len();
        match self {
            TeamShape::Teams { teams } => pool.in_place_scope(|s| {
                for _ in 1..teams {
                    s.spawn(move |_| replica(workload, len));
                }
                workload.apply(buffer);
            }),
            TeamShape::TeamsParallel { teams, threads } => pool.in_place_scope(|s| {
                for team in 0..teams {
                    s.spawn(move |_| {
                        (0..threads)
                            .into_par_iter()
                            .filter(|&member| team != 0 || member != 0)
                            .for_each(|_| replica(workload, len));
                    });
                }
                workload.apply(buffer);
            }),
            TeamShape::Distribute { iterations } => pool.in_place_scope(|s| {
                s.spawn(move |_| {
                    (1..iterations)
                        .into_par_iter()
                        .for_each(|_| replica(workload, len));
                });
                workload.apply(buffer);
            }),
            // Broadcast slot 0 is covered by the launching thread
            TeamShape::PoolWide => pool.in_place_scope(|s| {
                s.spawn_broadcast(move |_, ctx| {
                    if ctx.index() != 0 {
                        replica(workload, len);
                    }
                });
                workload.apply(buffer);
            }),
        }
    }
}

/// Round-trip launch executed by a group of replicas
#[derive(Debug)]
pub struct GroupedDispatch {
    id: StrategyId,
    name: &'static str,
    description: &'static str,
    shape: TeamShape,
}

impl GroupedDispatch {
    /// Create a grouped strategy
    pub const fn new(
        id: u32,
        name: &'static str,
        description: &'static str,
        shape: TeamShape,
    ) -> Self {
        Self {
            id: StrategyId(id),
            name,
            description,
            shape,
        }
    }

    /// Launch shape
    pub fn shape(&self) -> TeamShape {
        self.shape
    }
}

impl DispatchStrategy for GroupedDispatch {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn dispatch(
        &self,
        device: &Device,
        host: &mut [f64],
        workload: Workload,
    ) -> Result<(), DispatchError> {
        let shape = self.shape;
        let output = launch_mapped(device, host, Mapping::ToFrom, move |pool, buffer| {
            shape.run(pool, buffer, workload);
        })?
        .wait()?;
        copy_back(host, output);
        Ok(())
    }
}

/// Round-trip launch that returns immediately, paired with an explicit wait
#[derive(Debug)]
pub struct AsyncDispatch {
    id: StrategyId,
    name: &'static str,
    description: &'static str,
}

impl AsyncDispatch {
    /// Create an asynchronous strategy
    pub const fn new(id: u32, name: &'static str, description: &'static str) -> Self {
        Self {
            id: StrategyId(id),
            name,
            description,
        }
    }
}

impl DispatchStrategy for AsyncDispatch {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn dispatch(
        &self,
        device: &Device,
        host: &mut [f64],
        workload: Workload,
    ) -> Result<(), DispatchError> {
        let pending = launch_mapped(device, host, Mapping::ToFrom, move |_, buffer| {
            workload.apply(buffer);
        })?;
        // The launch is in flight; completion is only observed here.
        let output = pending.wait()?;
        copy_back(host, output);
        Ok(())
    }
}

/// Copy in, run, copy out
pub static ROUNDTRIP: MappedDispatch = MappedDispatch::new(
    1,
    "roundtrip",
    "copy host buffer in, run, copy it back out",
    Mapping::ToFrom,
)
.with_aliases(&[11]);

/// Copy in only
pub static COPY_IN: MappedDispatch = MappedDispatch::new(
    2,
    "copy-in",
    "copy host buffer in, run, discard device copy",
    Mapping::To,
)
.with_aliases(&[10]);

/// Copy out only
pub static COPY_OUT: MappedDispatch = MappedDispatch::new(
    3,
    "copy-out",
    "allocate on device, run, copy result out",
    Mapping::From,
);

/// Allocation without transfer
pub static ALLOC: MappedDispatch = MappedDispatch::new(
    4,
    "alloc",
    "allocate on device, run, free; no transfer",
    Mapping::Alloc,
);

/// No mapping at all
pub static DIRECT: MappedDispatch = MappedDispatch::new(
    5,
    "direct",
    "run on the device-resident buffer; no mapping",
    Mapping::Resident,
);

/// Team replicas
pub static TEAMS: GroupedDispatch = GroupedDispatch::new(
    6,
    "teams",
    "round-trip executed by 8 team replicas",
    TeamShape::Teams { teams: 8 },
);

/// Nested team parallelism
pub static TEAMS_PARALLEL: GroupedDispatch = GroupedDispatch::new(
    7,
    "teams-parallel",
    "round-trip executed by 8 teams of 32 members",
    TeamShape::TeamsParallel {
        teams: 8,
        threads: 32,
    },
);

/// Distributed loop
pub static TEAMS_DISTRIBUTE: GroupedDispatch = GroupedDispatch::new(
    8,
    "teams-distribute",
    "round-trip with 64 loop iterations distributed over the pool",
    TeamShape::Distribute { iterations: 64 },
);

/// Launch without waiting, then wait
pub static ASYNC: AsyncDispatch = AsyncDispatch::new(
    9,
    "async",
    "round-trip launched without waiting, then explicitly waited on",
);

/// One replica per pool thread
pub static TEAMS_WIDE: GroupedDispatch = GroupedDispatch::new(
    12,
    "teams-wide",
    "round-trip executed by one replica per device pool thread",
    TeamShape::PoolWide,
);

inventory::submit! { StrategyDef { strategy: &ROUNDTRIP } }
inventory::submit! { StrategyDef { strategy: &COPY_IN } }
inventory::submit! { StrategyDef { strategy: &COPY_OUT } }
inventory::submit! { StrategyDef { strategy: &ALLOC } }
inventory::submit! { StrategyDef { strategy: &DIRECT } }
inventory::submit! { StrategyDef { strategy: &TEAMS } }
inventory::submit! { StrategyDef { strategy: &TEAMS_PARALLEL } }
inventory::submit! { StrategyDef { strategy: &TEAMS_DISTRIBUTE } }
inventory::submit! { StrategyDef { strategy: &ASYNC } }
inventory::submit! { StrategyDef { strategy: &TEAMS_WIDE } }

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-host scheduling record
///
/// Created lazily the first time a task is admitted for a host.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Instant at or after which the most recently admitted task may run
    pub last_scheduled: Option<Instant>,

    /// Number of tasks admitted for this host
    pub admitted: u64,
}

impl HostState {
    /// Creates a HostState with no admission history
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the earliest instant the next task for this host may run
    ///
    /// The first task runs immediately. Later tasks run `interval` after the
    /// previous slot, but never earlier than `now`.
    pub fn next_slot(&self, interval: Duration, now: Instant) -> Instant {
        match self.last_scheduled {
            None => now,
            Some(last) => std::cmp::max(last + interval, now),
        }
    }

    /// Records an admitted task's slot
    pub fn record(&mut self, slot: Instant) {
        self.last_scheduled = Some(slot);
        self.admitted += 1;
    }
}

/// Host Schedule Table: host -> last scheduled slot
///
/// The table belongs to one scheduler instance. Each host's record is guarded by
/// the map's entry lock, so concurrent admissions for the same host serialize
/// while different hosts proceed without contending on a shared lock.
#[derive(Debug, Default)]
pub struct HostTable {
    hosts: DashMap<String, HostState>,
}

impl HostTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a task for `host` under that host's lock
    ///
    /// Computes the next slot, hands it to `insert`, and records the slot only
    /// if `insert` succeeds. A rejected insert leaves the host's history as it was.
    ///
    /// # Arguments
    ///
    /// * `host` - The rate-limiting key
    /// * `interval` - The effective spacing for this host
    /// * `now` - The admission instant
    /// * `insert` - Places the task; receives the computed slot
    ///
    /// # Returns
    ///
    /// * `Ok(Instant)` - The slot assigned to the admitted task
    /// * `Err(E)` - Whatever `insert` returned on rejection
    pub fn admit<E>(
        &self,
        host: &str,
        interval: Duration,
        now: Instant,
        insert: impl FnOnce(Instant) -> Result<(), E>,
    ) -> Result<Instant, E> {
        let mut state = self.hosts.entry(host.to_string()).or_default();
        let slot = state.next_slot(interval, now);

        insert(slot)?;

        state.record(slot);
        Ok(slot)
    }

    /// Returns the last scheduled slot for a host, if any
    pub fn last_scheduled(&self, host: &str) -> Option<Instant> {
        self.hosts.get(host).and_then(|state| state.last_scheduled)
    }

    /// Returns a snapshot of a host's record
    pub fn get(&self, host: &str) -> Option<HostState> {
        self.hosts.get(host).map(|state| state.clone())
    }

    /// Returns the number of hosts with a record
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Forgets every host
    pub fn clear(&self) {
        self.hosts.clear();
    }
}

//! Cache-aside code validation.

use crate::table::{CodeSystemEntry, CodeSystemTable};
use crate::{TerminologyError, TerminologyResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Default bound on a single backend lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on backend lookups running at once. Further misses are answered permissively
/// without reaching the backend until a slot frees up.
pub const MAX_IN_FLIGHT_LOOKUPS: usize = 16;

/// A source of truth for code validity (a terminology server, an offline snapshot, ...).
///
/// Implementations may block; the resolver bounds every call with its timeout.
pub trait TerminologyBackend: Send + Sync {
    /// Whether `code` is defined in `system`.
    ///
    /// Return an error when the answer is unknown (unreachable server, system not loaded);
    /// the resolver then treats the code as valid.
    fn validate_code(&self, system: &str, code: &str) -> TerminologyResult<bool>;
}

type LookupKey = (String, String);

#[derive(Clone, Debug)]
enum Outcome {
    Answer(bool),
    Failed(String),
}

/// A backend call running on a helper thread. Every caller asking for the same key while it
/// runs waits on this instead of starting another call.
#[derive(Default)]
struct PendingLookup {
    outcome: Mutex<Option<Outcome>>,
    done: Condvar,
}

impl PendingLookup {
    fn complete(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<Outcome> {
        let slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let (slot, _) = self
            .done
            .wait_timeout_while(slot, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }
}

/// Resolves code systems and validates codes.
///
/// Safe to share across threads. The validity cache is filled on first lookup of each
/// `(system, code)` pair and never expires; failed lookups are not cached. A lookup that
/// outlives its caller's timeout keeps its slot until the backend answers, and its answer is
/// still cached.
pub struct TerminologyResolver {
    table: Arc<CodeSystemTable>,
    backend: Option<Arc<dyn TerminologyBackend>>,
    cache: Arc<DashMap<LookupKey, bool>>,
    in_flight: Arc<DashMap<LookupKey, Arc<PendingLookup>>>,
    timeout: Duration,
}

impl fmt::Debug for TerminologyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminologyResolver")
            .field("systems", &self.table.len())
            .field("backend", &self.backend.is_some())
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for TerminologyResolver {
    fn default() -> Self {
        Self::new(CodeSystemTable::builtin())
    }
}

impl TerminologyResolver {
    /// A resolver over `table` with no backend: every code is valid.
    pub fn new(table: Arc<CodeSystemTable>) -> Self {
        Self {
            table,
            backend: None,
            cache: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Adds a backend whose lookups are bounded by `timeout`.
    pub fn with_backend(mut self, backend: Arc<dyn TerminologyBackend>, timeout: Duration) -> Self {
        self.backend = Some(backend);
        self.timeout = timeout;
        self
    }

    pub fn table(&self) -> &CodeSystemTable {
        &self.table
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// See [`CodeSystemTable::resolve_code_system`].
    pub fn resolve_code_system(&self, local_key: &str) -> TerminologyResult<&CodeSystemEntry> {
        self.table.resolve_code_system(local_key)
    }

    /// Best-effort validity check.
    ///
    /// `true` without a backend, and `true` when the backend errors, exceeds the timeout, or
    /// already has [`MAX_IN_FLIGHT_LOOKUPS`] lookups outstanding.
    pub fn is_valid_code(&self, system: &str, code: &str) -> bool {
        let Some(backend) = &self.backend else {
            return true;
        };

        let key = (system.to_string(), code.to_string());
        if let Some(valid) = self.cache.get(&key) {
            return *valid;
        }

        match self.lookup(backend, key) {
            Ok(valid) => {
                tracing::debug!(system, code, valid, "terminology lookup");
                valid
            }
            Err(err) => {
                tracing::warn!(system, code, error = %err, "terminology lookup failed; treating code as valid");
                true
            }
        }
    }

    /// Number of cached lookup results.
    pub fn cached_lookups(&self) -> usize {
        self.cache.len()
    }

    /// Number of backend lookups still running.
    pub fn in_flight_lookups(&self) -> usize {
        self.in_flight.len()
    }

    fn lookup(
        &self,
        backend: &Arc<dyn TerminologyBackend>,
        key: LookupKey,
    ) -> TerminologyResult<bool> {
        // Checked before taking the entry: `len` locks every shard.
        if !self.in_flight.contains_key(&key) && self.in_flight.len() >= MAX_IN_FLIGHT_LOOKUPS {
            return Err(TerminologyError::Saturated(MAX_IN_FLIGHT_LOOKUPS));
        }

        let pending = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                // A lookup may have finished between the caller's cache check and now.
                if let Some(valid) = self.cache.get(&key) {
                    return Ok(*valid);
                }
                let pending = Arc::new(PendingLookup::default());
                entry.insert(Arc::clone(&pending));
                self.spawn_lookup(backend, key, Arc::clone(&pending));
                pending
            }
        };

        match pending.wait(self.timeout) {
            Some(Outcome::Answer(valid)) => Ok(valid),
            Some(Outcome::Failed(reason)) => Err(TerminologyError::Backend(reason)),
            None => Err(TerminologyError::Timeout(self.timeout)),
        }
    }

    fn spawn_lookup(
        &self,
        backend: &Arc<dyn TerminologyBackend>,
        key: LookupKey,
        pending: Arc<PendingLookup>,
    ) {
        let backend = Arc::clone(backend);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let thread_key = key.clone();
        let thread_pending = Arc::clone(&pending);

        let spawned = std::thread::Builder::new()
            .name("terminology-lookup".into())
            .spawn(move || {
                let (system, code) = &thread_key;
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
                    backend.validate_code(system, code)
                })) {
                    Ok(Ok(valid)) => {
                        cache.insert(thread_key.clone(), valid);
                        Outcome::Answer(valid)
                    }
                    Ok(Err(err)) => Outcome::Failed(err.to_string()),
                    Err(_) => Outcome::Failed("backend panicked".into()),
                };
                in_flight.remove(&thread_key);
                thread_pending.complete(outcome);
            });

        if let Err(err) = spawned {
            self.in_flight.remove(&key);
            pending.complete(Outcome::Failed(err.to_string()));
        }
    }
}

use std::collections::HashMap;

use super::call::{Call, CallState};
use crate::CorrelationId;

/// Index of live outbound calls, keyed by correlation id.
///
/// Owned by the broker and only touched under its lock. Removal is the
/// resolution claim: whoever takes a call out of the table resolves it, and
/// taking an id that is already gone is a no-op returning `None`.
pub(crate) struct CallTable {
    // ---
    calls: HashMap<CorrelationId, Call>,
    next_serial: u64,
}

impl CallTable {
    // ---

    pub fn new() -> Self {
        Self {
            calls: HashMap::new(),
            next_serial: 1,
        }
    }

    /// Hand out the serial for the next call.
    pub fn next_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    /// Whether `correlation_id` belongs to a live call.
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.calls.contains_key(correlation_id)
    }

    /// Index a new call. The caller has already checked the id is free.
    pub fn insert(&mut self, correlation_id: CorrelationId, call: Call) {
        // ---
        let previous = self.calls.insert(correlation_id, call);
        debug_assert!(previous.is_none(), "correlation id reused while live");
    }

    pub fn get_mut(&mut self, correlation_id: &CorrelationId) -> Option<&mut Call> {
        self.calls.get_mut(correlation_id)
    }

    pub fn state(&self, correlation_id: &CorrelationId) -> Option<CallState> {
        self.calls.get(correlation_id).map(Call::state)
    }

    /// Claim a call for resolution.
    pub fn take(&mut self, correlation_id: &CorrelationId) -> Option<Call> {
        self.calls.remove(correlation_id)
    }

    /// Claim a call only if it is still the one with `serial` and `accept`
    /// agrees.
    pub fn take_if(
        &mut self,
        correlation_id: &CorrelationId,
        serial: u64,
        accept: impl FnOnce(&Call) -> bool,
    ) -> Option<Call> {
        // ---
        match self.calls.get(correlation_id) {
            Some(call) if call.serial() == serial && accept(call) => {
                self.calls.remove(correlation_id)
            }
            _ => None,
        }
    }

    /// Number of live calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }
}

/// Statistics tracking for the event system

/// Counters kept by the event system for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSystemStats {
    /// Handlers currently registered
    pub total_handlers: usize,
    /// Calls to `emit`
    pub events_emitted: u64,
    /// Handler tasks started
    pub handlers_started: u64,
    /// Handler tasks that returned an error or panicked
    pub handler_failures: u64,
}

//! Ordering gate for asynchronous fetch results.
//!
//! Every request gets a ticket from a monotonically increasing counter.
//! Fetches run concurrently and may complete in any order; the gate lets a
//! result through only if nothing newer has already been applied and it
//! belongs to the current session.

/// Sequence number of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    next: u64,
    /// First ticket of the current session
    session_start: u64,
    last_applied: Option<u64>,
    /// Tickets issued and not yet resolved
    in_flight: usize,
    closed: bool,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket that starts a new session. Every earlier ticket
    /// becomes stale.
    pub fn begin_session(&mut self) -> Ticket {
        self.session_start = self.next;
        self.last_applied = None;
        self.closed = false;
        self.issue()
    }

    /// Issue a ticket within the current session.
    pub fn issue(&mut self) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        self.in_flight += 1;
        ticket
    }

    /// Decide whether a completed request may be applied. Accepting a
    /// ticket makes every older ticket stale.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.closed || ticket.0 < self.session_start {
            return false;
        }
        if self.last_applied.is_some_and(|applied| ticket.0 <= applied) {
            return false;
        }
        self.last_applied = Some(ticket.0);
        true
    }

    /// Any request of the current session still outstanding.
    pub fn is_pending(&self) -> bool {
        self.in_flight > 0 && !self.closed
    }

    /// Reject everything from now on until the next session starts.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_results_are_applied() {
        let mut gate = RequestGate::new();
        let a = gate.begin_session();
        assert!(gate.accept(a));
        let b = gate.issue();
        assert!(gate.accept(b));
    }

    #[test]
    fn late_older_result_does_not_overwrite_newer() {
        let mut gate = RequestGate::new();
        let a = gate.begin_session();
        let b = gate.issue();
        // B resolves first, then A arrives late
        assert!(gate.accept(b));
        assert!(!gate.accept(a));
    }

    #[test]
    fn new_session_invalidates_previous_tickets() {
        let mut gate = RequestGate::new();
        let old = gate.begin_session();
        let new = gate.begin_session();
        assert!(!gate.accept(old));
        assert!(gate.accept(new));
    }

    #[test]
    fn old_session_result_rejected_even_before_new_one_lands() {
        let mut gate = RequestGate::new();
        let old = gate.begin_session();
        let _new = gate.begin_session();
        assert!(!gate.accept(old));
        assert!(gate.is_pending());
    }

    #[test]
    fn duplicate_delivery_is_rejected() {
        let mut gate = RequestGate::new();
        let a = gate.begin_session();
        assert!(gate.accept(a));
        assert!(!gate.accept(a));
    }

    #[test]
    fn closed_gate_rejects_everything() {
        let mut gate = RequestGate::new();
        let a = gate.begin_session();
        gate.close();
        assert!(!gate.is_pending());
        assert!(!gate.accept(a));
    }

    #[test]
    fn pending_tracks_outstanding_requests() {
        let mut gate = RequestGate::new();
        assert!(!gate.is_pending());
        let a = gate.begin_session();
        assert!(gate.is_pending());
        gate.accept(a);
        assert!(!gate.is_pending());
    }
}

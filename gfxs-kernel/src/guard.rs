//! Single-flight guard for render requests.
//!
//! At most one render is on the wire. A forced render that arrives while one
//! is in flight is remembered and handed back by [`SingleFlight::exit`], so
//! it runs right after the current request instead of overlapping it. The two
//! displayed images therefore always come from the same response.

/// Result of asking the guard for permission to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller owns the flight and must call `exit` exactly once.
    Entered,
    /// Another render is in flight; this non-forced trigger is abandoned.
    Denied,
    /// Another render is in flight; this forced trigger runs after it exits.
    Deferred,
}

#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: bool,
    deferred_force: bool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&mut self, force: bool) -> Admission {
        if !self.in_flight {
            self.in_flight = true;
            return Admission::Entered;
        }
        if force {
            self.deferred_force = true;
            Admission::Deferred
        } else {
            Admission::Denied
        }
    }

    /// Release the flight. Returns true if a deferred forced render is due.
    pub fn exit(&mut self) -> bool {
        if !self.in_flight {
            tracing::warn!("single-flight exit without a matching enter");
        }
        self.in_flight = false;
        std::mem::take(&mut self.deferred_force)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred_force
    }
}

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{ErrorBuilder, MemoryError};

/// Per: circuit breakers protect each external provider. States
/// are `closed`, `open`, `half-open`; trip after `failure_threshold`
/// consecutive failures inside `window`; `half-open` admits exactly one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_probe_in_flight: bool,
}

/// A named circuit breaker guarding one external provider (embedding,
/// generation, sync adapter, ...).
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_after: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_after,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.refresh();
        self.inner.lock().unwrap().state
    }

    /// Transition `Open` → `HalfOpen` once `reset_after` has elapsed.
    fn refresh(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.reset_after {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_probe_in_flight = false;
                }
            }
        }
    }

    /// Call before making the guarded request. Returns `CIRCUIT_BREAKER_OPEN`
    /// when the breaker is open, or when half-open and a probe is already in
    /// flight.
    pub fn guard(&self) -> Result<(), MemoryError> {
        self.refresh();
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => Err(self.open_error(inner.opened_at)),
            BreakerState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Err(self.open_error(inner.opened_at))
                } else {
                    inner.half_open_probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn open_error(&self, opened_at: Option<Instant>) -> MemoryError {
        let reset_in = opened_at
            .map(|t| self.reset_after.saturating_sub(t.elapsed()))
            .unwrap_or(self.reset_after);
        ErrorBuilder::new(format!("circuit breaker '{}' is open", self.name))
            .extra("service", self.name.clone())
            .extra("reset_in_ms", reset_in.as_millis().to_string())
            .build(MemoryError::CircuitBreakerOpen)
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
        inner.half_open_probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_probe_in_flight = false;
            }
            _ => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("embed", 3, Duration::from_millis(50));
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.guard().is_err());
    }

    #[test]
    fn half_open_admits_one_probe() {
        let breaker = CircuitBreaker::new("embed", 1, Duration::from_millis(1));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.guard().is_ok());
        assert!(breaker.guard().is_err());
    }

    #[test]
    fn success_resets_to_closed() {
        let breaker = CircuitBreaker::new("embed", 2, Duration::from_millis(1));
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}

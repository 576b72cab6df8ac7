use std::time::Duration;

/// Exponential backoff with full jitter
///
/// `attempt` is 0-based. `base` is the first delay before jitter; `cap`
/// bounds the maximum delay. `rand_unit` must be a caller-supplied value in
/// `[0, 1)` — the core never calls `rand`/`Math.random()`-equivalents itself
/// so callers can keep retry timing deterministic in tests.
pub fn backoff_with_full_jitter(attempt: u32, base: Duration, cap: Duration, rand_unit: f64) -> Duration {
    let exp = base.as_millis().saturating_mul(1u128 << attempt.min(20));
    let capped = exp.min(cap.as_millis());
    let jittered = (capped as f64 * rand_unit.clamp(0.0, 1.0)).round() as u64;
    Duration::from_millis(jittered)
}

/// Retries `op` up to `max_attempts` times (including the first try),
/// backing off between attempts. Returns the last error if all attempts are
/// exhausted. `rand_unit` supplies the jitter factor per attempt.
pub fn retry_with_backoff<T, E>(
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    mut rand_unit: impl FnMut() -> f64,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = backoff_with_full_jitter(attempt - 1, base, cap, rand_unit());
                std::thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_millis(10);
        let cap = Duration::from_millis(100);
        let d0 = backoff_with_full_jitter(0, base, cap, 1.0);
        let d3 = backoff_with_full_jitter(3, base, cap, 1.0);
        assert_eq!(d0, Duration::from_millis(10));
        assert_eq!(d3, cap);
    }

    #[test]
    fn zero_jitter_yields_zero_delay() {
        let d = backoff_with_full_jitter(2, Duration::from_millis(10), Duration::from_secs(1), 0.0);
        assert_eq!(d, Duration::from_millis(0));
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result: Result<i32, &str> = retry_with_backoff(
            5,
            Duration::from_millis(0),
            Duration::from_millis(0),
            || 0.0,
            |attempt| {
                calls += 1;
                if attempt < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            },
        );
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_and_returns_last_error() {
        let result: Result<i32, &str> = retry_with_backoff(
            2,
            Duration::from_millis(0),
            Duration::from_millis(0),
            || 0.0,
            |_| Err("still failing"),
        );
        assert_eq!(result, Err("still failing"));
    }
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use meridian_core::{ErrorBuilder, MemoryError};

/// Wraps the `cron` crate's schedule parser, defaulting to
/// `0 5 * * *` (05:00 daily) when no override is configured.
pub struct MaintenanceSchedule {
    schedule: Schedule,
}

impl MaintenanceSchedule {
    pub fn parse(expression: &str) -> Result<Self, MemoryError> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| ErrorBuilder::new(format!("invalid cron expression: {e}")).field("cron").validation())?;
        Ok(Self { schedule })
    }

    pub fn default_daily() -> Self {
        Self::parse("0 0 5 * * *").expect("default cron expression is valid")
    }

    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_fires_daily_at_five() {
        let schedule = MaintenanceSchedule::default_daily();
        let now = Utc::now();
        let next = schedule.next_fire_after(now).unwrap();
        assert!(next > now);
        assert_eq!(next.format("%H:%M").to_string(), "05:00");
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(MaintenanceSchedule::parse("not a cron").is_err());
    }
}

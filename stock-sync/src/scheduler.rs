//! Cron-driven pass scheduling
//!
//! Passes never overlap: the next fire time is computed only after the
//! previous pass has finished, so a slow pass skips the triggers it missed.

use std::future::Future;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;

pub struct SyncScheduler {
    expression: String,
    schedule: Schedule,
}

impl SyncScheduler {
    /// Parse a cron expression (seconds field first, e.g. `0 */15 * * * *`)
    pub fn new(expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expression, e))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run `pass` on every trigger until `shutdown` resolves.
    ///
    /// A pass in progress when `shutdown` resolves is finished first.
    pub async fn run<F, Fut>(&self, mut pass: F, shutdown: impl Future<Output = ()>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let Some(next) = self.next_after(now) else {
                log::warn!("Schedule '{}' has no upcoming runs, stopping", self.expression);
                return;
            };
            log::info!("Next sync pass at {}", next);

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    log::info!("Scheduler stopped");
                    return;
                }
            }

            pass().await;
        }
    }
}

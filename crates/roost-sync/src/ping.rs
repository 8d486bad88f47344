//! Ping-triggered re-check state machine.
//!
//! An out-of-band ping claims "item X by author Y should now be visible".
//! Upstream replication lag means the timeline endpoint often does not
//! return such an item immediately, so each affected identity gets a
//! bounded, backing-off series of re-checks:
//!
//! ```text
//! Scheduled → Running → Satisfied          (item found)
//!                     → Rescheduled        (not yet; retry_count * delay)
//!                     → Exhausted          (retries spent; cron will catch it)
//! ```
//!
//! The machine here only decides outcomes; the delay is a scheduling
//! directive for the external orchestrator, which owns the timer and
//! re-enqueues [`PingOutcome::Rescheduled`] checks.

use crate::clock::Clock;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::Result;
use crate::source::UpstreamSource;
use crate::store::{LedgerStore, StatusStore};
use roost_core::Identity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for the re-check series.
#[derive(Debug, Clone)]
pub struct PingConfig {
    /// Re-checks after the first before giving up.
    pub max_retries: u32,
    /// The n-th retry is delayed by `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Inbound signal: this author just published this item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub author: Identity,
    pub item_id: String,
}

/// One scheduled re-check, carried in the orchestrator's task payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingCheck {
    /// The mirroring identity whose timeline should now contain the item.
    pub identity: Identity,
    /// The item id the ping promised.
    pub expected_item_id: String,
    /// How many re-checks have already run.
    pub retry_count: u32,
}

impl PingCheck {
    pub fn new(identity: Identity, expected_item_id: impl Into<String>) -> Self {
        Self {
            identity,
            expected_item_id: expected_item_id.into(),
            retry_count: 0,
        }
    }
}

/// Terminal or rescheduling decision after one re-check ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// The expected item arrived; no further action.
    Satisfied,
    /// Not yet; re-enqueue `check` after `delay`.
    Rescheduled { check: PingCheck, delay: Duration },
    /// Retries spent. The item will surface on the next cron sweep.
    Exhausted,
}

/// Expand a ping into one check per identity that follows the author.
///
/// Unknown authors fan out to nothing.
pub fn fan_out(ping: &Ping, followers: &[Identity]) -> Vec<PingCheck> {
    followers
        .iter()
        .map(|identity| PingCheck::new(identity.clone(), ping.item_id.clone()))
        .collect()
}

/// Decide what happens to a check given the sync it just triggered.
pub fn evaluate(check: &PingCheck, sync: &SyncOutcome, config: &PingConfig) -> PingOutcome {
    tracing::info!(
        identity = %check.identity,
        expected = %check.expected_item_id,
        retry = check.retry_count,
        "looking for expected item"
    );

    if sync.had_update && sync.known_item_ids.contains(&check.expected_item_id) {
        tracing::info!(expected = %check.expected_item_id, "expected item found");
        return PingOutcome::Satisfied;
    }

    if check.retry_count >= config.max_retries {
        tracing::info!(
            identity = %check.identity,
            expected = %check.expected_item_id,
            "expected item not found and no retries left"
        );
        return PingOutcome::Exhausted;
    }

    let next = PingCheck {
        retry_count: check.retry_count + 1,
        ..check.clone()
    };
    let delay = config.base_delay * next.retry_count;
    tracing::info!(
        identity = %next.identity,
        retry = next.retry_count,
        delay_secs = delay.as_secs(),
        "expected item not found, rescheduling"
    );
    PingOutcome::Rescheduled { check: next, delay }
}

/// Run one re-check: sync the identity, then evaluate.
pub async fn run_ping_check<S, P, L, C>(
    engine: &SyncEngine<S, P, L, C>,
    check: &PingCheck,
    config: &PingConfig,
) -> Result<PingOutcome>
where
    S: UpstreamSource,
    P: StatusStore,
    L: LedgerStore,
    C: Clock,
{
    let sync = engine.sync(&check.identity).await?;
    Ok(evaluate(check, &sync, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn outcome(had_update: bool, ids: &[&str]) -> SyncOutcome {
        SyncOutcome {
            had_update,
            known_item_ids: ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn satisfied_when_update_contains_expected_item() {
        let check = PingCheck::new(Identity::new("alice"), "42");
        let result = evaluate(&check, &outcome(true, &["41", "42"]), &PingConfig::default());
        assert_eq!(result, PingOutcome::Satisfied);
    }

    #[test]
    fn reschedules_with_linear_backoff() {
        let config = PingConfig::default();
        let check = PingCheck::new(Identity::new("alice"), "42");

        let PingOutcome::Rescheduled { check: next, delay } =
            evaluate(&check, &outcome(false, &["41"]), &config)
        else {
            panic!("expected reschedule");
        };
        assert_eq!(next.retry_count, 1);
        assert_eq!(delay, Duration::from_secs(2));

        let PingOutcome::Rescheduled { check: next, delay } =
            evaluate(&next, &outcome(false, &["41"]), &config)
        else {
            panic!("expected reschedule");
        };
        assert_eq!(next.retry_count, 2);
        assert_eq!(delay, Duration::from_secs(4));
    }

    #[test]
    fn exhausts_after_max_retries() {
        let config = PingConfig::default();
        let missing = outcome(false, &["41"]);
        let mut check = PingCheck::new(Identity::new("alice"), "42");

        let mut reschedules = 0;
        loop {
            match evaluate(&check, &missing, &config) {
                PingOutcome::Rescheduled { check: next, .. } => {
                    reschedules += 1;
                    check = next;
                }
                PingOutcome::Exhausted => break,
                PingOutcome::Satisfied => panic!("item never present"),
            }
        }

        // Five retries get scheduled; the sixth evaluation gives up.
        assert_eq!(reschedules, 5);
        assert_eq!(check.retry_count, 5);
    }

    #[test]
    fn update_without_expected_item_still_retries() {
        let check = PingCheck::new(Identity::new("alice"), "42");
        let result = evaluate(&check, &outcome(true, &["41"]), &PingConfig::default());
        assert!(matches!(result, PingOutcome::Rescheduled { .. }));
    }

    #[test]
    fn fan_out_expands_to_followers() {
        let ping = Ping {
            author: Identity::new("celebrity"),
            item_id: "42".to_string(),
        };
        let followers = vec![Identity::new("alice"), Identity::new("bob")];

        let checks = fan_out(&ping, &followers);
        assert_eq!(checks.len(), 2);
        assert!(checks
            .iter()
            .all(|c| c.expected_item_id == "42" && c.retry_count == 0));

        assert!(fan_out(&ping, &[]).is_empty());
    }
}

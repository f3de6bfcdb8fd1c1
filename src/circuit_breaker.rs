use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Consecutive outages before scoring calls stop reaching the model server.
pub const OUTAGE_THRESHOLD: u32 = 5;

/// Circuit breaker guarding calls to a remote model server.
pub type OracleCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Breaker for `RemoteOracle`.
///
/// After `OUTAGE_THRESHOLD` outages in a row, scoring requests fail with
/// `OracleUnavailable` without a network call. A trial request is let
/// through after 10s, doubling up to 60s while the server stays down.
///
/// Only outages should be reported as failures; a rejected batch means the
/// server is up.
pub fn create_oracle_circuit_breaker() -> OracleCircuitBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));
    let failure_policy = failure_policy::consecutive_failures(OUTAGE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

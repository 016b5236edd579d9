//! Inactivity monitor: a periodic ticker asking the state actor to sample
//! its monotonic last-activity timestamp. The decision lives in the actor;
//! this task only supplies the heartbeat, so there is no timer to cancel or
//! reschedule.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use crate::state::StateCommand;

pub async fn run_inactivity_monitor(
    poll_interval: Duration,
    state_tx: mpsc::Sender<StateCommand>,
) {
    let mut ticker = time::interval(poll_interval);
    ticker.tick().await; // the first tick completes immediately
    loop {
        ticker.tick().await;
        if state_tx.send(StateCommand::IdleTick).await.is_err() {
            // Actor gone: the server is shutting down.
            break;
        }
    }
}

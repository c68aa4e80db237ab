use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::shutdown::shutdown_channel;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::reminders;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let shutdown = shutdown_channel();

    let handle = tokio::spawn(reminder_loop(state, shutdown));
    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

async fn reminder_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let seconds = state.settings().workshops().reminder_sweep_interval_seconds.max(1);
    let mut tick = interval(Duration::from_secs(seconds));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_seconds = seconds, "Reminder sweep loop started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = reminders::run_sweep(&state, primitive_now_utc()).await {
                    tracing::error!(error = %err, "Workshop reminder sweep failed");
                }
            }
        }
    }

    tracing::info!("Reminder sweep loop stopped");
}

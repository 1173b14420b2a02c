//! Run control signal shared by the dispatcher and discovery

use tokio::sync::watch;

/// What the crawler asks in-progress work to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunSignal {
    #[default]
    Run,
    Pause,
    Stop,
}

/// Waits while paused
///
/// Returns `true` when work may continue and `false` once a stop was
/// requested.
pub async fn admit(signal: &mut watch::Receiver<RunSignal>) -> bool {
    match signal.wait_for(|s| *s != RunSignal::Pause).await {
        Ok(current) => *current == RunSignal::Run,
        Err(_) => false,
    }
}

/// Resolves once a stop was requested
pub async fn stopped(signal: &mut watch::Receiver<RunSignal>) {
    // A dropped sender means the crawler is gone, which also ends the run
    let _ = signal.wait_for(|s| *s == RunSignal::Stop).await;
}

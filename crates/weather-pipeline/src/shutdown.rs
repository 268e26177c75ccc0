//! Interrupt handling for the producer binary.

use tokio::sync::watch;

/// Install a Ctrl+C / SIGTERM handler that fires the returned channel.
///
/// Once it fires no further weather events are submitted; events already handed
/// to the broker are still flushed. Keep the sender alive while the receiver is
/// in use. Only one handler can be installed per process.
pub fn setup_shutdown() -> Result<(watch::Sender<()>, watch::Receiver<()>), ctrlc::Error> {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        if signal_tx.send(()).is_ok() {
            log::warn!("Interrupt received, no further weather events will be submitted");
        }
    })?;
    Ok((tx, rx))
}

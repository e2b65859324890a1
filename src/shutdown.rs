//! Termination signals mapped onto cancellation

use crate::cancel::CancelHandle;
use log::warn;
use std::io;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Cancel `handle` on the first SIGINT, SIGTERM or SIGHUP.
///
/// `on_signal` runs once, before cancellation is requested. Later signals are
/// ignored; the loop is already shutting down.
pub fn cancel_on_signals<F>(handle: CancelHandle, on_signal: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        let name = first_of(&mut interrupt, &mut terminate, &mut hangup).await;
        warn!("Received {}", name);
        on_signal();
        handle.cancel();
    });
    Ok(())
}

async fn first_of(interrupt: &mut Signal, terminate: &mut Signal, hangup: &mut Signal) -> &'static str {
    tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    }
}

//! Cooperative cancellation for polling loops.

use tokio::sync::watch;

/// Read side of a cancellation flag.
///
/// Wraps the `watch::Receiver<bool>` convention used by the FFmpeg runner.
/// A signal built with [`CancelSignal::never`] never fires.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// New flag and its signal. Send `true` to cancel.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancelled. Pending forever if the sender is gone first.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.rx.clone() else {
            return std::future::pending().await;
        };
        let sender_gone = rx.wait_for(|flag| *flag).await.is_err();
        if sender_gone {
            std::future::pending::<()>().await;
        }
    }

    pub fn receiver(&self) -> Option<watch::Receiver<bool>> {
        self.rx.clone()
    }
}

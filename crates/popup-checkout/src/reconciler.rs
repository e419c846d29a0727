//! Opener Reconciler
//!
//! The page that spawned the popup listens for its messages and
//! refreshes server-derived view state. The message is a hint to
//! refetch, never an authoritative update: a same-device popup could
//! in principle be spoofed or stale, so balance and unlock state are
//! re-queried from the server rather than patched locally.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::message::PaymentMessage;

/// View-state hook the reconciler drives
#[async_trait]
pub trait StorefrontView: Send + Sync {
    /// Re-fetch whatever local view state depends on the coin balance
    /// and purchase status
    async fn refresh(&self) -> Result<()>;
}

/// Listens on the opener side of the popup channel
pub struct OpenerReconciler {
    view: Arc<dyn StorefrontView>,
}

impl OpenerReconciler {
    pub fn new(view: Arc<dyn StorefrontView>) -> Self {
        Self { view }
    }

    /// Handle one raw `message` event payload.
    ///
    /// Returns whether the payload matched the contract. Unrecognized
    /// shapes are dropped without side effects, and a failed refresh
    /// is logged rather than propagated — the user can always refresh
    /// manually, which is also the fallback when the popup never
    /// reports at all.
    pub async fn on_message(&self, raw: &str) -> bool {
        let Some(message) = PaymentMessage::parse(raw) else {
            tracing::debug!("Ignoring unrecognized window message");
            return false;
        };

        match message {
            PaymentMessage::PaymentSuccess { order_no } => {
                tracing::info!(order_no = %order_no, "Popup reported payment; refreshing view");
                if let Err(err) = self.view.refresh().await {
                    tracing::warn!(error = %err, "View refresh failed");
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PopupError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingView {
        refreshes: AtomicUsize,
        fail: bool,
    }

    impl CountingView {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl StorefrontView for CountingView {
        async fn refresh(&self) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PopupError::StatusRequest("wallet fetch failed".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_message_triggers_one_refresh() {
        let view = CountingView::new(false);
        let reconciler = OpenerReconciler::new(view.clone());

        let raw = PaymentMessage::success("ORD123").to_json();
        assert!(reconciler.on_message(&raw).await);
        assert_eq!(view.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_messages_do_nothing() {
        let view = CountingView::new(false);
        let reconciler = OpenerReconciler::new(view.clone());

        assert!(!reconciler.on_message("junk").await);
        assert!(!reconciler.on_message(r#"{"type":"resize","w":800}"#).await);
        assert_eq!(view.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_contained() {
        let view = CountingView::new(true);
        let reconciler = OpenerReconciler::new(view.clone());

        let raw = PaymentMessage::success("ORD123").to_json();
        assert!(reconciler.on_message(&raw).await);
        assert_eq!(view.refreshes.load(Ordering::SeqCst), 1);
    }
}

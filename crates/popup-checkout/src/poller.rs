//! Result Poller
//!
//! Runs inside the popup after the gateway redirects back to the
//! result page. Polls the order-status endpoint with a bounded retry
//! budget, reports success to the opener window, and closes itself.
//!
//! Polling is deliberate: the popup is a disposable, short-lived
//! context with no durable subscription, and the bounded budget keeps
//! it from spinning forever when the gateway's server callback is
//! delayed or lost. The poller never writes order state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use market_core::OrderStatus;

use crate::error::{PopupError, Result};
use crate::message::PaymentMessage;

/// Poller timing configuration
#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Maximum status queries per polling run
    pub max_attempts: u32,

    /// Delay between consecutive queries
    pub retry_delay: Duration,

    /// How long the success message stays visible before the popup
    /// closes itself
    pub close_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_secs(2),
            close_delay: Duration::from_secs(2),
        }
    }
}

/// Poller lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Querying the order status
    Loading,

    /// Order observed as paid
    Success,

    /// Budget exhausted while the order was still unpaid. Materially
    /// different from `Error`: the payment may yet complete.
    Pending,

    /// Could not determine the outcome (no order number, or the
    /// status endpoint kept failing)
    Error,
}

/// One read of the server's order record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Merchant order number
    pub order_no: String,

    /// Order status; `paid` is the sole success signal
    pub status: OrderStatus,

    /// Order amount in currency units
    pub amount: Decimal,

    /// Linked resource, if the order unlocks one
    pub resource: Option<ResourceSummary>,
}

/// Resource fields the result page displays
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: u64,
    pub title: String,
}

/// Read-only order status port
#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    /// Query the current order record
    async fn fetch(&self, order_no: &str) -> Result<StatusSnapshot>;
}

/// Host hooks for the popup window itself
pub trait PopupSurface: Send + Sync {
    /// Post a message to the opener window. May fail when the opener
    /// has been closed or is cross-origin-restricted; the poller
    /// tolerates that.
    fn post_to_opener(&self, message: &PaymentMessage) -> Result<()>;

    /// Whether an opener window exists
    fn has_opener(&self) -> bool;

    /// Close this popup
    fn close(&self);

    /// Navigate to the site root (fallback for a popup with no opener,
    /// which cannot usefully close itself)
    fn navigate_home(&self);
}

/// Extract the merchant order number from the gateway redirect URL.
///
/// Everything else in the redirect query (status flags, amounts) is
/// client-controlled and unsigned, so it is ignored outright; only a
/// fresh server query decides the outcome.
pub fn order_no_from_redirect(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "out_trade_no")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// The result-page state machine
pub struct ResultPoller {
    source: Arc<dyn OrderStatusSource>,
    surface: Arc<dyn PopupSurface>,
    config: PollerConfig,
    state: PollState,
    last_error: Option<PopupError>,
}

impl ResultPoller {
    /// Create with default timing
    pub fn new(source: Arc<dyn OrderStatusSource>, surface: Arc<dyn PopupSurface>) -> Self {
        Self::with_config(source, surface, PollerConfig::default())
    }

    /// Create with custom timing
    pub fn with_config(
        source: Arc<dyn OrderStatusSource>,
        surface: Arc<dyn PopupSurface>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            surface,
            config,
            state: PollState::Loading,
            last_error: None,
        }
    }

    /// Current state
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Last transient or fatal error, for the result page to display
    pub fn last_error(&self) -> Option<&PopupError> {
        self.last_error.as_ref()
    }

    /// Message for the current state
    pub fn user_message(&self) -> &str {
        match self.state {
            PollState::Loading => "Confirming your payment…",
            PollState::Success => "Payment received! This window will close shortly.",
            PollState::Pending => {
                "Your payment is still processing. Retry in a moment, or close this window — your order will complete on its own."
            }
            PollState::Error => self
                .last_error
                .as_ref()
                .map(PopupError::user_message)
                .unwrap_or("We could not confirm your payment."),
        }
    }

    /// Entry point on popup load: parse the redirect URL and poll.
    ///
    /// A redirect without an order number goes straight to `Error`
    /// without touching the network.
    pub async fn run(&mut self, redirect_url: &str) -> PollState {
        match order_no_from_redirect(redirect_url) {
            Some(order_no) => self.poll(&order_no).await,
            None => {
                tracing::warn!(redirect_url, "Redirect carried no order number");
                self.last_error = Some(PopupError::MissingOrderNumber);
                self.state = PollState::Error;
                self.state
            }
        }
    }

    /// Manual retry from `Pending` or `Error`: fresh budget, back to
    /// `Loading`.
    pub async fn retry(&mut self, order_no: &str) -> PollState {
        self.poll(order_no).await
    }

    /// Manual close from a terminal state
    pub fn close(&self) {
        if self.surface.has_opener() {
            self.surface.close();
        } else {
            self.surface.navigate_home();
        }
    }

    async fn poll(&mut self, order_no: &str) -> PollState {
        self.state = PollState::Loading;
        self.last_error = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match self.source.fetch(order_no).await {
                Ok(snapshot) if snapshot.status.is_paid() => {
                    tracing::info!(order_no, attempts, "Order paid");
                    self.state = PollState::Success;
                    self.notify_opener(order_no);
                    tokio::time::sleep(self.config.close_delay).await;
                    self.surface.close();
                    return self.state;
                }
                Ok(snapshot) => {
                    tracing::debug!(
                        order_no,
                        status = %snapshot.status,
                        attempts,
                        "Order not paid yet"
                    );
                    if attempts >= self.config.max_attempts {
                        self.state = PollState::Pending;
                        return self.state;
                    }
                }
                Err(err) => {
                    tracing::warn!(order_no, attempts, error = %err, "Status query failed");
                    self.last_error = Some(err);
                    if attempts >= self.config.max_attempts {
                        self.state = PollState::Error;
                        return self.state;
                    }
                }
            }

            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Best-effort success notification. The opener may already be
    /// gone; that must not take the poller down.
    fn notify_opener(&self, order_no: &str) {
        let message = PaymentMessage::success(order_no);
        if let Err(err) = self.surface.post_to_opener(&message) {
            tracing::warn!(error = %err, "Could not notify opener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_secs(2);

    struct ScriptedSource {
        script: Mutex<VecDeque<Result<StatusSnapshot>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<StatusSnapshot>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn push(&self, step: Result<StatusSnapshot>) {
            self.script.lock().unwrap().push_back(step);
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderStatusSource for ScriptedSource {
        async fn fetch(&self, _order_no: &str) -> Result<StatusSnapshot> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PopupError::StatusRequest("connection refused".into())))
        }
    }

    struct RecordingSurface {
        messages: Mutex<Vec<PaymentMessage>>,
        closed: AtomicBool,
        homed: AtomicBool,
        opener_present: bool,
        post_fails: bool,
    }

    impl RecordingSurface {
        fn new() -> Arc<Self> {
            Arc::new(Self::bare())
        }

        fn without_opener() -> Arc<Self> {
            Arc::new(Self {
                opener_present: false,
                ..Self::bare()
            })
        }

        fn with_failing_post() -> Arc<Self> {
            Arc::new(Self {
                post_fails: true,
                ..Self::bare()
            })
        }

        fn bare() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                homed: AtomicBool::new(false),
                opener_present: true,
                post_fails: false,
            }
        }

        fn posted(&self) -> Vec<PaymentMessage> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl PopupSurface for RecordingSurface {
        fn post_to_opener(&self, message: &PaymentMessage) -> Result<()> {
            self.messages.lock().unwrap().push(message.clone());
            if self.post_fails {
                return Err(PopupError::Opener("opener window is gone".into()));
            }
            Ok(())
        }

        fn has_opener(&self) -> bool {
            self.opener_present
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn navigate_home(&self) {
            self.homed.store(true, Ordering::SeqCst);
        }
    }

    fn pending() -> Result<StatusSnapshot> {
        Ok(StatusSnapshot {
            order_no: "ORD123".into(),
            status: OrderStatus::Pending,
            amount: dec!(99.00),
            resource: None,
        })
    }

    fn paid() -> Result<StatusSnapshot> {
        Ok(StatusSnapshot {
            order_no: "ORD123".into(),
            status: OrderStatus::Paid,
            amount: dec!(99.00),
            resource: Some(ResourceSummary {
                id: 7,
                title: "Course".into(),
            }),
        })
    }

    fn redirect(order_no: Option<&str>) -> String {
        match order_no {
            Some(no) => format!(
                "https://market.example.com/pay/result?out_trade_no={no}&trade_status=TRADE_SUCCESS"
            ),
            None => "https://market.example.com/pay/result?trade_status=TRADE_SUCCESS".into(),
        }
    }

    #[test]
    fn test_order_no_extraction() {
        assert_eq!(
            order_no_from_redirect(&redirect(Some("ORD123"))),
            Some("ORD123".into())
        );
        assert_eq!(order_no_from_redirect(&redirect(None)), None);
        assert_eq!(
            order_no_from_redirect("https://market.example.com/pay/result?out_trade_no="),
            None
        );
        assert_eq!(order_no_from_redirect("not a url"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_order_number_makes_no_request() {
        let source = ScriptedSource::new(vec![paid()]);
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        let state = poller.run(&redirect(None)).await;

        assert_eq!(state, PollState::Error);
        assert!(matches!(
            poller.last_error(),
            Some(PopupError::MissingOrderNumber)
        ));
        assert!(source.call_times().is_empty());
        assert!(surface.posted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paid_on_fourth_query() {
        let source = ScriptedSource::new(vec![pending(), pending(), pending(), paid()]);
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        let started = Instant::now();
        let state = poller.run(&redirect(Some("ORD123"))).await;

        assert_eq!(state, PollState::Success);

        // Exactly four queries, spaced by the retry delay.
        let calls = source.call_times();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], DELAY);
        }

        // Exactly one opener notification, then the delayed self-close.
        assert_eq!(
            surface.posted(),
            vec![PaymentMessage::success("ORD123")]
        );
        assert!(surface.closed.load(Ordering::SeqCst));
        assert_eq!(started.elapsed(), 3 * DELAY + DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_while_pending() {
        let source = ScriptedSource::new((0..10).map(|_| pending()).collect());
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        let state = poller.run(&redirect(Some("ORD123"))).await;

        // "Gave up waiting", not "request failed".
        assert_eq!(state, PollState::Pending);
        assert_eq!(source.call_times().len(), 10);
        assert!(surface.posted().is_empty());
        assert!(!surface.closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_on_failures() {
        // Empty script: every fetch fails.
        let source = ScriptedSource::new(Vec::new());
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        let state = poller.run(&redirect(Some("ORD123"))).await;

        assert_eq!(state, PollState::Error);
        assert_eq!(source.call_times().len(), 10);
        assert!(surface.posted().is_empty());
        assert!(matches!(
            poller.last_error(),
            Some(PopupError::StatusRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_opener_does_not_crash_success() {
        let source = ScriptedSource::new(vec![paid()]);
        let surface = RecordingSurface::with_failing_post();
        let mut poller = ResultPoller::new(source, surface.clone());

        let state = poller.run(&redirect(Some("ORD123"))).await;

        assert_eq!(state, PollState::Success);
        assert_eq!(surface.posted().len(), 1);
        assert!(surface.closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_resets_budget() {
        let source = ScriptedSource::new((0..10).map(|_| pending()).collect());
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        assert_eq!(poller.run(&redirect(Some("ORD123"))).await, PollState::Pending);

        source.push(paid());
        assert_eq!(poller.retry("ORD123").await, PollState::Success);
        assert_eq!(source.call_times().len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_close_prefers_opener() {
        let source = ScriptedSource::new(Vec::new());

        let with_opener = RecordingSurface::new();
        ResultPoller::new(source.clone(), with_opener.clone()).close();
        assert!(with_opener.closed.load(Ordering::SeqCst));
        assert!(!with_opener.homed.load(Ordering::SeqCst));

        let orphaned = RecordingSurface::without_opener();
        ResultPoller::new(source, orphaned.clone()).close();
        assert!(!orphaned.closed.load(Ordering::SeqCst));
        assert!(orphaned.homed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_messages_are_distinct() {
        let source = ScriptedSource::new((0..10).map(|_| pending()).collect());
        let surface = RecordingSurface::new();
        let mut poller = ResultPoller::new(source.clone(), surface.clone());

        let loading_message = poller.user_message().to_string();
        poller.run(&redirect(Some("ORD123"))).await;
        let pending_message = poller.user_message().to_string();
        poller.retry("ORD123").await;
        let error_message = poller.user_message().to_string();

        assert_ne!(loading_message, pending_message);
        assert_ne!(pending_message, error_message);
    }
}

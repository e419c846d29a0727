//! # popup-checkout
//!
//! The popup-based payment flow: a launcher that opens the gateway in
//! a centered popup, the result poller that runs inside the popup
//! after the gateway redirects back, and the reconciler the opener
//! page uses to react to the popup's success message.
//!
//! ## Poller states
//!
//! ```text
//!              ┌─────────┐  paid          ┌─────────┐
//!    load ────▶│ Loading │───────────────▶│ Success │──▶ notify + close
//!              └────┬────┘                └─────────┘
//!          budget   │   budget
//!        exhausted, │ exhausted,
//!        last query │ last query
//!            failed │ still pending
//!         ┌─────────┴─────────┐
//!         ▼                   ▼
//!     ┌───────┐          ┌─────────┐
//!     │ Error │          │ Pending │        (both offer manual
//!     └───────┘          └─────────┘         retry back to Loading)
//! ```
//!
//! Browser concerns (window opening, form submission, postMessage,
//! close/navigate) are trait ports, so the whole flow runs and tests
//! off-browser. The poller only ever *reads* order state; the server's
//! order record stays the single source of truth, written solely by
//! the gateway's signed notify callback.

pub mod error;
pub mod launcher;
pub mod message;
pub mod poller;
pub mod reconciler;

pub use error::{PopupError, Result};
pub use launcher::{
    GatewayForm, LauncherConfig, PopupGeometry, PopupLauncher, PopupWindow, Viewport,
    WindowOpener, render_form_document,
};
pub use message::PaymentMessage;
pub use poller::{
    OrderStatusSource, PollState, PollerConfig, PopupSurface, ResourceSummary, ResultPoller,
    StatusSnapshot, order_no_from_redirect,
};
pub use reconciler::{OpenerReconciler, StorefrontView};

//! Popup Launcher
//!
//! Starts a payment without navigating the opener page away: opens a
//! sized, centered popup and hands it to the gateway by writing an
//! auto-submitting hidden form into it. The descriptor fields come
//! from the server and are submitted untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PopupError, Result};

/// Screen-space rectangle of the opener's viewport
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

/// Placement of a popup window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupGeometry {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

impl PopupGeometry {
    /// Center a popup of the given size on the viewport
    pub fn centered(width: u32, height: u32, viewport: &Viewport) -> Self {
        let dx = (viewport.width.saturating_sub(width) / 2) as i32;
        let dy = (viewport.height.saturating_sub(height) / 2) as i32;

        Self {
            width,
            height,
            left: viewport.left + dx,
            top: viewport.top + dy,
        }
    }

    /// `window.open` feature string
    pub fn features(&self) -> String {
        format!(
            "width={},height={},left={},top={}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// The form a popup submits to the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayForm {
    /// Gateway checkout URL
    pub action_url: String,

    /// One hidden input per field
    pub fields: BTreeMap<String, String>,
}

impl GatewayForm {
    pub fn new(action_url: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            action_url: action_url.into(),
            fields,
        }
    }
}

/// Handle to an opened popup window
pub trait PopupWindow: Send + Sync {
    /// Replace the popup document (used for the auto-submit form)
    fn write_document(&self, html: &str) -> Result<()>;
}

/// Host hook that actually opens browser windows
pub trait WindowOpener: Send + Sync {
    /// Open a named popup; `None` means the browser blocked it
    fn open(&self, name: &str, geometry: &PopupGeometry) -> Option<Box<dyn PopupWindow>>;
}

/// Launcher configuration
#[derive(Clone, Debug)]
pub struct LauncherConfig {
    /// Popup width in pixels
    pub width: u32,

    /// Popup height in pixels
    pub height: u32,

    /// Window name, reused so double-clicks target one popup
    pub window_name: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            window_name: "payment_popup".into(),
        }
    }
}

/// Popup launcher
pub struct PopupLauncher<W: WindowOpener> {
    opener: W,
    config: LauncherConfig,
}

impl<W: WindowOpener> PopupLauncher<W> {
    /// Create with default geometry
    pub fn new(opener: W) -> Self {
        Self::with_config(opener, LauncherConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(opener: W, config: LauncherConfig) -> Self {
        Self { opener, config }
    }

    /// Open the popup and submit the gateway form inside it.
    ///
    /// A blocked popup is its own failure mode — the user can fix it
    /// by allowing popups — and must never be reported as a payment
    /// failure. No form is submitted in that case.
    pub fn launch(&self, viewport: &Viewport, form: &GatewayForm) -> Result<Box<dyn PopupWindow>> {
        let geometry = PopupGeometry::centered(self.config.width, self.config.height, viewport);

        let Some(window) = self.opener.open(&self.config.window_name, &geometry) else {
            tracing::warn!("Browser blocked the payment popup");
            return Err(PopupError::PopupBlocked);
        };

        window.write_document(&render_form_document(form))?;
        tracing::info!(url = %form.action_url, "Submitted gateway form in popup");

        Ok(window)
    }
}

/// Render the hidden auto-submitting form document
pub fn render_form_document(form: &GatewayForm) -> String {
    let mut inputs = String::new();
    for (name, value) in &form.fields {
        inputs.push_str(&format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            escape_html(name),
            escape_html(value)
        ));
    }

    format!(
        concat!(
            "<!DOCTYPE html><html><body>",
            r#"<form id="gateway" method="post" action="{}">{}</form>"#,
            r#"<script>document.getElementById("gateway").submit();</script>"#,
            "</body></html>"
        ),
        escape_html(&form.action_url),
        inputs
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

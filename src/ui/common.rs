//! # UI Common Components and Utilities
//!
//! Shared styling and the toast overlay used by the inspector and MQTT
//! panels.
//!
//! ## Key Abstractions
//!
//! ### Theme
//! [`UiColors`] holds the dark palette as compile-time constants, status
//! colours included.
//!
//! ### Toasts
//! [`Toasts`] shows short lived user notices (connection failed, connection
//! lost) in the bottom right corner, each for [`TOAST_DURATION`].

use eframe::egui::{self, Align2, Color32, Frame, Id, Stroke};
use std::time::{Duration, Instant};

use crate::mqtt::state::ConnectionStatus;

/// How long a toast stays visible
pub const TOAST_DURATION: Duration = Duration::from_millis(3500);

/// Creates a styled frame with consistent visual parameters.
pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}

/// Centralized color palette for the dark theme.
///
/// Colors are organized from darkest to lightest background colors, with
/// semantic colors for status indication:
/// - **Background Colors**: EXTREME_BG → INNER_BG → MAIN_BG (darkest to lightest)
/// - **Status Colors**: ACTIVE (green), PENDING (amber), INACTIVE (red)
/// - **Structural Colors**: BORDER for component separation
pub struct UiColors;

impl UiColors {
    /// Primary background color for main content areas (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Secondary background color for nested components (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Deepest background color for emphasized content areas (RGB: 20, 20, 20)
    pub const EXTREME_BG: Color32 = Color32::from_rgb(20, 20, 20);

    /// Border color for component separation (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Active/connected status indicator color (RGB: 50, 200, 20) - Green
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Transitional status indicator color (RGB: 230, 170, 30) - Amber
    pub const PENDING: Color32 = Color32::from_rgb(230, 170, 30);

    /// Inactive/disconnected status indicator color (RGB: 200, 50, 20) - Red
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Muted text for UUIDs and secondary values
    pub const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

    pub fn for_status(status: ConnectionStatus) -> Color32 {
        match status {
            ConnectionStatus::Connected => Self::ACTIVE,
            ConnectionStatus::Connecting | ConnectionStatus::Disconnecting => Self::PENDING,
            ConnectionStatus::None | ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                Self::INACTIVE
            }
        }
    }
}

struct Toast {
    text: String,
    shown_at: Instant,
}

#[derive(Default)]
pub struct Toasts {
    items: Vec<Toast>,
}

impl Toasts {
    pub fn push(&mut self, text: impl Into<String>) {
        self.items.push(Toast {
            text: text.into(),
            shown_at: Instant::now(),
        });
    }

    /// Removes toasts older than [`TOAST_DURATION`] as of `now`
    pub fn expire(&mut self, now: Instant) {
        self.items
            .retain(|toast| now.duration_since(toast.shown_at) < TOAST_DURATION);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render(&mut self, ctx: &egui::Context) {
        self.expire(Instant::now());
        if self.items.is_empty() {
            return;
        }

        egui::Area::new(Id::new("toasts"))
            .anchor(Align2::RIGHT_BOTTOM, [-12.0, -12.0])
            .show(ctx, |ui| {
                for toast in &self.items {
                    create_frame(UiColors::EXTREME_BG, UiColors::INACTIVE).show(ui, |ui| {
                        ui.label(&toast.text);
                    });
                }
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_their_duration() {
        let mut toasts = Toasts::default();
        toasts.push("MQTT connection lost");
        assert_eq!(toasts.len(), 1);

        toasts.expire(Instant::now());
        assert_eq!(toasts.len(), 1);

        toasts.expire(Instant::now() + TOAST_DURATION + Duration::from_millis(1));
        assert!(toasts.is_empty());
    }

    #[test]
    fn status_colors() {
        assert_eq!(UiColors::for_status(ConnectionStatus::Connected), UiColors::ACTIVE);
        assert_eq!(UiColors::for_status(ConnectionStatus::Connecting), UiColors::PENDING);
        assert_eq!(UiColors::for_status(ConnectionStatus::Error), UiColors::INACTIVE);
    }
}

//! # gattbridge User Interface Module
//!
//! Desktop front end built on eframe/egui. The UI owns no device or broker
//! state; it renders snapshots published by the inspector and bridge tasks
//! and sends commands back over their channels.
//!
//! ## Layout
//!
//! The window uses a fixed three panel layout:
//! - **Top Panel**: connected device name, its first advertised UUID and the
//!   MQTT status indicator
//! - **Central Panel**: the inspector list (services → characteristics →
//!   descriptors), one service group open at a time
//! - **Right Panel**: MQTT connect, subscribe, publish and the received
//!   message log
//!
//! User notices raised by the bridge are shown as toasts on top.
//!
//! ## Frame Rate
//!
//! Repaints are requested at the configured fps so values arriving from
//! the BLE device show up without user input.

pub mod common;
pub mod inspector_menu;
pub mod mqtt_menu;

use eframe::egui;
use std::time::Duration;

use crate::config::UiSettings;

use self::common::Toasts;
use self::inspector_menu::InspectorMenuData;
use self::mqtt_menu::MQTTMenuData;

pub struct GattBridgeUI {
    inspector_menu_data: InspectorMenuData,
    mqtt_menu_data: MQTTMenuData,
    toasts: Toasts,
    repaint_interval: Duration,
}

impl GattBridgeUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: &UiSettings,
        inspector_menu_data: InspectorMenuData,
        mqtt_menu_data: MQTTMenuData,
    ) -> Self {
        let theme = if settings.dark_theme {
            egui::Theme::Dark
        } else {
            egui::Theme::Light
        };
        cc.egui_ctx.set_theme(theme);

        Self {
            inspector_menu_data,
            mqtt_menu_data,
            toasts: Toasts::default(),
            repaint_interval: repaint_interval(settings.fps),
        }
    }
}

fn repaint_interval(fps: u8) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

impl eframe::App for GattBridgeUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(self.repaint_interval);

        self.inspector_menu_data.refresh();
        self.mqtt_menu_data.poll(&mut self.toasts);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.vertical(|ui| self.inspector_menu_data.device_header(ui));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    self.mqtt_menu_data.status_indicator(ui);
                });
            });
        });

        egui::SidePanel::right("mqtt_panel")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.mqtt_menu_data.render(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.inspector_menu_data.render(ui));

        self.toasts.render(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repaint_interval_follows_fps() {
        assert_eq!(repaint_interval(30), Duration::from_millis(33));
        assert_eq!(repaint_interval(0), Duration::from_millis(1000));
    }
}

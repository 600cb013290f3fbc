use eframe::egui::{self, ComboBox, DragValue, RichText, ScrollArea, TextEdit, Ui};
use tokio::sync::mpsc;
use tracing::debug;

use super::common::{create_frame, Toasts, UiColors};
use crate::mqtt::config::{MqttSettings, Qos};
use crate::mqtt::message_manager::MqttMessage;
use crate::mqtt::mqtt_handler::{BridgeCommand, BridgeUpdate, MQTTHandle};

const MESSAGE_LOG_LIMIT: usize = 200;

/// Datenstruktur für das MQTT-Menü
pub struct MQTTMenuData {
    handle: MQTTHandle,
    updates: mpsc::Receiver<BridgeUpdate>,
    auto_subscribe_topic: Option<String>,
    host: String,
    port: u16,
    subscribe_topic: String,
    subscribe_qos: Qos,
    subscribed_topics: Vec<String>,
    publish_topic: String,
    publish_payload: String,
    publish_qos: Qos,
    received_messages: Vec<MqttMessage>,
}

impl MQTTMenuData {
    pub fn new(
        handle: MQTTHandle,
        updates: mpsc::Receiver<BridgeUpdate>,
        settings: &MqttSettings,
    ) -> Self {
        Self {
            handle,
            updates,
            auto_subscribe_topic: settings.auto_subscribe_topic().map(str::to_string),
            host: settings.host.clone(),
            port: settings.port,
            subscribe_topic: settings.subscribe_topic.clone().unwrap_or_default(),
            subscribe_qos: Qos::ExactlyOnce,
            subscribed_topics: Vec::new(),
            publish_topic: settings.publish_topic.clone().unwrap_or_default(),
            publish_payload: String::new(),
            publish_qos: settings.publish_qos,
            received_messages: Vec::new(),
        }
    }

    /// Drains listener updates, notices become toasts.
    ///
    /// Sessions are clean, so the topic list starts over with every
    /// connection and only holds the auto-subscribed topic at first.
    pub fn poll(&mut self, toasts: &mut Toasts) {
        while let Ok(update) = self.updates.try_recv() {
            match update {
                BridgeUpdate::Connected => {
                    debug!("UI: MQTT connected");
                    self.subscribed_topics = self.auto_subscribe_topic.iter().cloned().collect();
                }
                BridgeUpdate::Disconnected => {
                    debug!("UI: MQTT disconnected");
                    self.subscribed_topics.clear();
                }
                BridgeUpdate::Message(message) => {
                    self.received_messages.push(message);
                    if self.received_messages.len() > MESSAGE_LOG_LIMIT {
                        let excess = self.received_messages.len() - MESSAGE_LOG_LIMIT;
                        self.received_messages.drain(..excess);
                    }
                }
                BridgeUpdate::Notice(notice) => toasts.push(notice.text()),
            }
        }
    }

    pub fn status_indicator(&self, ui: &mut Ui) {
        let status = self.handle.status();
        ui.colored_label(UiColors::for_status(status), "\u{2B24}");
        ui.label(format!("MQTT: {}", status));
    }

    /// Rendert das MQTT-Menü
    pub fn render(&mut self, ui: &mut Ui) {
        let connected = self.handle.status().is_connected();

        ui.heading("MQTT");
        create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label("Server");
                ui.add(TextEdit::singleline(&mut self.host).desired_width(140.0));
                ui.add(DragValue::new(&mut self.port).range(1..=u16::MAX));
            });
            ui.horizontal(|ui| {
                if connected {
                    if ui.button("Disconnect").clicked() {
                        self.handle.send(BridgeCommand::Disconnect);
                    }
                } else if ui.button("Connect").clicked() {
                    self.handle.send(BridgeCommand::Connect {
                        host: self.host.trim().to_string(),
                        port: self.port,
                    });
                }
            });
        });

        ui.add_enabled_ui(connected, |ui| {
            create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
                ui.label("Subscribe");
                ui.horizontal(|ui| {
                    ui.add(TextEdit::singleline(&mut self.subscribe_topic).desired_width(160.0));
                    qos_selection(ui, "subscribe_qos", &mut self.subscribe_qos);
                    let clicked = ui.button("+").clicked();
                    if let Some(topic) = topic_input(&self.subscribe_topic).filter(|_| clicked) {
                        self.handle.send(BridgeCommand::Subscribe {
                            topic: topic.clone(),
                            qos: self.subscribe_qos,
                        });
                        if !self.subscribed_topics.contains(&topic) {
                            self.subscribed_topics.push(topic);
                        }
                    }
                });

                let mut removed = None;
                for (index, topic) in self.subscribed_topics.iter().enumerate() {
                    ui.horizontal(|ui| {
                        if ui.small_button("x").clicked() {
                            removed = Some(index);
                        }
                        ui.label(topic);
                    });
                }
                if let Some(index) = removed {
                    let topic = self.subscribed_topics.remove(index);
                    self.handle.send(BridgeCommand::Unsubscribe { topic });
                }
            });

            create_frame(UiColors::MAIN_BG, UiColors::BORDER).show(ui, |ui| {
                ui.label("Publish");
                ui.horizontal(|ui| {
                    ui.add(TextEdit::singleline(&mut self.publish_topic).desired_width(160.0));
                    qos_selection(ui, "publish_qos", &mut self.publish_qos);
                });
                ui.add(
                    TextEdit::multiline(&mut self.publish_payload)
                        .desired_rows(3)
                        .desired_width(f32::INFINITY),
                );
                let clicked = ui.button("Send").clicked();
                if let Some(topic) = topic_input(&self.publish_topic).filter(|_| clicked) {
                    self.handle.send(BridgeCommand::Publish {
                        topic,
                        payload: self.publish_payload.as_bytes().to_vec(),
                        qos: self.publish_qos,
                    });
                }
            });
        });

        ui.separator();
        ui.label("Received");
        self.message_log(ui);
    }

    fn message_log(&self, ui: &mut Ui) {
        create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
            ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink(false)
                .show(ui, |ui| {
                    for message in &self.received_messages {
                        ui.label(RichText::new(message.render()).monospace());
                        ui.separator();
                    }
                });
        });
    }
}

/// Trimmed topic, `None` when nothing but whitespace was typed
fn topic_input(text: &str) -> Option<String> {
    let topic = text.trim();
    (!topic.is_empty()).then(|| topic.to_string())
}

fn qos_selection(ui: &mut Ui, id: &str, qos: &mut Qos) {
    ComboBox::from_id_salt(id)
        .width(50.0)
        .selected_text(format!("QoS {}", *qos as u8))
        .show_ui(ui, |ui| {
            ui.selectable_value(qos, Qos::AtMostOnce, "QoS 0");
            ui.selectable_value(qos, Qos::AtLeastOnce, "QoS 1");
            ui.selectable_value(qos, Qos::ExactlyOnce, "QoS 2");
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::manager::tests::{FakeTransport, RecordingListener};
    use crate::mqtt::manager::{MqttManager, UserNotice};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    fn menu_for(
        settings: &MqttSettings,
        cancel: &CancellationToken,
    ) -> (MQTTMenuData, mpsc::Sender<BridgeUpdate>, JoinHandle<()>) {
        let (_events_tx, events_rx) = mpsc::channel(1);
        let manager: MqttManager<FakeTransport, RecordingListener> =
            MqttManager::new(FakeTransport::default(), settings.clone());
        let (handle, task) = MQTTHandle::spawn_with(manager, events_rx, cancel.clone());

        let (update_tx, update_rx) = mpsc::channel(8);
        (MQTTMenuData::new(handle, update_rx, settings), update_tx, task)
    }

    #[tokio::test]
    async fn poll_turns_notices_into_toasts_and_logs_messages() {
        let cancel = CancellationToken::new();
        let (mut menu, update_tx, task) = menu_for(&MqttSettings::default(), &cancel);
        let mut toasts = Toasts::default();

        update_tx
            .try_send(BridgeUpdate::Notice(UserNotice::ConnectionLost))
            .unwrap();
        update_tx
            .try_send(BridgeUpdate::Message(MqttMessage::from_topic(
                "bluefruit/in".to_string(),
                b"on".to_vec(),
                Qos::ExactlyOnce,
                false,
            )))
            .unwrap();
        menu.poll(&mut toasts);

        assert_eq!(toasts.len(), 1);
        assert_eq!(menu.received_messages.len(), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[test]
    fn blank_topics_are_rejected() {
        assert_eq!(topic_input("   "), None);
        assert_eq!(topic_input(""), None);
        assert_eq!(topic_input("  ble/out "), Some("ble/out".to_string()));
    }

    #[tokio::test]
    async fn topic_list_follows_the_connection() {
        let settings = MqttSettings {
            subscribe_topic: Some("in".to_string()),
            subscribe_enabled: true,
            ..MqttSettings::default()
        };
        let cancel = CancellationToken::new();
        let (mut menu, update_tx, task) = menu_for(&settings, &cancel);
        let mut toasts = Toasts::default();

        // Nothing is subscribed before a connection exists
        assert!(menu.subscribed_topics.is_empty());

        update_tx.try_send(BridgeUpdate::Connected).unwrap();
        menu.poll(&mut toasts);
        assert_eq!(menu.subscribed_topics, vec!["in".to_string()]);

        menu.subscribed_topics.push("manual".to_string());
        update_tx.try_send(BridgeUpdate::Disconnected).unwrap();
        menu.poll(&mut toasts);
        assert!(menu.subscribed_topics.is_empty());

        // A clean reconnect only restores the auto-subscribed topic
        update_tx.try_send(BridgeUpdate::Connected).unwrap();
        menu.poll(&mut toasts);
        assert_eq!(menu.subscribed_topics, vec!["in".to_string()]);

        cancel.cancel();
        task.await.unwrap();
    }
}

use chrono::NaiveDateTime;
use std::fmt;

use super::config::Qos;

const PREVIEW_CHARS: usize = 10;

/// A message received from the broker, as kept in the UI log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub duplicate: bool,
    pub timestamp: NaiveDateTime,
}

impl fmt::Display for MqttMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content().chars().take(PREVIEW_CHARS).collect();
        write!(f, "{} - {}", self.timestamp.format("%H:%M:%S"), preview)
    }
}

impl MqttMessage {
    pub fn from_topic(topic: String, payload: Vec<u8>, qos: Qos, duplicate: bool) -> Self {
        MqttMessage {
            topic,
            payload,
            qos,
            duplicate,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    /// Payload decoded as UTF-8, invalid sequences replaced
    pub fn content(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn render(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.topic,
            self.content()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn message(payload: &[u8]) -> MqttMessage {
        MqttMessage {
            topic: "bluefruit/in".to_string(),
            payload: payload.to_vec(),
            qos: Qos::ExactlyOnce,
            duplicate: false,
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 30, 5)
                .unwrap(),
        }
    }

    #[test]
    fn preview_is_truncated_without_panicking_on_short_payloads() {
        assert_eq!(message(b"hi").to_string(), "12:30:05 - hi");
        assert_eq!(
            message(b"0123456789abcdef").to_string(),
            "12:30:05 - 0123456789"
        );
    }

    #[test]
    fn render_includes_topic_and_lossy_content() {
        assert_eq!(
            message(&[b'o', b'k', 0xFF]).render(),
            "2024-05-01 12:30:05: bluefruit/in\nok\u{FFFD}"
        );
    }
}

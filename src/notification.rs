//! The notification payload model: the `aps` dictionary APNs expects as the
//! JSON body of a push request.

use serde::Serialize;
use serde_json::{Map, Value};

/// The `apns-push-type` header value, and the top-level shape of the `aps` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushType {
    Alert,
    Background,
    VoipLegacy,
    Complication,
    FileProvider,
    Mdm,
}

impl PushType {
    pub(crate) fn header_value(self) -> &'static str {
        match self {
            PushType::Alert => "alert",
            PushType::Background => "background",
            PushType::VoipLegacy => "voip",
            PushType::Complication => "complication",
            PushType::FileProvider => "fileprovider",
            PushType::Mdm => "mdm",
        }
    }
}

/// An alert, either a plain string or a title/body pair.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Alert {
    Plain(String),
    Detailed {
        title: String,
        body: String,
    },
}

#[derive(Debug, Clone, Serialize)]
struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    content_available: Option<u8>,
    #[serde(rename = "mutable-content", skip_serializing_if = "Option::is_none")]
    mutable_content: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(rename = "thread-id", skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

/// A notification being assembled for [`Client::send_notification`](crate::client::Client::send_notification).
///
/// Builder methods return `Self` so calls can be chained; `encode` produces
/// the UTF-8 JSON body APNs expects as the request payload.
#[derive(Debug, Clone)]
pub struct Notification {
    push_type: PushType,
    aps: Aps,
    custom: Map<String, Value>,
}

impl Notification {
    pub fn new(push_type: PushType) -> Notification {
        Notification {
            push_type,
            aps: Aps {
                alert: None,
                badge: None,
                sound: None,
                content_available: None,
                mutable_content: None,
                category: None,
                thread_id: None,
            },
            custom: Map::new(),
        }
    }

    pub fn push_type(&self) -> PushType {
        self.push_type
    }

    pub fn alert(mut self, alert: impl Into<String>) -> Self {
        self.aps.alert = Some(Alert::Plain(alert.into()));
        self
    }

    pub fn detailed_alert(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.aps.alert = Some(Alert::Detailed {
            title: title.into(),
            body: body.into(),
        });
        self
    }

    pub fn badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    pub fn content_available(mut self) -> Self {
        self.aps.content_available = Some(1);
        self
    }

    pub fn mutable_content(mut self) -> Self {
        self.aps.mutable_content = Some(1);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.aps.category = Some(category.into());
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.aps.thread_id = Some(thread_id.into());
        self
    }

    /// Adds an arbitrary top-level key alongside `aps`, for app-specific data.
    pub fn custom_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Renders the `{"aps": {...}, ...custom}` JSON body.
    pub fn encode(&self) -> bytes::Bytes {
        let mut object = Map::new();
        object.insert(
            "aps".to_owned(),
            serde_json::to_value(&self.aps).expect("Aps serializes to a JSON object"),
        );
        for (key, value) in &self.custom {
            object.insert(key.clone(), value.clone());
        }
        bytes::Bytes::from(Value::Object(object).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_alert_encodes_without_empty_fields() {
        let body = Notification::new(PushType::Alert)
            .alert("You have a message")
            .badge(3)
            .encode();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["aps"]["alert"], "You have a message");
        assert_eq!(value["aps"]["badge"], 3);
        assert!(value["aps"].get("sound").is_none());
        assert!(value["aps"].get("content-available").is_none());
    }

    #[test]
    fn detailed_alert_and_content_available_flags() {
        let body = Notification::new(PushType::Background)
            .detailed_alert("Title", "Body")
            .content_available()
            .mutable_content()
            .encode();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["aps"]["alert"]["title"], "Title");
        assert_eq!(value["aps"]["alert"]["body"], "Body");
        assert_eq!(value["aps"]["content-available"], 1);
        assert_eq!(value["aps"]["mutable-content"], 1);
    }

    #[test]
    fn custom_data_is_merged_at_top_level() {
        let body = Notification::new(PushType::Alert)
            .alert("hi")
            .custom_data("order_id", Value::String("42".into()))
            .encode();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["order_id"], "42");
        assert!(value["aps"].is_object());
    }

    #[test]
    fn push_type_header_values() {
        assert_eq!(PushType::Alert.header_value(), "alert");
        assert_eq!(PushType::VoipLegacy.header_value(), "voip");
        assert_eq!(PushType::Mdm.header_value(), "mdm");
    }
}

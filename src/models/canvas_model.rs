//! models/canvas_model.rs
//! Estructura de un canvas de Braze (`/canvas/details`) y extracción de los
//! textos personalizables de cada paso.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanvasDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<CanvasStep>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanvasStep {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub step_type: Option<String>,
    /// message_variation_id -> mensaje. BTreeMap para recorrerlos en orden estable.
    #[serde(default)]
    pub messages: BTreeMap<String, CanvasMessage>,
}

/// Mensaje de un paso, según el canal que declara Braze.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanvasMessage {
    Email {
        subject: Option<String>,
        body: Option<String>,
    },
    Push {
        channel: String,
        title: Option<String>,
        alert: Option<String>,
    },
    Sms {
        body: Option<String>,
    },
    InApp {
        channel: String,
        message: Option<String>,
        title: Option<String>,
    },
    /// Canal desconocido (o ausente): se conservan los pares crudos.
    Unknown {
        channel: Option<String>,
        fields: Map<String, Value>,
    },
}

/// Campo de un mensaje que se puede personalizar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageField {
    Alert,
    Title,
    Body,
    Subject,
    Message,
}

impl MessageField {
    pub const ALL: [MessageField; 5] = [
        MessageField::Alert,
        MessageField::Title,
        MessageField::Body,
        MessageField::Subject,
        MessageField::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageField::Alert => "alert",
            MessageField::Title => "title",
            MessageField::Body => "body",
            MessageField::Subject => "subject",
            MessageField::Message => "message",
        }
    }
}

impl fmt::Display for MessageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Un texto concreto de un paso: (canal, campo, contenido).
#[derive(Debug, Clone, PartialEq)]
pub struct StepMessage {
    pub channel: String,
    pub field: MessageField,
    pub content: String,
    /// Asunto del email al que pertenece el cuerpo, como contexto para el LLM.
    pub subject: Option<String>,
}

fn take_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl CanvasMessage {
    pub fn from_raw(fields: Map<String, Value>) -> Self {
        let channel = take_str(&fields, "channel");
        match channel.as_deref() {
            Some("email") => CanvasMessage::Email {
                subject: take_str(&fields, "subject"),
                body: take_str(&fields, "body"),
            },
            Some(ch @ ("android_push" | "ios_push" | "apple_push" | "web_push" | "kindle_push" | "push")) => {
                CanvasMessage::Push {
                    channel: ch.to_string(),
                    title: take_str(&fields, "title"),
                    alert: take_str(&fields, "alert"),
                }
            }
            Some("sms") => CanvasMessage::Sms {
                body: take_str(&fields, "body"),
            },
            Some(ch @ ("in_app_message" | "trigger_in_app_message")) => CanvasMessage::InApp {
                channel: ch.to_string(),
                message: take_str(&fields, "message"),
                title: take_str(&fields, "title"),
            },
            _ => CanvasMessage::Unknown {
                channel: channel.clone(),
                fields,
            },
        }
    }

    /// Textos no vacíos de este mensaje, en orden alert, title, body, subject, message.
    pub fn texts(&self) -> Vec<StepMessage> {
        let mut out = Vec::new();
        let mut push = |channel: &str, field: MessageField, value: &Option<String>, subject: Option<&String>| {
            if let Some(text) = value.as_ref().filter(|t| !t.trim().is_empty()) {
                out.push(StepMessage {
                    channel: channel.to_string(),
                    field,
                    content: text.clone(),
                    subject: subject.cloned(),
                });
            }
        };

        match self {
            CanvasMessage::Email { subject, body } => {
                push("email", MessageField::Body, body, subject.as_ref());
                push("email", MessageField::Subject, subject, None);
            }
            CanvasMessage::Push { channel, title, alert } => {
                push(channel.as_str(), MessageField::Alert, alert, None);
                push(channel.as_str(), MessageField::Title, title, None);
            }
            CanvasMessage::Sms { body } => push("sms", MessageField::Body, body, None),
            CanvasMessage::InApp { channel, message, title } => {
                push(channel.as_str(), MessageField::Title, title, None);
                push(channel.as_str(), MessageField::Message, message, None);
            }
            CanvasMessage::Unknown { channel: Some(channel), fields } => {
                for field in MessageField::ALL {
                    push(channel.as_str(), field, &take_str(fields, field.as_str()), None);
                }
            }
            // Sin canal no sabemos a dónde desplegarlo
            CanvasMessage::Unknown { channel: None, .. } => {}
        }
        out
    }
}

impl<'de> Deserialize<'de> for CanvasMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Ok(CanvasMessage::from_raw(fields))
    }
}

impl CanvasStep {
    /// Todos los textos personalizables del paso.
    pub fn extract_messages(&self) -> Vec<StepMessage> {
        self.messages.values().flat_map(CanvasMessage::texts).collect()
    }
}

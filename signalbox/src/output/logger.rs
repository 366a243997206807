use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use log::{info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageKind {
    Software,
    PlayerWarning,
    Simulation,
}

impl From<MessageKind> for u8 {
    fn from(k: MessageKind) -> u8 {
        match k {
            MessageKind::Software => 0,
            MessageKind::PlayerWarning => 1,
            MessageKind::Simulation => 2,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = String;
    fn try_from(x: u8) -> Result<MessageKind, String> {
        match x {
            0 => Ok(MessageKind::Software),
            1 => Ok(MessageKind::PlayerWarning),
            2 => Ok(MessageKind::Simulation),
            x => Err(format!("unknown message type {}", x)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub msg_type: MessageKind,
    pub msg_text: String,
}

/// The simulation's message log. It is saved with the simulation, and every
/// message is also forwarded to the `log` facade.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageLogger {
    pub messages: Vec<Message>,
}

impl MessageLogger {
    pub fn new(messages: Vec<Message>) -> Self {
        MessageLogger { messages }
    }

    pub fn add_message<S: Into<String>>(&mut self, text: S, kind: MessageKind) {
        let text = text.into();
        match kind {
            MessageKind::PlayerWarning => warn!("{}", text),
            _ => info!("{}", text),
        }
        self.messages.push(Message { msg_type: kind, msg_text: text });
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.msg_type == MessageKind::PlayerWarning)
    }
}

#[test]
fn test_message_kind_codes() {
    let m: Message = serde_json::from_str(r#"{"msgType": 1, "msgText": "Conflicting route"}"#).unwrap();
    assert_eq!(m.msg_type, MessageKind::PlayerWarning);
    assert_eq!(serde_json::to_value(&m).unwrap()["msgType"], 1);
    assert!(serde_json::from_str::<Message>(r#"{"msgType": 7, "msgText": ""}"#).is_err());
}

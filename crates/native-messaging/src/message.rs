use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("message is not a JSON envelope")]
    Envelope(#[source] serde_json::Error),
    #[error("invalid payload for message type {kind}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Page details reported by the extension for a visited domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMetadataPayload {
    pub domain: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Message received from the browser extension.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping(Value),
    LogUrl(String),
    LogWebMetadata(WebMetadataPayload),
    GetWebBlocklist,
    AddToWebBlocklist(String),
    Unknown(String),
}

impl Request {
    pub fn parse(frame: &[u8]) -> Result<Self, MessageError> {
        let Envelope { kind, payload } =
            serde_json::from_slice(frame).map_err(MessageError::Envelope)?;

        let request = match kind.as_str() {
            "ping" => Request::Ping(payload),
            "log_url" => Request::LogUrl(payload_as(&kind, payload)?),
            "log_web_metadata" => Request::LogWebMetadata(payload_as(&kind, payload)?),
            "get_web_blocklist" => Request::GetWebBlocklist,
            "add_to_web_blocklist" => Request::AddToWebBlocklist(payload_as(&kind, payload)?),
            _ => Request::Unknown(kind),
        };
        Ok(request)
    }
}

fn payload_as<T: for<'de> Deserialize<'de>>(kind: &str, payload: Value) -> Result<T, MessageError> {
    serde_json::from_value(payload).map_err(|source| MessageError::Payload {
        kind: kind.to_string(),
        source,
    })
}

/// Message sent to the browser extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Response {
    Echo(Value),
    WebBlocklist(Vec<String>),
}

impl Response {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

//! Messages exchanged with the media bridge over the data channel.
//!
//! Each message is a JSON object whose `colibriClass` field names its kind.
//! Kinds this crate does not know are kept as [`BridgeMessage::Unknown`] so
//! they can still reach the application.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

const CLASS_FIELD: &str = "colibriClass";

const KNOWN_CLASSES: [&str; 7] = [
    "DominantSpeakerEndpointChangeEvent",
    "LastNEndpointsChangeEvent",
    "LastNChangedEvent",
    "SelectedEndpointChangedEvent",
    "PinnedEndpointChangedEvent",
    "EndpointConnectivityStatusChangeEvent",
    "EndpointMessage",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "colibriClass")]
pub enum BridgeMessage {
    #[serde(rename = "DominantSpeakerEndpointChangeEvent")]
    DominantSpeakerChanged {
        #[serde(rename = "dominantSpeakerEndpoint")]
        endpoint: String,
    },

    #[serde(rename = "LastNEndpointsChangeEvent", rename_all = "camelCase")]
    LastNEndpointsChanged {
        #[serde(default)]
        last_n_endpoints: Vec<String>,
        #[serde(default)]
        endpoints_entering_last_n: Vec<String>,
        #[serde(default)]
        conference_endpoints: Vec<String>,
    },

    /// Inbound when the bridge changes the limit, outbound to request one.
    /// `-1` means unlimited.
    #[serde(rename = "LastNChangedEvent", rename_all = "camelCase")]
    LastNChanged { last_n: i32 },

    #[serde(rename = "SelectedEndpointChangedEvent", rename_all = "camelCase")]
    SelectedEndpointChanged { selected_endpoint: Option<String> },

    #[serde(rename = "PinnedEndpointChangedEvent", rename_all = "camelCase")]
    PinnedEndpointChanged { pinned_endpoint: Option<String> },

    #[serde(rename = "EndpointConnectivityStatusChangeEvent")]
    EndpointConnectivityChanged {
        endpoint: String,
        #[serde(deserialize_with = "bool_or_string")]
        active: bool,
    },

    /// Application payload relayed between endpoints untouched.
    #[serde(rename = "EndpointMessage", rename_all = "camelCase")]
    EndpointMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default)]
        to: String,
        msg_payload: Value,
    },

    #[serde(skip)]
    Unknown { class: String, payload: Value },
}

impl BridgeMessage {
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(text)?;
        let class = value
            .get(CLASS_FIELD)
            .and_then(Value::as_str)
            .ok_or(BridgeError::MissingClass)?
            .to_string();
        if !KNOWN_CLASSES.contains(&class.as_str()) {
            return Ok(Self::Unknown { class, payload: value });
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        match self {
            Self::Unknown { payload, .. } => Ok(serde_json::to_string(payload)?),
            other => Ok(serde_json::to_string(other)?),
        }
    }

    /// The `colibriClass` value of this message.
    pub fn class(&self) -> &str {
        match self {
            Self::DominantSpeakerChanged { .. } => "DominantSpeakerEndpointChangeEvent",
            Self::LastNEndpointsChanged { .. } => "LastNEndpointsChangeEvent",
            Self::LastNChanged { .. } => "LastNChangedEvent",
            Self::SelectedEndpointChanged { .. } => "SelectedEndpointChangedEvent",
            Self::PinnedEndpointChanged { .. } => "PinnedEndpointChangedEvent",
            Self::EndpointConnectivityChanged { .. } => "EndpointConnectivityStatusChangeEvent",
            Self::EndpointMessage { .. } => "EndpointMessage",
            Self::Unknown { class, .. } => class,
        }
    }
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::invalid_value(de::Unexpected::Str(other), &"a boolean")),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {other}"))),
    }
}

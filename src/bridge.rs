//! Outbound requests to the media bridge over the data channel.

use log::debug;
use rtccore::bridge::BridgeMessage;

use crate::error::{SessionError, TransportError};
use crate::session::Session;

impl Session {
    async fn send_bridge_message(&mut self, message: BridgeMessage) -> Result<(), SessionError> {
        if !self.data_channel_open {
            return Err(TransportError::DataChannelClosed.into());
        }
        let json = message.to_json()?;
        debug!(target: "Session/Bridge", "[{}] -> {}", self.id, message.class());
        self.transport.send_data(json).await?;
        Ok(())
    }

    pub(crate) async fn select_participant(&mut self, endpoint: Option<String>) -> Result<(), SessionError> {
        self.send_bridge_message(BridgeMessage::SelectedEndpointChanged {
            selected_endpoint: endpoint,
        })
        .await
    }

    pub(crate) async fn pin_participant(&mut self, endpoint: Option<String>) -> Result<(), SessionError> {
        self.send_bridge_message(BridgeMessage::PinnedEndpointChanged {
            pinned_endpoint: endpoint,
        })
        .await
    }

    pub(crate) async fn set_last_n(&mut self, last_n: i32) -> Result<(), SessionError> {
        self.send_bridge_message(BridgeMessage::LastNChanged { last_n }).await
    }
}

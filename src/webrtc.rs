//! [`MediaTransport`] over a webrtc-rs peer connection.
//!
//! webrtc-rs negotiates in Unified-Plan, so clients using this transport
//! need an [`InteropAdapter`](crate::interop::InteropAdapter).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use rtccore::types::{Description, IceCandidate, SdpType};
use tokio::sync::{Mutex, mpsc};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::transport::{
    IceConnectionState, LocalStream, MediaEvent, MediaKind, MediaTransport, MediaTransportFactory, NegotiationModel,
    OfferConstraints, RemoteStream, SignalingState,
};

fn op_err(operation: &'static str) -> impl FnOnce(webrtc::Error) -> TransportError {
    move |e| TransportError::operation(operation, e)
}

struct LocalTrack {
    kind: MediaKind,
    track: Arc<dyn TrackLocal + Send + Sync>,
    sender: Arc<RTCRtpSender>,
}

pub struct WebrtcTransport {
    pc: Arc<RTCPeerConnection>,
    local: Mutex<HashMap<String, Vec<LocalTrack>>>,
    muted_remote: Mutex<HashSet<(String, MediaKind)>>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
}

impl WebrtcTransport {
    pub async fn new(
        ice_servers: Vec<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MediaEvent>), TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(op_err("register codecs"))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(op_err("register interceptors"))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let mut config = RTCConfiguration::default();
        if !ice_servers.is_empty() {
            config.ice_servers = vec![RTCIceServer {
                urls: ice_servers,
                ..Default::default()
            }];
        }
        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(op_err("create peer connection"))?,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let data_channel = Arc::new(Mutex::new(None));
        install_handlers(&pc, tx, data_channel.clone());

        Ok((
            Self {
                pc,
                local: Mutex::new(HashMap::new()),
                muted_remote: Mutex::new(HashSet::new()),
                data_channel,
            },
            rx,
        ))
    }

    fn to_rtc(description: Description) -> Result<RTCSessionDescription, TransportError> {
        match description.kind {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        }
        .map_err(op_err("parse description"))
    }
}

fn install_handlers(
    pc: &Arc<RTCPeerConnection>,
    tx: mpsc::UnboundedSender<MediaEvent>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
) {
    let events = tx.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let events = events.clone();
        Box::pin(async move {
            let candidate = match candidate.map(|c| c.to_json()).transpose() {
                Ok(init) => init.map(|init| IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }),
                Err(e) => {
                    warn!("Dropping local candidate: {e}");
                    return;
                }
            };
            let _ = events.send(MediaEvent::IceCandidate(candidate));
        })
    }));

    let events = tx.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        let events = events.clone();
        Box::pin(async move {
            let state = match state {
                RTCIceConnectionState::Checking => IceConnectionState::Checking,
                RTCIceConnectionState::Connected => IceConnectionState::Connected,
                RTCIceConnectionState::Completed => IceConnectionState::Completed,
                RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
                RTCIceConnectionState::Failed => IceConnectionState::Failed,
                RTCIceConnectionState::Closed => IceConnectionState::Closed,
                _ => IceConnectionState::New,
            };
            let _ = events.send(MediaEvent::IceConnectionState(state));
        })
    }));

    let events = tx.clone();
    pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
        let events = events.clone();
        Box::pin(async move {
            let state = match state {
                RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
                RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
                RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
                RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
                RTCSignalingState::Closed => SignalingState::Closed,
                _ => SignalingState::Stable,
            };
            let _ = events.send(MediaEvent::SignalingState(state));
        })
    }));

    let events = tx.clone();
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
            let events = events.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => Some(MediaKind::Audio),
                    RTPCodecType::Video => Some(MediaKind::Video),
                    _ => None,
                };
                let stream = RemoteStream {
                    id: track.stream_id(),
                    ssrc: Some(track.ssrc()),
                    kind,
                };
                debug!("Remote track {} ssrc {}", stream.id, track.ssrc());
                let _ = events.send(MediaEvent::RemoteStreamAdded(stream));
            })
        },
    ));

    pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
        let events = tx.clone();
        let slot = data_channel.clone();
        Box::pin(async move {
            info!("Bridge data channel '{}' announced", channel.label());
            *slot.lock().await = Some(channel.clone());

            let on_open = events.clone();
            channel.on_open(Box::new(move || {
                let _ = on_open.send(MediaEvent::DataChannelOpened);
                Box::pin(async {})
            }));
            let on_message = events.clone();
            channel.on_message(Box::new(move |msg: DataChannelMessage| {
                let on_message = on_message.clone();
                Box::pin(async move {
                    match String::from_utf8(msg.data.to_vec()) {
                        Ok(text) => {
                            let _ = on_message.send(MediaEvent::DataChannelMessage(text));
                        }
                        Err(e) => warn!("Non-text bridge message: {e}"),
                    }
                })
            }));
            let on_close = events.clone();
            channel.on_close(Box::new(move || {
                let _ = on_close.send(MediaEvent::DataChannelClosed);
                Box::pin(async {})
            }));
        })
    }));
}

#[async_trait]
impl MediaTransport for WebrtcTransport {
    fn negotiation_model(&self) -> NegotiationModel {
        NegotiationModel::UnifiedPlan
    }

    async fn create_offer(&self, _constraints: OfferConstraints) -> Result<Description, TransportError> {
        let offer = self.pc.create_offer(None).await.map_err(op_err("create offer"))?;
        Ok(Description::offer(offer.sdp))
    }

    async fn create_answer(&self, _constraints: OfferConstraints) -> Result<Description, TransportError> {
        let answer = self.pc.create_answer(None).await.map_err(op_err("create answer"))?;
        Ok(Description::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: Description) -> Result<(), TransportError> {
        let description = Self::to_rtc(description)?;
        self.pc
            .set_local_description(description)
            .await
            .map_err(op_err("set local description"))
    }

    async fn set_remote_description(&self, description: Description) -> Result<(), TransportError> {
        let description = Self::to_rtc(description)?;
        self.pc
            .set_remote_description(description)
            .await
            .map_err(op_err("set remote description"))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .map_err(op_err("add ice candidate"))
    }

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), TransportError> {
        let mut tracks = Vec::new();
        for (kind, enabled, mime) in [
            (MediaKind::Audio, stream.audio, MIME_TYPE_OPUS),
            (MediaKind::Video, stream.video, MIME_TYPE_VP8),
        ] {
            if !enabled {
                continue;
            }
            let track: Arc<dyn TrackLocal + Send + Sync> = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime.to_owned(),
                    ..Default::default()
                },
                format!("{}-{}", stream.id, kind.as_str()),
                stream.id.clone(),
            ));
            let sender = self.pc.add_track(track.clone()).await.map_err(op_err("add track"))?;
            tracks.push(LocalTrack { kind, track, sender });
        }
        self.local.lock().await.insert(stream.id.clone(), tracks);
        Ok(())
    }

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), TransportError> {
        let tracks = self
            .local
            .lock()
            .await
            .remove(&stream.id)
            .ok_or_else(|| TransportError::UnknownStream(stream.id.clone()))?;
        for track in tracks {
            self.pc
                .remove_track(&track.sender)
                .await
                .map_err(op_err("remove track"))?;
        }
        Ok(())
    }

    /// Local tracks are detached from or reattached to their sender. Remote
    /// tracks are only marked, the application drops their samples.
    async fn set_track_enabled(&self, stream_id: &str, kind: MediaKind, enabled: bool) -> Result<(), TransportError> {
        let local = self.local.lock().await;
        if let Some(tracks) = local.get(stream_id) {
            for track in tracks.iter().filter(|t| t.kind == kind) {
                let replacement = enabled.then(|| track.track.clone());
                track
                    .sender
                    .replace_track(replacement)
                    .await
                    .map_err(op_err("replace track"))?;
            }
            return Ok(());
        }
        drop(local);

        let mut muted = self.muted_remote.lock().await;
        if enabled {
            muted.remove(&(stream_id.to_string(), kind));
        } else {
            muted.insert((stream_id.to_string(), kind));
        }
        Ok(())
    }

    async fn send_data(&self, text: String) -> Result<(), TransportError> {
        let channel = self
            .data_channel
            .lock()
            .await
            .clone()
            .ok_or(TransportError::DataChannelClosed)?;
        channel.send_text(text).await.map_err(op_err("send data"))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await.map_err(op_err("close"))
    }
}

/// Creates one [`WebrtcTransport`] per session.
#[derive(Debug, Clone, Default)]
pub struct WebrtcTransportFactory {
    pub ice_servers: Vec<String>,
}

#[async_trait]
impl MediaTransportFactory for WebrtcTransportFactory {
    async fn create_transport(
        &self,
        _config: &SessionConfig,
    ) -> Result<(Arc<dyn MediaTransport>, mpsc::UnboundedReceiver<MediaEvent>), TransportError> {
        let (transport, events) = WebrtcTransport::new(self.ice_servers.clone()).await?;
        Ok((Arc::new(transport), events))
    }
}

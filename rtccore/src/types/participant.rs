use rtccore_xml::Jid;
use serde::Serialize;

/// A remote room occupant.
///
/// `stream_id` only names the remote stream; the stream itself belongs to
/// the media transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub jid: Jid,
    pub nick: Option<String>,
    pub status: Option<String>,
    pub real_jid: Option<Jid>,
    pub role: Option<String>,
    pub audio_muted: bool,
    pub video_muted: bool,
    pub stream_id: Option<String>,
}

/// Presence-derived fields of a participant. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantUpdate {
    pub nick: Option<String>,
    pub status: Option<String>,
    pub real_jid: Option<Jid>,
    pub role: Option<String>,
    pub audio_muted: Option<bool>,
    pub video_muted: Option<bool>,
}

impl Participant {
    pub fn new(jid: Jid) -> Self {
        Self {
            jid,
            nick: None,
            status: None,
            real_jid: None,
            role: None,
            audio_muted: false,
            video_muted: false,
            stream_id: None,
        }
    }

    /// Occupant nickname: the explicit nick, else the resource of the jid.
    pub fn display_name(&self) -> &str {
        self.nick
            .as_deref()
            .or(self.jid.resource())
            .unwrap_or(&self.jid.server)
    }

    /// Apply an update. Returns whether anything changed.
    pub fn apply(&mut self, update: &ParticipantUpdate) -> bool {
        let before = self.clone();
        if let Some(nick) = &update.nick {
            self.nick = Some(nick.clone());
        }
        if let Some(status) = &update.status {
            self.status = Some(status.clone());
        }
        if let Some(real_jid) = &update.real_jid {
            self.real_jid = Some(real_jid.clone());
        }
        if let Some(role) = &update.role {
            self.role = Some(role.clone());
        }
        if let Some(muted) = update.audio_muted {
            self.audio_muted = muted;
        }
        if let Some(muted) = update.video_muted {
            self.video_muted = muted;
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_update() {
        let mut p = Participant::new("room@conference.example.com/bob".parse().unwrap());
        assert_eq!(p.display_name(), "bob");
        let update = ParticipantUpdate {
            nick: Some("Bob".to_string()),
            audio_muted: Some(true),
            ..Default::default()
        };
        assert!(p.apply(&update));
        assert!(!p.apply(&update));
        assert_eq!(p.display_name(), "Bob");
        assert!(p.audio_muted);
        assert!(!p.video_muted);
    }
}

use std::fmt;
use std::str::FromStr;

#[derive(Debug)]
pub enum JidError {
    InvalidFormat(String),
    EmptyDomain,
}

impl fmt::Display for JidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JidError::InvalidFormat(s) => write!(f, "Invalid JID format: {s}"),
            JidError::EmptyDomain => write!(f, "JID has an empty domain part"),
        }
    }
}

impl std::error::Error for JidError {}

/// An XMPP address: `[user@]server[/resource]`.
///
/// In a MUC room the occupant address is `room@conference.domain/nick`, so the
/// resource doubles as the occupant nickname and, for bridged calls, as the
/// endpoint id the bridge uses.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Jid {
    pub user: String,
    pub server: String,
    pub resource: Option<String>,
}

impl Jid {
    pub fn new(user: &str, server: &str) -> Self {
        Self {
            user: user.to_string(),
            server: server.to_string(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// The same address without its resource part.
    pub fn to_bare(&self) -> Self {
        Self {
            user: self.user.clone(),
            server: self.server.clone(),
            resource: None,
        }
    }

    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }

    pub fn is_same_bare_as(&self, other: &Jid) -> bool {
        self.user == other.user && self.server == other.server
    }
}

impl FromStr for Jid {
    type Err = JidError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The resource may itself contain '@' or '/', so split it off first.
        let (bare, resource) = match s.split_once('/') {
            Some((b, r)) => (b, Some(r)),
            None => (s, None),
        };
        let (user, server) = match bare.split_once('@') {
            Some((u, d)) => (u, d),
            None => ("", bare),
        };

        if server.is_empty() {
            return Err(JidError::EmptyDomain);
        }
        if server.contains('@') || resource.is_some_and(str::is_empty) {
            return Err(JidError::InvalidFormat(s.to_string()));
        }

        Ok(Jid {
            user: user.to_string(),
            server: server.to_string(),
            resource: resource.map(str::to_string),
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        write!(f, "{}", self.server)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{}", resource)?;
        }
        Ok(())
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Jid::from_str(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_occupant_jid() {
        let jid: Jid = "room1@conference.example.com/alice".parse().unwrap();
        assert_eq!(jid.user, "room1");
        assert_eq!(jid.server, "conference.example.com");
        assert_eq!(jid.resource(), Some("alice"));
        assert_eq!(jid.to_string(), "room1@conference.example.com/alice");
    }

    #[test]
    fn test_resource_may_contain_separators() {
        let jid: Jid = "room1@conference.example.com/bob@home/desk".parse().unwrap();
        assert_eq!(jid.resource(), Some("bob@home/desk"));
    }

    #[test]
    fn test_domain_only_jid() {
        let jid: Jid = "focus.example.com".parse().unwrap();
        assert!(jid.user.is_empty());
        assert!(jid.is_bare());
        assert_eq!(jid.to_string(), "focus.example.com");
    }

    #[test]
    fn test_bare_conversion() {
        let jid: Jid = "room1@conference.example.com/alice".parse().unwrap();
        let bare = jid.to_bare();
        assert!(bare.is_bare());
        assert!(bare.is_same_bare_as(&jid));
        assert_eq!(bare.to_string(), "room1@conference.example.com");
    }

    #[test]
    fn test_invalid_jids() {
        assert!("".parse::<Jid>().is_err());
        assert!("user@".parse::<Jid>().is_err());
        assert!("user@example.com/".parse::<Jid>().is_err());
    }
}

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Result, XmlError};
use crate::jid::Jid;
use crate::node::{Attrs, Node};

/// Reads typed attributes off a node, collecting every failure so a caller can
/// inspect a whole element and report all problems at once through `finish`.
pub struct AttrParser<'a> {
    pub attrs: &'a Attrs,
    pub errors: Vec<XmlError>,
}

impl<'a> AttrParser<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self {
            attrs: &node.attrs,
            errors: Vec::new(),
        }
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&self) -> Result<()> {
        if self.ok() {
            Ok(())
        } else {
            Err(XmlError::AttrList(self.errors.clone()))
        }
    }

    fn get_raw(&mut self, key: &str, require: bool) -> Option<&'a str> {
        let val = self.attrs.get(key);
        if require && val.is_none() {
            self.errors.push(XmlError::AttrParse(format!(
                "Required attribute '{key}' not found"
            )));
        }
        val
    }

    fn get_parsed<T>(&mut self, key: &str, require: bool) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.get_raw(key, require)?;
        match raw.parse::<T>() {
            Ok(val) => Some(val),
            Err(e) => {
                self.errors.push(XmlError::AttrParse(format!(
                    "Failed to parse {} from '{raw}' for key '{key}': {e}",
                    std::any::type_name::<T>()
                )));
                None
            }
        }
    }

    // --- String ---
    pub fn optional_string(&mut self, key: &str) -> Option<&'a str> {
        self.get_raw(key, false)
    }

    /// Get a required string attribute, returning an error if missing.
    pub fn required_string(&mut self, key: &str) -> Result<&'a str> {
        self.optional_string(key)
            .ok_or_else(|| XmlError::MissingAttr(key.to_string()))
    }

    /// Get string, recording an error and defaulting to empty when missing.
    pub fn string(&mut self, key: &str) -> String {
        self.get_raw(key, true).map(str::to_string).unwrap_or_default()
    }

    // --- JID ---
    pub fn optional_jid(&mut self, key: &str) -> Option<Jid> {
        let raw = self.get_raw(key, false)?;
        match Jid::from_str(raw) {
            Ok(jid) => Some(jid),
            Err(e) => {
                self.errors.push(XmlError::from(e));
                None
            }
        }
    }

    pub fn jid(&mut self, key: &str) -> Jid {
        self.get_raw(key, true);
        self.optional_jid(key).unwrap_or_default()
    }

    // --- Boolean ---
    // XMPP uses both `true`/`false` and `1`/`0` for xs:boolean.
    fn get_bool(&mut self, key: &str, require: bool) -> Option<bool> {
        let raw = self.get_raw(key, require)?;
        match raw {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            other => {
                self.errors.push(XmlError::AttrParse(format!(
                    "Failed to parse bool from '{other}' for key '{key}'"
                )));
                None
            }
        }
    }

    pub fn optional_bool(&mut self, key: &str) -> bool {
        self.get_bool(key, false).unwrap_or(false)
    }

    pub fn bool(&mut self, key: &str) -> bool {
        self.get_bool(key, true).unwrap_or(false)
    }

    // --- Numbers ---
    pub fn optional_u8(&mut self, key: &str) -> Option<u8> {
        self.get_parsed(key, false)
    }

    pub fn optional_u16(&mut self, key: &str) -> Option<u16> {
        self.get_parsed(key, false)
    }

    pub fn optional_u32(&mut self, key: &str) -> Option<u32> {
        self.get_parsed(key, false)
    }

    pub fn u32(&mut self, key: &str) -> u32 {
        self.get_parsed(key, true).unwrap_or_default()
    }

    pub fn optional_u64(&mut self, key: &str) -> Option<u64> {
        self.get_parsed(key, false)
    }
}

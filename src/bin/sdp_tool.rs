//! Inspect SDP and Jingle payloads offline.
//!
//! Usage:
//!   sdp-tool to-jingle offer.sdp --creator responder
//!   sdp-tool from-jingle accept.xml
//!   sdp-tool diff before.sdp after.sdp

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use mucrtc::rtccore::SourceDiff;
use mucrtc::rtccore::SourceOwners;
use mucrtc::rtccore::jingle::{Creator, JingleAction, JingleBuilder};
use mucrtc::rtccore::sdp::SessionDescription;
use mucrtc::rtccore::xml::{Node, marshal, unmarshal};

#[derive(Parser)]
#[command(name = "sdp-tool", about = "Convert and compare SDP and Jingle payloads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an SDP file as a <jingle> element.
    ToJingle {
        sdp: PathBuf,
        #[arg(long, value_enum, default_value_t = Role::Initiator)]
        creator: Role,
        #[arg(long, default_value = "sdp-tool")]
        sid: String,
    },
    /// Rebuild SDP from a <jingle> element, or an <iq> wrapping one.
    FromJingle { xml: PathBuf },
    /// Show sources added and removed between two SDP files.
    Diff { old: PathBuf, new: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Initiator,
    Responder,
}

impl From<Role> for Creator {
    fn from(role: Role) -> Self {
        match role {
            Role::Initiator => Creator::Initiator,
            Role::Responder => Creator::Responder,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                timestamp(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::ToJingle { sdp, creator, sid } => {
            let sdp = read_sdp(&sdp)?;
            let action = match creator {
                Role::Initiator => JingleAction::SessionInitiate,
                Role::Responder => JingleAction::SessionAccept,
            };
            let jingle = JingleBuilder::new(action, sid)
                .contents(sdp.to_jingle(creator.into(), &SourceOwners::default()))
                .build();
            println!("{}", marshal(&jingle)?);
        }
        Command::FromJingle { xml } => {
            let text = read(&xml)?;
            let node = unmarshal(&text).with_context(|| format!("parsing {}", xml.display()))?;
            let jingle = find_jingle(&node).context("no <jingle> element found")?;
            let sdp = SessionDescription::from_jingle(jingle)?;
            debug!("{} media section(s)", sdp.media.len());
            print!("{sdp}");
        }
        Command::Diff { old, new } => {
            let diff = SourceDiff::between(&read_sdp(&old)?, &read_sdp(&new)?);
            if diff.is_empty() {
                info!("No source changes");
                return Ok(());
            }
            println!("added:   {:?}", diff.added_ssrcs());
            println!("removed: {:?}", diff.removed_ssrcs());
            if !diff.added.is_empty() {
                let add = JingleBuilder::new(JingleAction::SourceAdd, "sdp-tool")
                    .contents(diff.additions_to_jingle())
                    .build();
                println!("{}", marshal(&add)?);
            }
            if !diff.removed.is_empty() {
                let remove = JingleBuilder::new(JingleAction::SourceRemove, "sdp-tool")
                    .contents(diff.removals_to_jingle())
                    .build();
                println!("{}", marshal(&remove)?);
            }
        }
    }
    Ok(())
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_sdp(path: &Path) -> Result<SessionDescription> {
    let text = read(path)?;
    SessionDescription::parse(&text).with_context(|| format!("parsing {}", path.display()))
}

fn find_jingle(node: &Node) -> Option<&Node> {
    if node.tag == "jingle" {
        return Some(node);
    }
    node.get_optional_child("jingle")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_wall_clock_time() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 8);
        assert!(stamp.split(':').all(|part| part.len() == 2 && part.parse::<u8>().is_ok()));
    }

    #[test]
    fn test_find_jingle_inside_iq() {
        let iq = unmarshal(r#"<iq type="set"><jingle xmlns="urn:xmpp:jingle:1" action="source-add" sid="s1"/></iq>"#)
            .unwrap();
        assert_eq!(find_jingle(&iq).and_then(|j| j.attr("sid")), Some("s1"));
        let bare = unmarshal(r#"<message/>"#).unwrap();
        assert!(find_jingle(&bare).is_none());
    }
}

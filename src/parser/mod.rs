//! Parsing of BattlEye plain-text command replies.
//!
//! The server answers `players`, `admins` and `bans` with fixed-width text
//! tables; everything else is free text. [`parse`] picks the right parser
//! from the command name and returns a typed [`Reply`].

pub mod admins;
pub mod bans;
pub mod message;
pub mod players;

pub use admins::Admin;
pub use bans::{BanGuid, BanIp, Bans};
pub use message::Messages;
pub use players::Player;

use std::net::Ipv4Addr;

use serde::Serialize;

/// Placeholder for a GUID that failed validation.
pub const INVALID_GUID: &str = "00000000000000000000000000000000";

/// A BattlEye GUID is 32 hex characters.
pub(crate) const GUID_LEN: usize = 32;

/// A typed command reply.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Players(Vec<Player>),
    Admins(Vec<Admin>),
    Bans(Bans),
    Messages(Messages),
}

/// Parse a reply body according to the command that produced it:
/// `players`, `admins` and `bans` get typed parsers, anything else is
/// split into lines.
pub fn parse(data: &[u8], command: &str) -> Reply {
    match command {
        "players" => Reply::Players(players::parse(data)),
        "admins" => Reply::Admins(admins::parse(data)),
        "bans" => Reply::Bans(bans::parse(data)),
        _ => Reply::Messages(message::parse(data)),
    }
}

/// Split an `ip:port` token; an address failing IPv4 validation becomes
/// `"invalid"`, a missing or unparsable port becomes 0.
pub(crate) fn parse_address(addr: &str) -> (String, u16) {
    let mut parts = addr.splitn(2, ':');
    let ip_raw = parts.next().unwrap_or_default().trim();

    let ip = if is_valid_ipv4(ip_raw) {
        ip_raw.to_string()
    } else {
        "invalid".to_string()
    };

    let port = parts
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(0);

    (ip, port)
}

pub(crate) fn is_valid_ipv4(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>().is_ok()
}

/// Ban duration column: `perm` is permanent (−1), `-` is expired (0),
/// anything unparsable falls back to 0.
pub(crate) fn parse_minutes(token: &str) -> i64 {
    match token {
        "perm" => -1,
        "-" => 0,
        other => other.parse().unwrap_or(0),
    }
}

/// Lowercase a GUID candidate for comparison.
pub(crate) fn normalize_guid(token: &str) -> String {
    token.to_ascii_lowercase()
}

/// Whether a normalized candidate looks like a BattlEye GUID.
pub(crate) fn is_valid_guid(guid: &str) -> bool {
    guid.len() == GUID_LEN && guid.bytes().all(|b| b.is_ascii_hexdigit())
}

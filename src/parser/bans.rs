//! Parser for the `bans` command reply.
//!
//! The reply carries two sections, each with its own 2-line header:
//!
//! ```text
//! GUID Bans:
//! [#] [GUID] [Minutes left] [Reason]
//! ----------------------------------------
//! 0   <32 hex>  perm  Cheating
//!
//! IP Bans:
//! [#] [IP Address] [Minutes left] [Reason]
//! ----------------------------------------
//! 3   1.2.3.4  120  Spam
//! ```

use serde::Serialize;

use super::{is_valid_ipv4, parse_minutes, GUID_LEN, INVALID_GUID};

/// GUID and IP bans as parsed from the `bans` reply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bans {
    pub guid_bans: Vec<BanGuid>,
    pub ip_bans: Vec<BanIp>,
}

/// A single GUID ban entry.
#[derive(Debug, Clone, Serialize)]
pub struct BanGuid {
    pub guid: String,
    pub reason: String,
    pub id: usize,
    pub minutes: i64,
    pub valid: bool,
}

/// A single IP ban entry.
#[derive(Debug, Clone, Serialize)]
pub struct BanIp {
    pub ip: String,
    pub reason: String,
    pub id: usize,
    pub minutes: i64,
    pub valid: bool,
}

const HEADER_LINES: usize = 2;
const GUID_MARKER: &str = "GUID Bans:";
const IP_MARKER: &str = "IP Bans:";

// id, who, minutes; the reason column is optional
const MIN_COLUMNS: usize = 3;

/// Parse both ban sections.
pub fn parse(data: &[u8]) -> Bans {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut bans = Bans::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

        if line.contains(GUID_MARKER) {
            let rest = lines.get(i + HEADER_LINES + 1..).unwrap_or_default();
            bans.guid_bans = parse_guid_section(rest);
            i += bans.guid_bans.len() + HEADER_LINES + 1;
            continue;
        }

        if line.contains(IP_MARKER) {
            let rest = lines.get(i + HEADER_LINES + 1..).unwrap_or_default();
            bans.ip_bans = parse_ip_section(rest, bans.guid_bans.len());
            break;
        }

        i += 1;
    }

    bans
}

/// GUID section: scan until the IP section marker.
fn parse_guid_section(lines: &[&str]) -> Vec<BanGuid> {
    let mut entries = Vec::new();

    for raw in lines {
        let line = raw.trim();

        if line.contains(IP_MARKER) {
            break;
        }

        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_COLUMNS {
            continue;
        }

        let id = parts[0].parse::<usize>().unwrap_or(entries.len());

        let mut valid = true;
        let guid = if parts[1].len() == GUID_LEN {
            parts[1].to_string()
        } else {
            valid = false;
            INVALID_GUID.to_string()
        };

        let minutes = parse_minutes(parts[2]);
        if minutes <= 0 && minutes != -1 {
            valid = false;
        }

        let reason = parts[MIN_COLUMNS..].join(" ");

        entries.push(BanGuid {
            id,
            guid,
            minutes,
            reason,
            valid,
        });
    }

    entries
}

/// IP section; `guid_count` keeps fallback ids contiguous across sections.
fn parse_ip_section(lines: &[&str], guid_count: usize) -> Vec<BanIp> {
    let mut entries = Vec::new();

    for raw in lines {
        let line = raw.trim();

        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_COLUMNS {
            continue;
        }

        let id = parts[0]
            .parse::<usize>()
            .unwrap_or(entries.len() + guid_count);

        let mut valid = true;
        let ip = if is_valid_ipv4(parts[1]) {
            parts[1].to_string()
        } else {
            valid = false;
            "invalid".to_string()
        };

        let minutes = parse_minutes(parts[2]);
        if minutes <= 0 && minutes != -1 {
            valid = false;
        }

        let reason = parts[MIN_COLUMNS..].join(" ");

        entries.push(BanIp {
            id,
            ip,
            minutes,
            reason,
            valid,
        });
    }

    entries
}

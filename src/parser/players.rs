//! Parser for the `players` command reply.
//!
//! Expected shape:
//!
//! ```text
//! Players on server:
//! [#] [IP Address]:[Port] [Ping] [GUID] [Name]
//! --------------------------------------------
//! 0   127.0.0.1:2304    32   <32 hex>(OK) Some Name
//! 1   10.0.0.5:63425    125  <32 hex>(OK) Other Name (Lobby)
//! (2 players in total)
//! ```

use serde::Serialize;

use super::{is_valid_guid, normalize_guid, parse_address, GUID_LEN, INVALID_GUID};

/// One entry of the player listing.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub ip: String,
    pub guid: String,
    pub name: String,
    pub port: u16,
    pub ping: u16,
    pub id: u8,
    pub valid: bool,
    pub lobby: bool,
}

const HEADER_LINES: usize = 2;
const START_MARKER: &str = "Players on server:";
const FOOTER_MARKER: &str = "players in total";
const GUID_OK: &str = "(OK)";
const LOBBY_SUFFIX: &str = "(Lobby)";

// id, ip:port, ping, guid, name
const MIN_COLUMNS: usize = 5;

/// Parse the player listing; garbage lines are skipped, the footer stops
/// the scan.
pub fn parse(data: &[u8]) -> Vec<Player> {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut players = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

        if is_footer(line) {
            break;
        }

        if line.is_empty() {
            i += 1;
            continue;
        }

        if line.contains(START_MARKER) {
            i += HEADER_LINES + 1;
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_COLUMNS {
            i += 1;
            continue;
        }

        // The id must be the first token, otherwise it's a garbage line.
        let Ok(id) = parts[0].parse::<u8>() else {
            i += 1;
            continue;
        };

        // GUID column position varies with embedded spaces in names; scan
        // for the first token that validates as a GUID.
        let mut guid = INVALID_GUID.to_string();
        let mut valid = false;
        let mut guid_idx = None;

        for (k, raw) in parts.iter().enumerate().skip(1) {
            let mut token = *raw;
            let mut ok = false;

            if let Some(stripped) = token.strip_suffix(GUID_OK) {
                ok = true;
                token = stripped;
            }

            if token.len() < GUID_LEN {
                continue;
            }
            let Some(prefix) = token.get(..GUID_LEN) else {
                continue;
            };

            let candidate = normalize_guid(prefix);
            if is_valid_guid(&candidate) && candidate != INVALID_GUID {
                guid = candidate;
                valid = ok;
                guid_idx = Some(k);
                break;
            }
        }

        let (ip, port) = parse_address(parts[1]);
        let ping = parts[2].parse::<u16>().unwrap_or(0);

        let mut name = match guid_idx {
            Some(k) if k + 1 < parts.len() => parts[k + 1..].join(" "),
            _ if parts.len() > MIN_COLUMNS - 1 => parts[MIN_COLUMNS - 1..].join(" "),
            _ => parts[parts.len() - 1].to_string(),
        };
        name = name.trim().to_string();

        let mut lobby = false;
        if let Some(stripped) = name.strip_suffix(LOBBY_SUFFIX) {
            lobby = true;
            name = stripped.trim().to_string();
        }

        players.push(Player {
            id,
            ip,
            port,
            ping,
            guid,
            valid,
            name,
            lobby,
        });

        i += 1;
    }

    players
}

/// `(N players in total)` with at least one digit after the parenthesis.
fn is_footer(line: &str) -> bool {
    let line = line.trim();

    if line.len() < 3 || !line.starts_with('(') || !line.ends_with(')') {
        return false;
    }

    if !line.contains(FOOTER_MARKER) {
        return false;
    }

    let bytes = line.as_bytes();
    let mut j = 1;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }

    j > 1 && j < bytes.len() && bytes[j] == b' '
}

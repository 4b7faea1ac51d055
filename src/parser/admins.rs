//! Parser for the `admins` command reply.

use serde::Serialize;

use super::parse_address;

/// One connected RCON admin.
#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: u8,
    pub ip: String,
    pub port: u16,
}

const HEADER_LINES: usize = 2;
const START_MARKER: &str = "Connected RCon admins:";

// id, ip:port
const MIN_COLUMNS: usize = 2;

/// Parse the admin listing.
pub fn parse(data: &[u8]) -> Vec<Admin> {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut admins = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

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

        let id = parts[0].parse::<u8>().unwrap_or(admins.len() as u8);
        let (ip, port) = parse_address(parts[1]);

        admins.push(Admin { id, ip, port });
        i += 1;
    }

    admins
}

//! Fallback parser for replies with no dedicated structure.

use serde::Serialize;

/// Free-text reply split into lines. An empty body becomes a single `OK`.
#[derive(Debug, Clone, Serialize)]
pub struct Messages {
    pub msg: Vec<String>,
}

pub fn parse(data: &[u8]) -> Messages {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    if lines.len() < 2 && lines[0].is_empty() {
        Messages {
            msg: vec!["OK".to_string()],
        }
    } else {
        Messages { msg: lines }
    }
}

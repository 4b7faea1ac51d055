//! Output formatting for command replies.
//!
//! A reply can be printed raw, as pretty JSON of the parsed structure, or
//! as a table in ASCII, Markdown or HTML flavors.

pub mod table;

use std::io::{self, Write};

use crate::parser::{self, Reply};

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-friendly ASCII tables
    #[default]
    Table,
    /// Pretty-printed JSON of the parsed reply
    Json,
    /// The reply body verbatim
    Raw,
    /// Markdown tables / fenced code blocks
    Markdown,
    /// HTML tables / `<pre>` blocks
    Html,
}

impl Format {
    /// Parse a CLI format string; unknown values fall back to `Table`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Format::Json,
            "raw" | "plain" | "text" => Format::Raw,
            "md" | "markdown" => Format::Markdown,
            "html" | "htm" => Format::Html,
            _ => Format::Table,
        }
    }
}

/// Parse a reply for `command` and write it to `w` in the selected format.
pub fn print_reply(
    w: &mut impl Write,
    data: &[u8],
    command: &str,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Raw => write_raw(w, data),
        Format::Json => write_json(w, &parser::parse(data, command)),
        _ => match parser::parse(data, command) {
            Reply::Players(players) => table::players(w, &players, format),
            Reply::Admins(admins) => table::admins(w, &admins, format),
            Reply::Bans(bans) => table::bans(w, &bans, format),
            Reply::Messages(messages) => free_text(w, &messages.msg, format),
        },
    }
}

fn write_raw(w: &mut impl Write, data: &[u8]) -> io::Result<()> {
    if data.is_empty() {
        return writeln!(w, "OK");
    }

    writeln!(w, "{}", String::from_utf8_lossy(data))
}

fn write_json(w: &mut impl Write, reply: &Reply) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, reply).map_err(io::Error::other)?;
    writeln!(w)
}

/// Free text: fenced for Markdown, `<pre>` for HTML, plain otherwise.
fn free_text(w: &mut impl Write, lines: &[String], format: Format) -> io::Result<()> {
    match format {
        Format::Markdown => {
            writeln!(w, "```")?;
            for line in lines {
                writeln!(w, "{line}")?;
            }
            writeln!(w, "```")
        }

        Format::Html => {
            writeln!(w, "<pre>")?;
            for line in lines {
                writeln!(w, "{line}")?;
            }
            writeln!(w, "</pre>")
        }

        _ => {
            for line in lines {
                writeln!(w, "{line}")?;
            }
            Ok(())
        }
    }
}

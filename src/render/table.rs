//! Table rendering of parsed replies (ASCII, Markdown and HTML flavors).

use std::io::{self, Write};

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::Format;
use crate::parser::{Admin, Bans, Player};

#[derive(Tabled)]
struct PlayerRow {
    #[tabled(rename = "#")]
    id: u8,
    #[tabled(rename = "IP:Port")]
    addr: String,
    #[tabled(rename = "Ping")]
    ping: u16,
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct AdminRow {
    #[tabled(rename = "#")]
    id: u8,
    #[tabled(rename = "IP:Port")]
    addr: String,
}

#[derive(Tabled)]
struct BanGuidRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "Minutes left")]
    minutes: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct BanIpRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Minutes left")]
    minutes: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn players(w: &mut impl Write, players: &[Player], format: Format) -> io::Result<()> {
    let rows: Vec<PlayerRow> = players
        .iter()
        .map(|p| PlayerRow {
            id: p.id,
            addr: format!("{}:{}", p.ip, p.port),
            ping: p.ping,
            guid: p.guid.clone(),
            name: if p.lobby {
                format!("{} (Lobby)", p.name)
            } else {
                p.name.clone()
            },
        })
        .collect();

    let title = format!("Players on server ({} in total)", players.len());
    render(w, &title, Table::new(rows), format)
}

pub fn admins(w: &mut impl Write, admins: &[Admin], format: Format) -> io::Result<()> {
    let rows: Vec<AdminRow> = admins
        .iter()
        .map(|a| AdminRow {
            id: a.id,
            addr: format!("{}:{}", a.ip, a.port),
        })
        .collect();

    render(w, "Connected RCon admins", Table::new(rows), format)
}

pub fn bans(w: &mut impl Write, bans: &Bans, format: Format) -> io::Result<()> {
    if !bans.guid_bans.is_empty() {
        let rows: Vec<BanGuidRow> = bans
            .guid_bans
            .iter()
            .map(|b| BanGuidRow {
                id: b.id,
                guid: b.guid.clone(),
                minutes: minutes_left(b.minutes),
                reason: b.reason.clone(),
            })
            .collect();

        render(w, "GUID Bans", Table::new(rows), format)?;
        writeln!(w)?;
    }

    if !bans.ip_bans.is_empty() {
        let rows: Vec<BanIpRow> = bans
            .ip_bans
            .iter()
            .map(|b| BanIpRow {
                id: b.id,
                ip: b.ip.clone(),
                minutes: minutes_left(b.minutes),
                reason: b.reason.clone(),
            })
            .collect();

        render(w, "IP Bans", Table::new(rows), format)?;
    }

    Ok(())
}

fn minutes_left(minutes: i64) -> String {
    if minutes < 0 {
        "perm".to_string()
    } else {
        minutes.to_string()
    }
}

fn render(w: &mut impl Write, title: &str, mut table: Table, format: Format) -> io::Result<()> {
    match format {
        Format::Markdown => {
            table.with(Style::markdown());
            writeln!(w, "**{title}**")?;
            writeln!(w)?;
            writeln!(w, "{table}")
        }

        Format::Html => render_html(w, title, table),

        _ => {
            table.with(Style::rounded());
            writeln!(w, "{title}")?;
            writeln!(w, "{table}")
        }
    }
}

/// Emit the table as plain HTML markup. The cell grid is rebuilt from an
/// intermediate pipe-style render.
fn render_html(w: &mut impl Write, title: &str, mut table: Table) -> io::Result<()> {
    table.with(Style::markdown());
    let rendered = table.to_string();
    let mut lines = rendered.lines();

    writeln!(w, "<h4>{}</h4>", escape_html(title))?;
    writeln!(w, "<table>")?;

    if let Some(header) = lines.next() {
        writeln!(w, "  <tr>")?;
        for cell in split_row(header) {
            writeln!(w, "    <th>{}</th>", escape_html(&cell))?;
        }
        writeln!(w, "  </tr>")?;
    }

    // Skip the markdown separator line.
    for row in lines.skip(1) {
        writeln!(w, "  <tr>")?;
        for cell in split_row(row) {
            writeln!(w, "    <td>{}</td>", escape_html(&cell))?;
        }
        writeln!(w, "  </tr>")?;
    }

    writeln!(w, "</table>")
}

fn split_row(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

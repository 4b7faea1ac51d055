//! Configuration discovery: the rc (INI) file with globals and profiles,
//! and `beserver_x64*.cfg` resolution.
//!
//! The rc file is a small INI dialect: `#`/`;` comments, `[globals]` and
//! `[profile.<name>]` sections, `key = value` pairs. Profile values
//! override globals; CLI flags and environment variables override both.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tabled::settings::Style;
use tabled::{Table, Tabled};
use thiserror::Error;
use tracing::debug;

/// Errors from configuration discovery.
#[derive(Error, Debug)]
pub enum RcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("no beserver_x64*.cfg found in directory")]
    NoServerCfg,

    #[error("{0} not found in beserver cfg")]
    MissingServerKey(&'static str),
}

/// One rc section: every key optional, unset keys inherit on merge.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub server_cfg: Option<PathBuf>,
    pub format: Option<String>,
    pub timeout: Option<u64>,
    pub buffer_size: Option<u16>,
}

impl Profile {
    /// Layer `over` on top of `self`: set keys win.
    pub fn merged(&self, over: &Profile) -> Profile {
        Profile {
            ip: over.ip.clone().or_else(|| self.ip.clone()),
            port: over.port.or(self.port),
            password: over.password.clone().or_else(|| self.password.clone()),
            server_cfg: over.server_cfg.clone().or_else(|| self.server_cfg.clone()),
            format: over
                .format
                .as_deref()
                .map(str::to_ascii_lowercase)
                .or_else(|| self.format.clone()),
            timeout: over.timeout.or(self.timeout),
            buffer_size: over.buffer_size.or(self.buffer_size),
        }
    }

    fn apply_key(&mut self, key: &str, value: &str) {
        match key {
            "ip" => self.ip = Some(value.to_string()),
            "port" => self.port = value.parse().ok(),
            "password" => self.password = Some(value.to_string()),
            "server_cfg" => self.server_cfg = Some(PathBuf::from(value)),
            "format" => self.format = Some(value.to_string()),
            "timeout" => self.timeout = value.parse().ok().filter(|t| *t > 0),
            "buffer_size" => self.buffer_size = value.parse().ok().filter(|b| *b > 0),
            _ => debug!(key, "unknown rc key ignored"),
        }
    }
}

/// A parsed rc file.
#[derive(Debug, Clone, Default)]
pub struct RcFile {
    pub path: PathBuf,
    pub globals: Profile,
    pub profiles: BTreeMap<String, Profile>,
}

impl RcFile {
    /// Load the rc file: the explicit path if given, otherwise the first
    /// existing standard location. A missing file is `Ok(None)`.
    pub fn load(explicit: Option<&Path>) -> Result<Option<Self>, RcError> {
        let Some(path) = resolve_rc_path(explicit) else {
            return Ok(None);
        };

        let content = fs::read_to_string(&path)?;
        Ok(Some(Self::parse(&content, path)))
    }

    fn parse(content: &str, path: PathBuf) -> Self {
        let mut file = RcFile {
            path,
            ..Default::default()
        };
        let mut section = String::new();

        for raw in content.lines() {
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if section == "globals" {
                file.globals.apply_key(&key, value);
            } else if let Some(profile) = section.strip_prefix("profile.") {
                file.profiles
                    .entry(profile.to_string())
                    .or_default()
                    .apply_key(&key, value);
            }
        }

        file
    }

    /// The merged view for a profile: globals overridden by the profile's
    /// own keys. An empty name yields just the globals.
    pub fn effective(&self, profile: &str) -> Result<Profile, RcError> {
        if profile.is_empty() {
            return Ok(self.globals.clone());
        }

        let section = self
            .profiles
            .get(profile)
            .ok_or_else(|| RcError::ProfileNotFound(profile.to_string()))?;

        Ok(self.globals.merged(section))
    }
}

fn resolve_rc_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let mut candidates = Vec::new();

    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join("bercon-cli").join("config.ini"));
        candidates.push(home.join(".bercon-cli.ini"));
    }

    if let Some(config) = dirs::config_dir() {
        candidates.push(config.join("bercon-cli").join("config.ini"));
    }

    candidates.into_iter().find(|p| p.is_file())
}

/// Connection parameters resolved from a `beserver_x64*.cfg` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    pub ip: String,
    pub port: u16,
    pub password: String,
}

/// Resolve `path` (a cfg file or a directory to search) and parse the RCon
/// settings out of it. An unset or wildcard ip normalizes to `127.0.0.1`.
pub fn load_beserver_cfg(path: &Path) -> Result<ServerCfg, RcError> {
    let cfg_path = resolve_beserver_path(path)?;
    debug!(path = %cfg_path.display(), "reading beserver cfg");

    let mut cfg = parse_beserver_cfg(&fs::read_to_string(&cfg_path)?)?;

    if cfg.ip.is_empty() || cfg.ip == "0.0.0.0" {
        cfg.ip = "127.0.0.1".to_string();
    }

    Ok(cfg)
}

/// Pick the concrete cfg file: a file path is used as-is; in a directory,
/// `beserver_x64*.cfg` entries are ranked active-first, then newest mtime.
fn resolve_beserver_path(path: &Path) -> Result<PathBuf, RcError> {
    let meta = fs::metadata(path)?;
    if !meta.is_dir() {
        return Ok(path.to_path_buf());
    }

    struct Candidate {
        path: PathBuf,
        active: bool,
        modified: std::time::SystemTime,
    }

    let mut candidates = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();

        if !name.starts_with("beserver_x64") || !name.ends_with(".cfg") {
            continue;
        }

        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            continue;
        }

        candidates.push(Candidate {
            path: entry.path(),
            active: name.contains("active"),
            modified: meta.modified().unwrap_or(std::time::UNIX_EPOCH),
        });
    }

    candidates.sort_by(|a, b| {
        b.active
            .cmp(&a.active)
            .then_with(|| b.modified.cmp(&a.modified))
    });

    candidates
        .into_iter()
        .next()
        .map(|c| c.path)
        .ok_or(RcError::NoServerCfg)
}

/// Whitespace-separated `Key Value` lines; `;`, `#` and `//` comments.
fn parse_beserver_cfg(content: &str) -> Result<ServerCfg, RcError> {
    let mut ip = String::new();
    let mut port = 0u16;
    let mut password = String::new();

    for raw in content.lines() {
        let line = raw.trim();

        if line.is_empty()
            || line.starts_with(';')
            || line.starts_with('#')
            || line.starts_with("//")
        {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            "rconpassword" => password = value.to_string(),
            "rconport" => {
                if let Ok(p) = value.parse::<u16>() {
                    if p > 0 {
                        port = p;
                    }
                }
            }
            "rconip" => ip = value.to_string(),
            _ => {}
        }
    }

    if password.is_empty() {
        return Err(RcError::MissingServerKey("RConPassword"));
    }

    if port == 0 {
        return Err(RcError::MissingServerKey("RConPort"));
    }

    Ok(ServerCfg { ip, port, password })
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Buffer")]
    buffer: String,
    #[tabled(rename = "Timeout")]
    timeout: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Config Source")]
    source: String,
}

/// Print every profile from the rc file as a resolved table. `base` fills
/// keys neither globals nor the profile set (CLI/env defaults).
pub fn print_profiles(
    w: &mut impl Write,
    explicit: Option<&Path>,
    base: &Profile,
) -> Result<(), RcError> {
    let Some(file) = RcFile::load(explicit)? else {
        writeln!(w, "no profiles found")?;
        return Ok(());
    };

    if file.profiles.is_empty() {
        writeln!(w, "no profiles found")?;
        return Ok(());
    }

    let mut rows = Vec::new();

    for name in file.profiles.keys() {
        let Ok(profile) = file.effective(name) else {
            continue;
        };
        let resolved = base.merged(&profile);

        let mut ip = resolved.ip.clone().unwrap_or_default();
        let mut port = resolved.port;
        let source = resolved
            .server_cfg
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        // server_cfg supplies ip/port when it resolves.
        if let Some(cfg_path) = &resolved.server_cfg {
            if let Ok(cfg) = load_beserver_cfg(cfg_path) {
                ip = cfg.ip;
                port = Some(cfg.port);
            }
        }

        if ip.is_empty() || ip == "0.0.0.0" {
            ip = "127.0.0.1".to_string();
        }

        rows.push(ProfileRow {
            name: name.clone(),
            ip,
            port: port.map(|p| p.to_string()).unwrap_or_default(),
            buffer: resolved
                .buffer_size
                .map(|b| b.to_string())
                .unwrap_or_default(),
            timeout: resolved.timeout.map(|t| t.to_string()).unwrap_or_default(),
            format: resolved.format.clone().unwrap_or_default(),
            source,
        });
    }

    writeln!(w, "Loaded from rc file: {}", file.path.display())?;
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    writeln!(w, "{table}")?;

    Ok(())
}

/// Example rc file printed by `--example`.
pub const EXAMPLE_RC: &str = r#"# Example bercon-cli config file (INI)
# Lines starting with '#' are comments.

[globals]
# Default settings applied to all profiles (unless overridden)
ip = 127.0.0.1
port = 2305
password = MyDefaultPass
format = table
timeout = 3
buffer_size = 1024

[profile.dayz-local]
# Load BattlEye RCon params automatically from beserver_x64*.cfg
server_cfg = /home/dayz/server/battleye
format = json

[profile.dayz-eu]
ip = 192.168.1.55
port = 2310
password = strongPass

[profile.arma3-test]
server_cfg = C:\Games\Arma3Server\battleye
timeout = 5
"#;

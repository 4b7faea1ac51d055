//! Command-line entrypoint: parses flags, resolves configuration, runs RCON
//! commands and prints results in the selected output format.
//!
//! ```bash
//! # One-off command
//! bercon-cli -i 192.168.1.10 -p 2305 -P secret players
//!
//! # Profile from the rc file, JSON output, repeated forever
//! bercon-cli -n dayz-eu -f json -x -1 players
//!
//! # Credentials straight from the server's BattlEye directory
//! bercon-cli -r /home/dayz/server/battleye players bans
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bercon::config::MAX_KEEPALIVE;
use bercon::rc::{self, Profile, RcFile};
use bercon::render::{self, Format};
use bercon::{Config, Connection};

const LONG_ABOUT: &str = "\
BattlEye RCon CLI: a command-line tool for interacting with BattlEye RCON \
servers (used by DayZ, Arma 2/3, etc). It executes server commands, reads \
responses, and formats results as table, JSON, Markdown, or HTML.

Configuration can be provided via CLI flags, BERCON_* environment \
variables, an rc config file (INI) with globals and profiles, or a \
beserver_x64*.cfg to auto-load RConIP, RConPort and RConPassword.

When no --config path is given, the rc file is looked up in \
~/.config/bercon-cli/config.ini, ~/.bercon-cli.ini, and the platform \
config directory.";

#[derive(Parser, Debug)]
#[command(name = "bercon-cli", version, about = "BattlEye RCon CLI", long_about = LONG_ABOUT)]
struct Args {
    /// Server IPv4 address
    #[arg(short = 'i', long, env = "BERCON_ADDRESS")]
    ip: Option<String>,

    /// Server RCON port
    #[arg(short = 'p', long, env = "BERCON_PORT")]
    port: Option<u16>,

    /// Server RCON password
    #[arg(short = 'P', long, env = "BERCON_PASSWORD")]
    password: Option<String>,

    /// Profile name from the rc file
    #[arg(short = 'n', long, env = "BERCON_PROFILE")]
    profile: Option<String>,

    /// Request deadline in seconds
    #[arg(short = 't', long, env = "BERCON_TIMEOUT")]
    timeout: Option<u64>,

    /// Packet buffer size
    #[arg(short = 'b', long, env = "BERCON_BUFFER_SIZE")]
    buffer_size: Option<u16>,

    /// Number of login attempts
    #[arg(short = 'a', long, env = "BERCON_ATTEMPTS", default_value_t = 1)]
    attempts: u32,

    /// Sleep in milliseconds after each command
    #[arg(short = 's', long, env = "BERCON_SLEEP_CMD", default_value_t = 1)]
    cmd_sleep: u64,

    /// Sleep in seconds after each loop
    #[arg(short = 'S', long, env = "BERCON_SLEEP_LOOP", default_value_t = 5)]
    loop_sleep: u64,

    /// Keepalive interval in seconds
    #[arg(short = 'k', long, env = "BERCON_KEEPALIVE", default_value_t = 30)]
    keepalive: u64,

    /// Repeat the command list N times (-1 for infinite)
    #[arg(short = 'x', long, env = "BERCON_REPEAT", default_value_t = 1, allow_hyphen_values = true)]
    repeat: i64,

    /// Path to the rc file (INI); standard locations are probed otherwise
    #[arg(short = 'c', long, env = "BERCON_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a beserver_x64*.cfg file or a directory to search
    #[arg(short = 'r', long, env = "BERCON_SERVER_CFG")]
    server_cfg: Option<PathBuf>,

    /// Output format: table, json, raw, md, html
    #[arg(short = 'f', long, env = "BERCON_FORMAT")]
    format: Option<String>,

    /// List profiles from the rc file and exit
    #[arg(short = 'l', long)]
    list_profiles: bool,

    /// Print an example rc (INI) config and exit
    #[arg(short = 'e', long)]
    example: bool,

    /// Commands to execute, in order
    commands: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut stdout = std::io::stdout();

    if args.example {
        print!("{}", rc::EXAMPLE_RC);
        return;
    }

    if args.list_profiles {
        let base = Profile {
            format: args.format.clone(),
            timeout: args.timeout,
            buffer_size: args.buffer_size,
            ..Default::default()
        };
        if let Err(err) = rc::print_profiles(&mut stdout, args.config.as_deref(), &base) {
            fatal(&format!("rc: {err}"));
        }
        return;
    }

    // rc file (globals + optional profile), lowest precedence.
    let mut resolved = Profile::default();
    match RcFile::load(args.config.as_deref()) {
        Err(err) => fatal(&format!("rc: {err}")),
        Ok(Some(file)) => {
            match file.effective(args.profile.as_deref().unwrap_or_default()) {
                Ok(profile) => resolved = profile,
                Err(err) => fatal(&format!("rc: {err}")),
            }
        }
        Ok(None) => {}
    }

    // CLI flags and env override the rc file.
    let over = Profile {
        ip: args.ip.clone(),
        port: args.port,
        password: args.password.clone(),
        server_cfg: args.server_cfg.clone(),
        format: args.format.clone(),
        timeout: args.timeout,
        buffer_size: args.buffer_size,
    };
    let mut resolved = resolved.merged(&over);

    // A beserver cfg overrides ip/port/password wholesale.
    if let Some(cfg_path) = &resolved.server_cfg {
        match rc::load_beserver_cfg(cfg_path) {
            Ok(cfg) => {
                resolved.ip = Some(cfg.ip);
                resolved.port = Some(cfg.port);
                resolved.password = Some(cfg.password);
            }
            Err(err) => fatal(&format!("beserver cfg: {err}")),
        }
    }

    let ip = resolved.ip.unwrap_or_else(|| "127.0.0.1".to_string());
    let port = resolved.port.unwrap_or(2305);

    let Some(password) = resolved.password.filter(|p| !p.is_empty()) else {
        fatal("RCON password must be specified");
    };

    if args.commands.is_empty() {
        fatal("Command must be provided");
    }

    if args.repeat == 0 {
        fatal("Repeat must be >= 1 or -1 for infinite");
    }

    let format = Format::parse(resolved.format.as_deref().unwrap_or("table"));

    let mut config = Config::new()
        .deadline(Duration::from_secs(resolved.timeout.unwrap_or(3)))
        .keepalive(Duration::from_secs(args.keepalive))
        .login_attempts(args.attempts);
    if let Some(size) = resolved.buffer_size {
        config = config.buffer_size(size);
    }

    // Keepalive only pays off for long sessions with big gaps between
    // commands.
    let mut gap = Duration::from_secs(args.loop_sleep);
    if args.commands.len() > 1 {
        gap = gap.max(Duration::from_millis(args.cmd_sleep));
    }
    let long_session = args.repeat < 0 || args.repeat > 1 || args.commands.len() > 1;
    config = config.start_keepalive(long_session && gap >= MAX_KEEPALIVE);

    let address = format!("{ip}:{port}");
    let conn = match Connection::open_with(&address, &password, config).await {
        Ok(conn) => conn,
        Err(err) => fatal(&format!("error opening connection: {err}")),
    };

    // Surface server messages and login notifications in the log.
    if let Some(mut events) = conn.events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!(
                    seq = event.seq,
                    message = %String::from_utf8_lossy(&event.body),
                    "server message"
                );
            }
        });
    }

    let mut loop_idx: i64 = 0;
    loop {
        if args.repeat >= 0 && loop_idx >= args.repeat {
            break;
        }

        for (idx, command) in args.commands.iter().enumerate() {
            let data = match conn.send(command).await {
                Ok(data) => data,
                Err(err) => {
                    conn.close().await;
                    fatal(&format!("error in command {idx} '{command}': {err}"));
                }
            };

            if let Err(err) = render::print_reply(&mut stdout, &data, command, format) {
                conn.close().await;
                fatal(&format!("cannot print response data: {err}"));
            }
            let _ = stdout.flush();

            if idx < args.commands.len() - 1 && args.cmd_sleep > 0 {
                tokio::time::sleep(Duration::from_millis(args.cmd_sleep)).await;
            }
        }

        loop_idx += 1;

        let last = args.repeat >= 0 && loop_idx >= args.repeat;
        if args.loop_sleep > 0 && !last {
            tokio::time::sleep(Duration::from_secs(args.loop_sleep)).await;
        }
    }

    conn.close().await;
}

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    exit(1);
}

use anyhow::{Context, Result};
use arena_engine::config::Config;
use clap::{Arg, ArgMatches, Command};
use tanks::config::{GameConfig, DEFAULT_CONFIG_PATH};
use tanks::session::Session;

fn cli() -> Command {
    Command::new("tanks")
        .about("Networked 2D tank arena")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (TOML or RON)")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("Stop after this many seconds")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .subcommand(Command::new("serve").about("Run a dedicated server"))
        .subcommand(
            Command::new("connect").about("Join a server").arg(
                Arg::new("host")
                    .value_name("HOST[:PORT]")
                    .help("Server to join")
                    .required(true),
            ),
        )
        .subcommand(Command::new("play").about("Host a game and join it locally"))
}

fn session(matches: &ArgMatches, config: &GameConfig) -> Result<Session> {
    let session = match matches.subcommand() {
        Some(("serve", _)) => {
            log::info!("Starting dedicated server on port {}", config.server.port);
            Session::dedicated(config)?
        }
        Some(("connect", sub)) => {
            let host = sub
                .get_one::<String>("host")
                .context("missing host")?;
            log::info!("Connecting to {}", host);
            Session::connect(config, host)?
        }
        Some(("play", _)) => {
            log::info!("Starting listen server on port {}", config.server.port);
            Session::listen(config)?
        }
        _ => anyhow::bail!("unknown command"),
    };
    Ok(session)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    let path = matches
        .get_one::<String>("config")
        .map_or(DEFAULT_CONFIG_PATH, String::as_str);
    let config = GameConfig::load_or_default(path);
    let duration = matches.get_one::<f64>("duration").copied();

    let mut session = session(&matches, &config).context("failed to start session")?;
    session.run(duration);
    Ok(())
}

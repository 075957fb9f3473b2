use std::{error::Error, path::PathBuf, process, time::Duration};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, warn, LevelFilter};

use mcremote::{
    cache::{Cover, Tier},
    config::Config,
    manager::Backend,
    protocol::status::Seek,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// A TOML file with the media center's address, credentials and cache
    /// settings. Keep it private if it holds a password.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Media center host name or address
    ///
    /// Overrides the host in the configuration file.
    #[arg(long, value_hint = ValueHint::Hostname)]
    host: Option<String>,

    /// Media center HTTP API port
    ///
    /// Overrides the port in the configuration file.
    #[arg(long)]
    port: Option<u16>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Action,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
enum Action {
    /// Show what is playing
    Status,

    /// Show what is playing whenever it changes, until interrupted
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },

    /// Toggle pause
    Pause,

    /// Stop playback
    Stop,

    /// Toggle muting
    Mute,

    /// Skip to the next item
    Next,

    /// Go back to the previous item
    Previous,

    /// Show the volume, or set it from 0 to 100
    Volume { level: Option<u8> },

    /// Seek to a percentage, or by a percentage when prefixed with + or -
    Seek {
        #[arg(allow_hyphen_values = true, value_parser = parse_seek)]
        position: Seek,
    },

    /// List albums in the music library
    Albums,

    /// Queue an album, starting playback if nothing is playing
    Queue {
        /// Album id as listed by `albums`
        album: u32,
    },

    /// Show the music playlist
    Playlist,

    /// Fetch a thumbnail through the cache
    Thumb {
        /// Thumbnail path on the media center
        path: String,

        /// Size variant
        #[arg(long, default_value_t = Tier::Small)]
        tier: Tier,

        /// Write the thumbnail to this file; the extension picks the format
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}

fn parse_seek(s: &str) -> Result<Seek, String> {
    let seek = if s.starts_with(['+', '-']) {
        s.parse::<i8>().map(Seek::Relative).map_err(|e| e.to_string())?
    } else {
        s.parse::<u8>().map(Seek::Absolute).map_err(|e| e.to_string())?
    };
    seek.validate().map_err(|e| e.to_string())
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(args: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if args.quiet || args.verbose > 0 {
        let level = match args.verbose {
            // Quiet and verbose are mutually exclusive.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            debug!("loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    Ok(config)
}

/// Logs a refused command. Refusals are not errors.
fn report(command: &str, accepted: bool) {
    if accepted {
        info!("{command}: ok");
    } else {
        warn!("{command}: refused by media center");
    }
}

async fn status(backend: &Backend) -> Result<(), Box<dyn Error>> {
    let control = backend.control();
    let playing = control.currently_playing();
    let volume = control.volume();

    println!("{}", playing.await?);
    println!("volume: {}%", volume.await?);
    Ok(())
}

async fn watch(backend: &Backend, interval: Duration) -> Result<(), Box<dyn Error>> {
    let mut ticker = tokio::time::interval(interval);
    let mut last = None;

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("stopped watching");
                break Ok(());
            }

            _ = ticker.tick() => {
                match backend.control().currently_playing().await {
                    Ok(playing) => {
                        let line = playing.to_string();
                        if last.as_ref() != Some(&line) {
                            println!("{line}");
                            last = Some(line);
                        }
                    }
                    // Keep watching through transient outages.
                    Err(e) => warn!("{e}"),
                }
            }
        }
    }
}

async fn queue(backend: &Backend, id: u32) -> Result<(), Box<dyn Error>> {
    let music = backend.music();
    let album = music
        .albums()
        .await?
        .into_iter()
        .find(|album| album.id == id)
        .ok_or_else(|| format!("no album with id {id}"))?;

    let songs = music.songs(&album).await?;
    let enqueued = music.enqueue(songs).await?;

    println!("queued {} songs from {album}", enqueued.queued);
    if let Some(position) = enqueued.started_at {
        println!("playing from position {position}");
    }
    Ok(())
}

async fn playlist(backend: &Backend) -> Result<(), Box<dyn Error>> {
    let music = backend.music();
    let items = music.playlist();
    let current = music.playlist_position();

    let (items, current) = (items.await?, current.await?);
    if items.is_empty() {
        println!("playlist is empty");
    }
    for (position, item) in items.iter().enumerate() {
        let marker = if current == Some(position) { '>' } else { ' ' };
        println!("{marker}{position:>4}  {item}");
    }
    Ok(())
}

async fn thumb(
    backend: &Backend,
    path: String,
    tier: Tier,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let cover = Cover::new(path);
    let resolution = backend.covers().resolve(&cover, tier).await?;

    println!(
        "{}: {}x{} from {:?}",
        cover.key(tier),
        resolution.thumbnail.width(),
        resolution.thumbnail.height(),
        resolution.source
    );
    debug!("cache: {}", backend.covers().stats());

    if let Some(out) = out {
        let format = image::ImageFormat::from_path(&out)?;
        let encoded = resolution.thumbnail.encode_as(format)?;
        tokio::fs::write(&out, encoded).await?;
        info!("wrote {}", out.display());
    }
    Ok(())
}

async fn execute(backend: &Backend, action: Action) -> Result<(), Box<dyn Error>> {
    let control = backend.control();

    match action {
        Action::Status => status(backend).await?,
        Action::Watch { interval } => {
            watch(backend, Duration::from_secs(interval.max(1))).await?;
        }
        Action::Pause => report("pause", control.pause().await?),
        Action::Stop => report("stop", control.stop().await?),
        Action::Mute => report("mute", control.mute().await?),
        Action::Next => report("next", control.play_next().await?),
        Action::Previous => report("previous", control.play_previous().await?),
        Action::Volume { level: Some(level) } => {
            report("volume", control.set_volume(level).await?);
        }
        Action::Volume { level: None } => println!("volume: {}%", control.volume().await?),
        Action::Seek { position } => report("seek", control.seek(position).await?),
        Action::Albums => {
            for album in backend.music().albums().await? {
                println!("{:>6}  {album}", album.id);
            }
        }
        Action::Queue { album } => queue(backend, album).await?,
        Action::Playlist => playlist(backend).await?,
        Action::Thumb { path, tier, out } => thumb(backend, path, tier, out).await?,
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    debug!("{config:#?}");

    let backend = Backend::new(&config)?;
    let result = execute(&backend, args.command).await;
    backend.shutdown();

    result
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}

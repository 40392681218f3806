use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use music_dl::api::platform::{self, LinkKind, DEFAULT_EXCLUDED, REFERENCE_ORDER};
use music_dl::api::{CapabilityRecord, DirectLink};
use music_dl::config::COOKIE_FILE;
use music_dl::session::{self, Backend, Event, Phase, Render, Session};
use music_dl::{Cookies, MatchQuery, MusicDl, Registry, Settings};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "music-dl")]
#[command(about = "Search, match and download music across platforms", long_about = None)]
struct Cli {
    /// Search keyword; starts the session with this query
    #[arg(short, long)]
    keyword: Option<String>,

    /// Platforms to search, comma separated (e.g. netease,qq,kugou)
    #[arg(short, long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Output directory for downloads
    #[arg(short, long, default_value = "downloads")]
    outdir: PathBuf,

    /// Also save the cover image (use --cover=false to disable)
    #[arg(long, default_value_t = true, num_args = 0..=1, require_equals = true,
          default_missing_value = "true", action = ArgAction::Set)]
    cover: bool,

    /// Also save lyrics (use --lyrics=false to disable)
    #[arg(short, long, default_value_t = true, num_args = 0..=1, require_equals = true,
          default_missing_value = "true", action = ArgAction::Set)]
    lyrics: bool,

    /// Embed title, artist, album and cover into the audio file
    #[arg(long)]
    embed_tags: bool,

    /// Download the track behind a share or audio file link
    #[arg(short, long)]
    url: Option<String>,

    /// Cookie file (JSON object of platform → cookie)
    #[arg(long, env = "MUSIC_DL_COOKIES", default_value = COOKIE_FILE)]
    cookies: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the same song on another platform
    Switch {
        /// Song title
        #[arg(long)]
        name: String,

        /// Artist name
        #[arg(long, default_value = "")]
        artist: String,

        /// Platform the song comes from (never searched)
        #[arg(long, default_value = "")]
        source: String,

        /// Only search this platform
        #[arg(long)]
        target: Option<String>,

        /// Reference duration in seconds
        #[arg(long, default_value_t = 0)]
        duration: u32,
    },
    /// List known platforms
    Sources,
}

/// Plain-text renderer for the line-based session.
#[derive(Default)]
struct LineRenderer {
    last: String,
}

impl Render for LineRenderer {
    fn render(&mut self, session: &Session) {
        let frame = frame(session);
        if frame != self.last {
            println!("{}", frame);
            self.last = frame;
        }
    }
}

fn frame(session: &Session) -> String {
    match session.phase() {
        Phase::Input => {
            let mut out = String::new();
            if let Some(error) = session.error() {
                out.push_str(&format!("❌ {}\n", error));
            } else if !session.status().is_empty() {
                out.push_str(&format!("{}\n", session.status()));
            }
            out.push_str("Search (Ctrl-D to quit):");
            out
        }
        Phase::Loading => format!("🔍 {}", session.status()),
        Phase::List => {
            let mut out = format!("{}\n", session.status());
            for (i, track) in session.results().iter().enumerate() {
                let cursor = if i == session.cursor() { '>' } else { ' ' };
                let mark = if session.is_selected(i) { "[x]" } else { "[ ]" };
                out.push_str(&format!(
                    "{} {} {:>2}. {} - {} [{}] {} {}\n",
                    cursor,
                    mark,
                    i + 1,
                    track.title,
                    track.artist,
                    track.platform,
                    track.duration_formatted(),
                    track.size_formatted()
                ));
            }
            out.push_str("j/k move, <n> toggle row, space toggle, a all, n none, b back, enter download, q quit");
            out
        }
        Phase::Downloading => format!(
            "⬇️  [{}/{}] {:>3.0}% {}",
            session.downloaded(),
            session.total(),
            session.progress() * 100.0,
            session.status()
        ),
    }
}

/// Forward stdin lines into the session. Runs on a plain thread so a
/// blocked read never holds up runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(Event::Line(line)).is_err() {
                break;
            }
        }
    });
}

fn registry() -> Registry {
    let direct = Arc::new(DirectLink);
    Registry::builder()
        .register(
            platform::DIRECT,
            CapabilityRecord::new()
                .with_parse_link(direct.clone())
                .with_resolve_url(direct),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Sources) = &cli.command {
        for name in REFERENCE_ORDER {
            let note = if DEFAULT_EXCLUDED.contains(name) {
                " (not searched by default)"
            } else {
                ""
            };
            println!("{:<10} {}{}", name, platform::description(name), note);
        }
        return Ok(());
    }

    let cookies = Cookies::load(&cli.cookies)?;
    let settings = Settings::default()
        .with_output_dir(&cli.outdir)
        .with_sources(cli.sources.clone())
        .with_cover(cli.cover)
        .with_lyrics(cli.lyrics)
        .with_embed_tags(cli.embed_tags);
    let client = Arc::new(MusicDl::new(registry(), settings, cookies)?);

    if let Some(Commands::Switch {
        name,
        artist,
        source,
        target,
        duration,
    }) = &cli.command
    {
        let mut query = MatchQuery::new(name.as_str(), artist.as_str())
            .excluding(source.as_str())
            .with_duration(*duration);
        query.target = target.clone();

        println!("Looking for '{}' beyond {}...", name, source);
        let found = client.switch_platform(&query).await?;
        let track = &found.track;
        println!("✅ {} - {} [{}]", track.title, track.artist, track.platform);
        println!("   Score: {:.2}", found.score);
        println!("   ID: {}", track.id);
        let link = platform::original_link(&track.platform, &track.id, LinkKind::Song);
        if !link.is_empty() {
            println!("   Link: {}", link);
        }
        return Ok(());
    }

    if let Some(url) = &cli.url {
        println!("Downloading {}...", url);
        let result = client.download_link(url).await?;
        println!("✅ Downloaded: {} - {}", result.title, result.artist);
        println!("   Path: {}", result.path.display());
        if let Some(cover) = &result.cover_path {
            println!("   Cover: {}", cover.display());
        }
        if let Some(lyrics) = &result.lyrics_path {
            println!("   Lyrics: {}", lyrics.display());
        }
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(32);
    spawn_stdin_reader(tx);

    let backend: Arc<dyn Backend> = client;
    let mut renderer = LineRenderer::default();
    let session = session::run(
        Session::new(cli.keyword.as_deref()),
        backend,
        rx,
        &mut renderer,
    )
    .await;
    if session.downloaded() > 0 {
        println!("Files saved to {}", cli.outdir.display());
    }

    Ok(())
}

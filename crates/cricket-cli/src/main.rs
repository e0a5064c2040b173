mod config;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use cricket_core::{
    refresh_interval, FeedOrigin, FlagStore, HttpLoader, Loader, Match, MatchFetcher, MatchStatus,
    PlaybackEventKind, PlaybackSession, SessionState, StreamResolver, NOTICE_SHOWN,
};

use crate::config::AppConfig;

/// Cricket match streams: browse live matches and check their streams.
#[derive(Parser)]
#[command(name = "cricket-stream", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the match board, refreshing while matches are live or about to start.
    Watch {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only show matches with this status (live, upcoming, completed).
        #[arg(long)]
        status: Option<MatchStatus>,

        /// Print the board once and exit.
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Resolve a match's stream and run the playback attempts.
    Play {
        /// Match id as shown by `watch`.
        match_id: String,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra full runs to make if every attempt fails.
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => {
            run_serve(listen, config).await;
        }
        Commands::Watch { config, status, once } => {
            let app_config = load_config(config, "warn");
            show_notice_once(&app_config).await;
            run_watch(app_config, status, once).await;
        }
        Commands::Play {
            match_id,
            config,
            retries,
        } => {
            let app_config = load_config(config, "warn");
            show_notice_once(&app_config).await;
            run_play(app_config, match_id, retries).await;
        }
    }
}

/// Loads the config (or defaults) and installs the subscriber. Exits on a bad file.
fn load_config(path: Option<PathBuf>, default_level: &str) -> AppConfig {
    match AppConfig::load_or_default(path.as_deref()) {
        Ok(c) => {
            init_tracing(&c.server.log_format, default_level);
            if let Some(ref p) = path {
                tracing::info!(path = %p.display(), "Loaded config file");
            }
            c
        }
        Err(e) => {
            init_tracing("pretty", default_level);
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn build_loader(app_config: &AppConfig) -> Arc<dyn Loader> {
    match HttpLoader::from_config(&app_config.to_feed_config()) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    }
}

async fn show_notice_once(app_config: &AppConfig) {
    let flags = FlagStore::new(&app_config.state_dir);
    if flags.is_set(NOTICE_SHOWN).await {
        return;
    }

    println!(
        "{}",
        style("Streams are provided by third-party sites and may be slow or geo-blocked.")
            .yellow()
    );
    println!(
        "{}",
        style("Nothing is hosted or recorded by this tool. This notice is shown once.").dim()
    );
    println!();

    if let Err(e) = flags.set(NOTICE_SHOWN, true).await {
        tracing::warn!(error = %e, "Could not record notice flag");
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) {
    let app_config = load_config(config_path, "info");
    let listen = listen_override.unwrap_or(app_config.server.listen);

    let state = match cricket_api::state::AppState::from_configs(
        app_config.to_feed_config(),
        app_config.to_resolver_config(),
        app_config.to_player_config(),
    ) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };
    tracing::info!(
        sources = app_config.source.len(),
        proxies = app_config.feed.proxies.len(),
        "Feed configured"
    );

    let sessions = state.sessions.clone();

    tracing::info!(%listen, "Starting cricket-stream API server");
    if let Err(e) = cricket_api::serve_with_state(listen, state, cricket_api::shutdown_signal()).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }

    tracing::info!(sessions = sessions.len(), "Shutdown complete");
}

async fn run_watch(app_config: AppConfig, status: Option<MatchStatus>, once: bool) {
    let loader = build_loader(&app_config);
    let fetcher = MatchFetcher::new(app_config.to_feed_config(), loader);

    let multi = MultiProgress::new();
    multi
        .println(format!(
            "{} {}",
            style("cricket-stream").bold(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
    multi
        .println(format!(
            "  {} {}",
            style("sources:").dim(),
            app_config.source.len()
        ))
        .ok();
    if let Some(s) = status {
        multi
            .println(format!("  {} {}", style("status: ").dim(), s))
            .ok();
    }
    multi.println("").ok();

    if once {
        let list = fetcher.fetch().await;
        let lines = board_lines(list.matches(), status, list.origin, 0);
        for line in lines {
            println!("{line}");
        }
        return;
    }

    multi
        .println(format!("{}", style("Press Ctrl+C to stop").dim()))
        .ok();
    multi.println("").ok();

    let msg_style = match ProgressStyle::with_template("{wide_msg}") {
        Ok(s) => s,
        Err(_) => ProgressStyle::default_spinner(),
    };
    let board = multi.add(ProgressBar::new_spinner().with_style(msg_style));
    board.set_message(format!(
        "{}\n  {}",
        format_separator(0),
        style("Fetching matches...").dim()
    ));

    let shutdown = cricket_api::shutdown_signal();
    tokio::pin!(shutdown);

    let mut refresh_num = 0u64;
    loop {
        refresh_num += 1;
        let list = fetcher.fetch().await;
        let interval = refresh_interval(list.matches(), Utc::now());

        let mut lines = board_lines(list.matches(), status, list.origin, refresh_num);
        lines.push(format!(
            "  {}",
            style(format!("next refresh in {}s", interval.as_secs())).dim()
        ));
        board.set_message(lines.join("\n"));

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                board.finish_and_clear();
                multi.println(format!("\n{}", style("Stopped.").dim())).ok();
                return;
            }
        }
    }
}

fn board_lines(
    matches: &[Match],
    status: Option<MatchStatus>,
    origin: FeedOrigin,
    refresh_num: u64,
) -> Vec<String> {
    let mut lines = vec![format_separator(refresh_num)];
    if matches!(origin, FeedOrigin::Stale | FeedOrigin::Mock) {
        lines.push(format!(
            "  {}",
            style(format!("sources unavailable, showing {origin} data")).yellow()
        ));
    }

    let shown: Vec<&Match> = matches
        .iter()
        .filter(|m| status.is_none_or(|s| m.status == s))
        .collect();
    if shown.is_empty() {
        lines.push(format!("  {}", style("No matches.").dim()));
        return lines;
    }

    for m in shown {
        let badge = format!("{:<9}", m.status.to_string().to_uppercase());
        let badge = match m.status {
            MatchStatus::Live => style(badge).red().bold(),
            MatchStatus::Upcoming => style(badge).cyan(),
            MatchStatus::Completed => style(badge).dim(),
        };
        let when = m.start_time.with_timezone(&chrono::Local).format("%d %b %H:%M");
        let stream = if m.has_stream_source() {
            format!("  {}", style("▶").green())
        } else {
            String::new()
        };
        lines.push(format!(
            "  {} {:<5} vs {:<5} {:<28} {}  {}{}",
            badge,
            m.team1.short_name,
            m.team2.short_name,
            truncate(&m.tournament, 28),
            style(when).dim(),
            style(&m.id).dim(),
            stream,
        ));
    }
    lines
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

async fn run_play(app_config: AppConfig, match_id: String, retries: u32) {
    let loader = build_loader(&app_config);
    let fetcher = MatchFetcher::new(app_config.to_feed_config(), Arc::clone(&loader));
    let resolver = StreamResolver::new(app_config.to_resolver_config(), Arc::clone(&loader));

    let Some(m) = fetcher.find(&match_id).await else {
        eprintln!("{} match '{}' not found", style("error:").red().bold(), match_id);
        std::process::exit(1);
    };
    println!("{} {}", style(m.title()).bold(), style(&m.tournament).dim());

    let Some(resolution) = resolver.resolve(&m).await else {
        eprintln!(
            "{} {} has no stream source",
            style("error:").red().bold(),
            m.title()
        );
        std::process::exit(1);
    };
    println!(
        "  {} {} {}",
        style("source:").dim(),
        resolution.url,
        style(format!(
            "({:?}{})",
            resolution.kind,
            if resolution.verified { ", verified" } else { "" }
        ))
        .dim()
    );
    println!();

    let session = Arc::new(PlaybackSession::new(
        m.id.clone(),
        resolution.url,
        app_config.to_player_config(),
        loader,
        fetcher.proxies(),
    ));

    let mut seen: HashSet<String> = HashSet::new();
    for run in 0..=retries {
        let handle = if run == 0 {
            session.spawn_run()
        } else {
            session.spawn_retry()
        };

        while !handle.is_finished() {
            print_new_events(&session, &mut seen).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let status = match handle.await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{} playback task failed: {}", style("error:").red().bold(), e);
                std::process::exit(1);
            }
        };
        print_new_events(&session, &mut seen).await;

        if status.state == SessionState::Playing {
            println!();
            println!(
                "{} {} via {}",
                style("Playing").green().bold(),
                status.current_url.as_deref().unwrap_or_default(),
                status.mode.map(|m| m.to_string()).unwrap_or_default()
            );
            if let Some(v) = status.variant_url {
                println!("  {} {}", style("variant:").dim(), v);
            }
            return;
        }
        if run < retries {
            println!("  {}", style("Retrying...").yellow());
        }
    }

    println!();
    println!(
        "{} {}",
        style("Stream unavailable.").red().bold(),
        style("Try again later or pass --retries.").dim()
    );
    std::process::exit(1);
}

async fn print_new_events(session: &PlaybackSession, seen: &mut HashSet<String>) {
    let events = session.events().await;
    for ev in events.iter().rev() {
        if !seen.insert(ev.id.clone()) {
            continue;
        }
        let ts = ev.timestamp.format("%H:%M:%S");
        let kind_str = format!("{:<12}", ev.kind.to_string());
        let colored_kind = match ev.kind {
            PlaybackEventKind::Attached => style(kind_str).green(),
            PlaybackEventKind::AttemptFailed
            | PlaybackEventKind::AttemptTimedOut
            | PlaybackEventKind::Exhausted => style(kind_str).red(),
            PlaybackEventKind::RetryRequested => style(kind_str).yellow(),
            PlaybackEventKind::AttemptStarted => style(kind_str).dim(),
        };
        println!(
            "  {}  {} {}  {}",
            style(ts).dim(),
            colored_kind,
            ev.url,
            style(&ev.details).dim()
        );
    }
}

fn format_separator(refresh_num: u64) -> String {
    let label = if refresh_num == 0 {
        String::new()
    } else {
        format!(" refresh {} ", refresh_num)
    };
    let width = 54usize.saturating_sub(label.len());
    format!(
        "{}{}{}",
        style("──").dim(),
        style(label).dim().bold(),
        style("─".repeat(width)).dim()
    )
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}

//! Operator console for the photo presenter.
//!
//! Commands are read from stdin one per line; the presenter runs as a
//! background task fed through a `PresenterHandle`.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use photo_presenter::collection::SortKey;
use photo_presenter::config::Settings;
use photo_presenter::events::{PresenterCommand, PresenterEvent};
use photo_presenter::monitor::{self, MonitorGeometry, StaticMonitors};
use photo_presenter::session::Session;
use photo_presenter::tasks::presenter::{self, HeadlessSurface, PresenterHandle};

const DEFAULT_DISPLAY: MonitorGeometry = MonitorGeometry::new(0, 0, 1920, 1080);

#[derive(Debug, Parser)]
#[command(
    name = "photo-presenter",
    version,
    about = "Browse a photo folder and present it on a second display"
)]
struct Args {
    /// Settings file (defaults to settings.yaml beside the executable)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Folder to open at startup instead of the remembered one
    #[arg(long, value_name = "DIR")]
    folder: Option<PathBuf>,
    /// Display geometry WIDTHxHEIGHT+LEFT+TOP (repeatable, in OS order)
    #[arg(long = "display", value_name = "GEOMETRY")]
    displays: Vec<MonitorGeometry>,
    /// Index of the display hosting this console; never used for presentation
    #[arg(long, value_name = "N")]
    control_display: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("photo_presenter={level}")))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

/// One line of operator input.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Next,
    Prev,
    Select(usize),
    RotateLeft,
    RotateRight,
    Show(bool),
    Black(bool),
    Monitor(usize),
    Sort(SortKey, bool),
    Open(PathBuf),
    Status,
    Snapshot(PathBuf),
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let rest: Vec<&str> = words.collect();
        let index = |what: &str| -> Result<usize> {
            rest.first()
                .ok_or_else(|| anyhow!("{verb} needs {what}"))?
                .parse()
                .with_context(|| format!("invalid {what}"))
        };
        let path = |what: &str| -> Result<PathBuf> {
            let joined = rest.join(" ");
            if joined.is_empty() {
                bail!("{verb} needs {what}");
            }
            Ok(PathBuf::from(joined))
        };

        Ok(match verb {
            "next" | "n" => Command::Next,
            "prev" | "p" => Command::Prev,
            "select" => Command::Select(index("an index")?),
            "left" => Command::RotateLeft,
            "right" => Command::RotateRight,
            "show" => Command::Show(true),
            "hide" => Command::Show(false),
            "black" => Command::Black(true),
            "unblack" => Command::Black(false),
            "monitor" => Command::Monitor(index("a monitor index")?),
            "sort" => {
                let key = match rest.first().copied() {
                    Some("name") => SortKey::FileName,
                    Some("date") => SortKey::DateModified,
                    other => bail!("sort expects name or date, got {other:?}"),
                };
                let descending = match rest.get(1).copied() {
                    None | Some("asc") => false,
                    Some("desc") => true,
                    Some(other) => bail!("sort direction must be asc or desc, got {other:?}"),
                };
                Command::Sort(key, descending)
            }
            "open" => Command::Open(path("a folder")?),
            "status" => Command::Status,
            "snapshot" => Command::Snapshot(path("a file")?),
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command {other:?}"),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        settings: settings_path,
        folder,
        displays,
        control_display,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let settings_path = settings_path.unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load_or_default(&settings_path);
    info!(path = %settings_path.display(), "settings loaded");

    let mut monitors = if displays.is_empty() {
        vec![DEFAULT_DISPLAY]
    } else {
        displays
    };
    if let Some(idx) = control_display {
        match monitors.get_mut(idx) {
            Some(m) => m.hosts_control = true,
            None => warn!(idx, "control display index out of range; ignored"),
        }
    }
    match monitor::preferred_index(&monitors, settings.monitor_index) {
        Some(idx) => settings.monitor_index = idx,
        None => warn!("no display free for presentation; show stays unavailable"),
    }
    for (idx, m) in monitors.iter().enumerate() {
        info!(idx, geometry = %m, control = m.hosts_control, "display");
    }

    let cancel = CancellationToken::new();
    let (cmd_tx, cmd_rx) = mpsc::channel::<PresenterCommand>(32); // Session -> Presenter
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PresenterEvent>(); // Presenter -> log

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let cancel = cancel.clone();
        let monitors = StaticMonitors(monitors);
        let oversample = settings.oversample;
        async move {
            presenter::run(
                cmd_rx,
                event_tx,
                monitors,
                |_: &MonitorGeometry| HeadlessSurface::default(),
                oversample,
                cancel,
            )
            .await
            .context("presenter task failed")
        }
    });
    tasks.spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PresenterEvent::Displayed(path) => info!(path = %path.display(), "displayed"),
                PresenterEvent::Discarded(path) => info!(path = %path.display(), "superseded"),
                PresenterEvent::Failed(path) => warn!(path = %path.display(), "preview failed"),
            }
        }
        Ok(())
    });

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut session = Session::new(settings, PresenterHandle::new(cmd_tx));
    let startup_folder = folder.or_else(|| session.settings().last_folder.clone());
    if let Some(dir) = startup_folder {
        if dir.is_dir() {
            report(session.open_folder(&dir).await.map(|_| ()), &session);
        } else {
            warn!(dir = %dir.display(), "startup folder missing; skipped");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else {
            info!("stdin closed; initiating shutdown");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(err) = execute(&mut session, command).await {
            println!("error: {err:#}");
        }
    }

    if let Err(err) = session.set_show(false).await {
        warn!("failed to turn presenter off: {err}");
    }
    if let Err(err) = session.settings().save(&settings_path) {
        warn!("{err:#}");
    }
    cancel.cancel();
    drop(session);

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    Ok(())
}

async fn execute(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Next => {
            session.next().await?;
            print_selection(session);
        }
        Command::Prev => {
            session.previous().await?;
            print_selection(session);
        }
        Command::Select(idx) => {
            session.select(idx).await?;
            print_selection(session);
        }
        Command::RotateLeft => session.rotate_counter_clockwise().await?,
        Command::RotateRight => session.rotate_clockwise().await?,
        Command::Show(show) => {
            if let Some(geometry) = session.set_show(show).await? {
                println!("showing on {geometry}");
            }
        }
        Command::Black(black) => session.set_black(black).await?,
        Command::Monitor(idx) => {
            if let Some(geometry) = session.set_monitor(idx).await? {
                println!("moved to {geometry}");
            }
        }
        Command::Sort(key, descending) => {
            session.set_sort(key, descending);
            print_selection(session);
        }
        Command::Open(dir) => report(session.open_folder(&dir).await.map(|_| ()), session),
        Command::Status => {
            println!("{}", session.status());
            print_selection(session);
            let status = session.presenter().status().await?;
            println!(
                "presenter: {:?}, front: {}, black: {}, monitor: {}, animating: {}",
                status.phase,
                status
                    .front
                    .as_deref()
                    .map_or_else(|| "-".into(), |p| p.display().to_string()),
                status.black,
                status
                    .monitor
                    .map_or_else(|| "-".into(), |(idx, g)| format!("{idx} ({g})")),
                status.animating,
            );
        }
        Command::Snapshot(file) => {
            let frame = session
                .presenter()
                .snapshot()
                .await?
                .ok_or_else(|| anyhow!("presenter is off"))?;
            let target = file.clone();
            tokio::task::spawn_blocking(move || frame.save(&target))
                .await
                .context("snapshot worker failed")?
                .with_context(|| format!("writing {}", file.display()))?;
            println!("wrote {}", file.display());
        }
        Command::Quit => {}
    }
    Ok(())
}

fn report(result: Result<(), photo_presenter::Error>, session: &Session) {
    if let Err(err) = result {
        warn!("{err}");
    }
    println!("{}", session.status());
}

fn print_selection(session: &Session) {
    let collection = session.collection();
    match (collection.selected_index(), collection.selected()) {
        (Some(idx), Some(item)) => println!(
            "[{}/{}] {} ({}°)",
            idx + 1,
            collection.len(),
            item.display_name(),
            item.rotation().degrees()
        ),
        _ => println!("no selection"),
    }
}

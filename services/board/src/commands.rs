//! Command handlers for the CLI

use std::sync::Arc;

use anyhow::Context;
use reconciler::notify::{self, Notification};
use reconciler::reconciler::SIGN_UP_MESSAGE;
use reconciler::{Config, LiveSession, Reconciler, RestBackend, SessionCell};
use tokio::sync::watch;
use types::ids::UserId;
use types::session::Credentials;

type Board = Reconciler<RestBackend>;

fn connect(config: &Config) -> anyhow::Result<Board> {
    let backend = Arc::new(RestBackend::new(&config.backend)?);
    Ok(Reconciler::new(
        backend,
        SessionCell::new(),
        config.reconciler.clone(),
    ))
}

fn require(credentials: Option<Credentials>) -> anyhow::Result<Credentials> {
    credentials.context("--email and --password are required for this command")
}

/// Sign in when credentials are given, then load both relations.
async fn open(board: &mut Board, credentials: Option<Credentials>) -> anyhow::Result<()> {
    if let Some(credentials) = credentials {
        board.sign_in(&credentials).await?;
    }
    let report = board.load().await;
    for failure in &report.failures {
        eprintln!("warning: {}", failure);
    }
    Ok(())
}

pub async fn standings(config: &Config, credentials: Option<Credentials>) -> anyhow::Result<()> {
    let mut board = connect(config)?;
    open(&mut board, credentials).await?;

    let view = board.view();
    if view.is_empty() {
        println!("No players yet.");
    } else {
        print!("{}", view.render());
    }
    if board.needs_first_name() {
        println!();
        println!("You have not set a first name yet. Use `board set-name <name>`.");
    }
    Ok(())
}

pub async fn players(config: &Config, credentials: Option<Credentials>) -> anyhow::Result<()> {
    let mut board = connect(config)?;
    open(&mut board, credentials).await?;

    for option in board.loser_options() {
        println!("{}  {}", option.value, option.label);
    }
    Ok(())
}

pub async fn win(
    config: &Config,
    credentials: Option<Credentials>,
    loser: String,
) -> anyhow::Result<()> {
    let mut board = connect(config)?;
    open(&mut board, Some(require(credentials)?)).await?;

    let loser = UserId::new(loser);
    let stored = board.submit_win(Some(&loser)).await?;
    let name = board
        .snapshot()
        .profiles
        .iter()
        .find(|p| p.id == loser)
        .map(|p| p.display_name())
        .unwrap_or_else(|| loser.short());

    println!("Win over {} recorded at {}", name, stored.created_at.to_rfc3339());
    println!();
    print!("{}", board.view().render());
    Ok(())
}

pub async fn set_name(
    config: &Config,
    credentials: Option<Credentials>,
    name: String,
) -> anyhow::Result<()> {
    let mut board = connect(config)?;
    let credentials = require(credentials)?;
    let viewer = board.sign_in(&credentials).await?;

    let saved = board.set_first_name(&viewer, &name).await?;
    println!("First name set to {}", saved);
    Ok(())
}

pub async fn sign_up(config: &Config, credentials: Option<Credentials>) -> anyhow::Result<()> {
    let mut board = connect(config)?;
    board.sign_up(&require(credentials)?).await?;
    println!("{}", SIGN_UP_MESSAGE);
    Ok(())
}

/// Run a live session until Ctrl-C, reprinting the table on every change.
pub async fn watch(config: &Config, credentials: Option<Credentials>) -> anyhow::Result<()> {
    let (notifier, center) = notify::channel(&config.notify);
    spawn_printer(center.watch());
    tokio::spawn(center.run());

    let mut board = connect(config)?.with_notifier(notifier);
    if let Some(credentials) = credentials {
        board.sign_in(&credentials).await?;
    }

    let (session, handle) = LiveSession::new(board, 32);
    let mut view = handle.view();
    let mut task = tokio::spawn(session.run(async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    loop {
        tokio::select! {
            biased;

            finished = &mut task => {
                let summary = finished??;
                tracing::info!(
                    changes = summary.changes,
                    commands = summary.commands,
                    "Watch finished"
                );
                break;
            }

            changed = view.changed() => {
                if changed.is_ok() {
                    let table = view.borrow_and_update().render();
                    println!("{}", table);
                }
            }
        }
    }

    drop(handle);
    Ok(())
}

/// Print each notification once, as it is shown.
fn spawn_printer(mut shown: watch::Receiver<Vec<Notification>>) {
    tokio::spawn(async move {
        let mut last_id = 0;
        while shown.changed().await.is_ok() {
            let fresh: Vec<Notification> = shown
                .borrow_and_update()
                .iter()
                .filter(|n| n.id > last_id)
                .cloned()
                .collect();
            for notification in fresh {
                last_id = notification.id;
                eprintln!("[{:?}] {}", notification.kind, notification.message);
            }
        }
    });
}

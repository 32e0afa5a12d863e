//! Session-owning driver that wires the live channel to the reconciler.

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::GameApi;
use crate::channel::{ChannelManager, ConnectionState};
use crate::config::{ClientConfig, RenderMode};
use crate::domain::{MoveRequest, Session};
use crate::protocol::Notification;
use crate::reconciler::{ReconcileError, Reconciled, StateReconciler};
use crate::transport::Connector;
use crate::view::GameContainer;

/// Largest board the server creates.
const MAX_BOARD_SIZE: usize = 5;

/// Things the hosting page (or terminal) asks the driver to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Navigate to a game, replacing whatever was being watched.
    Enter(Session),
    /// Leave the current game without entering another.
    Leave,
    /// Click a cell.
    Play { row: usize, col: usize },
    /// Take the open seat in the current game under `name`.
    Join { name: String },
    /// Start the current game. Only its creator may.
    Start,
}

impl Command {
    /// Parse a terminal line: `move B2`, `game <id|route>`, `join <name>`,
    /// `start` or `leave`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("move" | "m") => {
                let coord = words.next().ok_or("Usage: move <coord> (e.g., B2)")?;
                let (row, col) = parse_coord(coord)?;
                Ok(Command::Play { row, col })
            }
            Some("game" | "g") => {
                let route = words.next().ok_or("Usage: game <id or route>")?;
                Session::from_route(route)
                    .map(Command::Enter)
                    .ok_or_else(|| format!("No game id in '{}'", route))
            }
            Some("join" | "j") => {
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err("Usage: join <player name>".to_string());
                }
                Ok(Command::Join { name })
            }
            Some("start") => Ok(Command::Start),
            Some("leave") => Ok(Command::Leave),
            Some(other) => Err(format!("Unknown command '{}'", other)),
            None => Err("Empty input".to_string()),
        }
    }
}

/// Column letter then 1-based row, e.g. `A1` is the top-left cell.
pub fn parse_coord(input: &str) -> Result<(usize, usize), String> {
    let mut chars = input.chars();
    let col_ch = chars
        .next()
        .ok_or("Empty coordinate")?
        .to_ascii_uppercase();
    if !col_ch.is_ascii_alphabetic() {
        return Err(format!("Invalid column '{}' - must be a letter", col_ch));
    }
    let col = (col_ch as u8 - b'A') as usize;
    if col >= MAX_BOARD_SIZE {
        return Err(format!("Column '{}' out of bounds", col_ch));
    }
    let row_str: String = chars.collect();
    let row: usize = row_str
        .parse()
        .map_err(|_| format!("Invalid row '{}' - must be a number", row_str))?;
    if row == 0 || row > MAX_BOARD_SIZE {
        return Err(format!("Row {} out of bounds", row));
    }
    Ok((row - 1, col))
}

/// Letter for the first 26 columns, 1-based number past that.
pub fn column_label(col: usize) -> String {
    match u8::try_from(col) {
        Ok(c) if c < 26 => char::from(b'A' + c).to_string(),
        _ => (col + 1).to_string(),
    }
}

pub fn coord_to_string(row: usize, col: usize) -> String {
    if col < 26 {
        format!("{}{}", column_label(col), row + 1)
    } else {
        format!("({},{})", row + 1, col + 1)
    }
}

enum Event {
    Push(Notification),
    Opened(String),
}

pub struct LiveGame<C: Connector, A: GameApi, V: GameContainer> {
    channel: ChannelManager<C>,
    reconciler: StateReconciler<A, V>,
    session: Option<Session>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl<C: Connector, A: GameApi, V: GameContainer> LiveGame<C, A, V> {
    pub fn new(
        mut channel: ChannelManager<C>,
        reconciler: StateReconciler<A, V>,
        config: &ClientConfig,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let push_tx = tx.clone();
        channel.on_message(move |notification| {
            let _ = push_tx.send(Event::Push(notification.clone()));
        });
        if config.resync_on_open {
            channel.on_open(move |session| {
                let _ = tx.send(Event::Opened(session.game_id.clone()));
            });
        }
        Self {
            channel,
            reconciler,
            session: None,
            events,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn channel(&self) -> &ChannelManager<C> {
        &self.channel
    }

    pub fn reconciler(&self) -> &StateReconciler<A, V> {
        &self.reconciler
    }

    /// Drive the session until `commands` is closed. All reconciliations run
    /// interleaved on this one task.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        let Self {
            channel,
            reconciler,
            session,
            events,
        } = self;
        let reconciler = &*reconciler;
        let mut inflight = FuturesUnordered::new();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Enter(mut next)) => {
                        let same_game = session.as_ref().is_some_and(|current| current.same_game(&next));
                        if same_game && next.local_player_id.is_none() {
                            next.local_player_id = session.as_ref().and_then(|c| c.local_player_id.clone());
                        }
                        if same_game && channel.state() == ConnectionState::Open {
                            // attach would be a no-op and no open event follows
                            debug!(game_id = %next.game_id, "already watching, refreshing view");
                            inflight.push(reconcile_for(reconciler, next.clone()));
                        } else {
                            info!(game_id = %next.game_id, "entering game");
                            reconciler.begin_session(&next.game_id);
                            channel.attach(&next).await;
                        }
                        *session = Some(next);
                    }
                    Some(Command::Leave) => {
                        channel.teardown().await;
                        reconciler.end_session();
                        if let Some(left) = session.take() {
                            info!(game_id = %left.game_id, "left game");
                        }
                    }
                    Some(Command::Play { row, col }) => {
                        if let Err(e) = play(reconciler, session.as_ref(), row, col).await {
                            warn!(error = %e, "move not sent");
                        }
                    }
                    Some(Command::Join { name }) => {
                        if let Err(e) = join(reconciler, session.as_mut(), &name).await {
                            warn!(error = %e, "join failed");
                        }
                    }
                    Some(Command::Start) => {
                        if let Err(e) = start(reconciler, session.as_ref()).await {
                            warn!(error = %e, "start failed");
                        }
                    }
                    None => break,
                },
                Some(event) = events.recv() => {
                    let Some(current) = session.as_ref() else {
                        continue;
                    };
                    match event {
                        Event::Push(n) if n.game_id != current.game_id => {
                            debug!(game_id = %n.game_id, "ignoring push for a game no longer shown");
                        }
                        Event::Push(n) if !StateReconciler::<A, V>::classify(&n.message) => {
                            debug!(kind = n.message.kind.as_str(), "ignoring push");
                        }
                        Event::Push(_) => inflight.push(reconcile_for(reconciler, current.clone())),
                        Event::Opened(game_id) if game_id == current.game_id => {
                            inflight.push(reconcile_for(reconciler, current.clone()));
                        }
                        Event::Opened(_) => {}
                    }
                }
                Some((target, outcome)) = inflight.next() => {
                    record(session, &target, outcome);
                }
            }
        }

        channel.teardown().await;
        reconciler.end_session();
        Ok(())
    }

    /// Close the live channel. Used when `run` is abandoned mid-flight.
    pub async fn shutdown(&mut self) {
        self.channel.teardown().await;
        self.reconciler.end_session();
    }
}

async fn reconcile_for<A: GameApi, V: GameContainer>(
    reconciler: &StateReconciler<A, V>,
    session: Session,
) -> (Session, Result<Reconciled, ReconcileError>) {
    let outcome = reconciler.reconcile(&session).await;
    (session, outcome)
}

fn record(
    session: &mut Option<Session>,
    target: &Session,
    outcome: Result<Reconciled, ReconcileError>,
) {
    match outcome {
        Ok(Reconciled::Applied {
            seq,
            resolved_player,
            ..
        }) => {
            debug!(game_id = %target.game_id, seq, "view reconciled");
            let Some(current) = session.as_mut() else {
                return;
            };
            if current.same_game(target) && current.local_player_id.is_none() {
                if let Some(player) = resolved_player {
                    info!(game_id = %current.game_id, player_id = %player, "resolved local player");
                    current.local_player_id = Some(player);
                }
            }
        }
        Ok(Reconciled::Discarded { seq, applied }) => {
            debug!(game_id = %target.game_id, seq, applied, "stale response dropped");
        }
        Err(e) => warn!(error = %e, "reconciliation failed, keeping last known view"),
    }
}

async fn play<A: GameApi, V: GameContainer>(
    reconciler: &StateReconciler<A, V>,
    session: Option<&Session>,
    row: usize,
    col: usize,
) -> anyhow::Result<()> {
    let session = session.ok_or_else(|| anyhow::anyhow!("Not watching a game"))?;
    let player_id = session
        .local_player_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Local player unknown, spectators cannot move"))?;

    // Fragment mode has no local view; the server validates the move.
    if reconciler.mode() == RenderMode::Snapshot {
        let playable = reconciler
            .last_view()
            .is_some_and(|view| view.is_clickable(row, col));
        if !playable {
            return Err(anyhow::anyhow!(
                "Cell {} is not playable right now",
                coord_to_string(row, col)
            ));
        }
    }

    reconciler
        .api()
        .submit_move(
            &session.game_id,
            &MoveRequest {
                player_id,
                row,
                col,
            },
        )
        .await?;
    info!(game_id = %session.game_id, cell = %coord_to_string(row, col), "move sent");
    Ok(())
}

async fn join<A: GameApi, V: GameContainer>(
    reconciler: &StateReconciler<A, V>,
    session: Option<&mut Session>,
    name: &str,
) -> anyhow::Result<()> {
    let session = session.ok_or_else(|| anyhow::anyhow!("Not watching a game"))?;
    if let Some(player) = &session.local_player_id {
        return Err(anyhow::anyhow!("Already seated as {}", player));
    }
    let joined = reconciler.api().join_game(&session.game_id, name).await?;
    info!(game_id = %session.game_id, player_id = %joined.player_id, "joined game");
    session.local_player_id = Some(joined.player_id);
    Ok(())
}

async fn start<A: GameApi, V: GameContainer>(
    reconciler: &StateReconciler<A, V>,
    session: Option<&Session>,
) -> anyhow::Result<()> {
    let session = session.ok_or_else(|| anyhow::anyhow!("Not watching a game"))?;
    let player_id = session
        .local_player_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Local player unknown, join the game first"))?;
    reconciler.api().start_game(&session.game_id, player_id).await?;
    info!(game_id = %session.game_id, "game started");
    Ok(())
}

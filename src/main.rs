use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use ticky_sync::{
    init_logging, ChannelManager, ClientConfig, Command, GameApi, HttpGameApi, LiveGame,
    MoveRequest, RenderMode, Session, StateReconciler, TerminalView, WsConnector,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Snapshot,
    Fragment,
}

impl From<Mode> for RenderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Snapshot => RenderMode::Snapshot,
            Mode::Fragment => RenderMode::Fragment,
        }
    }
}

#[derive(Args)]
struct ServerArgs {
    #[arg(long, env = "TICKY_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,
    #[arg(long, env = "TICKY_COOKIE", help = "Cookie header carrying the player's session")]
    cookie: Option<String>,
}

#[derive(Args)]
struct GameArgs {
    #[arg(long, help = "Game id, page route (/game/<id>) or full game URL")]
    game: String,
    #[arg(long, help = "Local player id; omit to watch as a spectator")]
    player: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a game live, re-rendering on every state change.
    Watch {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        game: GameArgs,
        #[arg(long, value_enum, default_value_t = Mode::Snapshot)]
        mode: Mode,
    },
    /// Fetch and render the current state once.
    Show {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        game: GameArgs,
        #[arg(long, value_enum, default_value_t = Mode::Snapshot)]
        mode: Mode,
    },
    /// Submit a single move, e.g. `--cell B2`.
    Move {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        game: GameArgs,
        #[arg(long)]
        cell: String,
    },
    /// Take the open seat in a waiting game and print the assigned player id.
    Join {
        #[command(flatten)]
        server: ServerArgs,
        #[arg(long, help = "Game id, page route (/game/<id>) or full game URL")]
        game: String,
        #[arg(long)]
        name: String,
    },
    /// Start a waiting game. Only its creator may.
    Start {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        game: GameArgs,
    },
}

fn build_config(server: &ServerArgs, mode: RenderMode) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::new(&server.server)?.with_render_mode(mode);
    if let Some(cookie) = &server.cookie {
        config = config.with_session_cookie(cookie.clone());
    }
    Ok(config)
}

fn build_session(game: &GameArgs) -> anyhow::Result<Session> {
    let session = Session::from_route(&game.game)
        .ok_or_else(|| anyhow::anyhow!("No game id in '{}'", game.game))?;
    Ok(match &game.player {
        Some(player) => session.with_player(player.clone()),
        None => session,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { server, game, mode } => {
            let config = build_config(&server, mode.into())?;
            let session = build_session(&game)?;
            let api = HttpGameApi::new(config.clone())?;
            let connector = WsConnector::new().with_session_cookie(config.session_cookie.clone());
            let channel = ChannelManager::new(connector, config.clone());
            let view = TerminalView::new(std::io::stdout(), session.local_player_id.clone());
            let reconciler = StateReconciler::new(api, view, config.render_mode);
            let mut live = LiveGame::new(channel, reconciler, &config);

            let (tx, rx) = mpsc::channel(16);
            tx.send(Command::Enter(session)).await?;
            tokio::spawn(read_commands(tx));

            tokio::select! {
                res = live.run(rx) => res?,
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
            }
            live.shutdown().await;
        }
        Commands::Show { server, game, mode } => {
            let config = build_config(&server, mode.into())?;
            let session = build_session(&game)?;
            let api = HttpGameApi::new(config.clone())?;
            let view = TerminalView::new(std::io::stdout(), session.local_player_id.clone());
            let reconciler = StateReconciler::new(api, view, config.render_mode);
            reconciler.begin_session(&session.game_id);
            reconciler.reconcile(&session).await?;
            println!();
        }
        Commands::Move { server, game, cell } => {
            let config = build_config(&server, RenderMode::Snapshot)?;
            let session = build_session(&game)?;
            let player_id = session
                .local_player_id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--player is required to move"))?;
            let (row, col) = ticky_sync::client::parse_coord(&cell).map_err(|e| anyhow::anyhow!(e))?;
            let api = HttpGameApi::new(config)?;
            api.submit_move(&session.game_id, &MoveRequest { player_id, row, col })
                .await?;
            println!("Move {} sent.", cell.to_ascii_uppercase());
        }
        Commands::Join { server, game, name } => {
            let config = build_config(&server, RenderMode::Snapshot)?;
            let session = Session::from_route(&game)
                .ok_or_else(|| anyhow::anyhow!("No game id in '{}'", game))?;
            let api = HttpGameApi::new(config)?;
            let joined = api.join_game(&session.game_id, &name).await?;
            println!("Joined {} as {}.", session.game_id, joined.player_id);
        }
        Commands::Start { server, game } => {
            let config = build_config(&server, RenderMode::Snapshot)?;
            let session = build_session(&game)?;
            let player_id = session
                .local_player_id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--player is required to start"))?;
            let api = HttpGameApi::new(config)?;
            api.start_game(&session.game_id, &player_id).await?;
            println!("Game {} started.", session.game_id);
        }
    }
    Ok(())
}

/// Forward stdin lines to the live game. `quit` ends the session; when stdin
/// runs dry the game keeps streaming until interrupted.
async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "q" {
            return;
        }
        match Command::parse(line) {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
    tx.closed().await;
}

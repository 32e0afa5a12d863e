//! View state derived from a snapshot, and the container it is applied to.

use scraper::{Html, Selector};
use serde::Serialize;

use crate::domain::{GameSnapshot, GameStatus};

/// Element id of the region the server renders a game into.
pub const GAME_CONTAINER_ID: &str = "game-container";

/// Attribute the rendered game container uses to declare the viewer.
pub const PLAYER_ID_ATTRIBUTE: &str = "data-player-id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellView {
    pub value: Option<String>,
    pub clickable: bool,
}

/// How the status line should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusStyle {
    Waiting,
    YourTurn,
    TheirTurn,
    Won,
    Lost,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub cells: Vec<Vec<CellView>>,
    pub status_text: String,
    pub status_style: StatusStyle,
}

impl ViewState {
    pub fn is_clickable(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .is_some_and(|c| c.clickable)
    }

    pub fn clickable_cells(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.clickable {
                    out.push((r, c));
                }
            }
        }
        out
    }
}

fn is_empty(cell: &Option<String>) -> bool {
    cell.as_deref().map_or(true, str::is_empty)
}

/// Recompute the whole view from a snapshot. Without a local player the
/// viewer is a spectator: nothing is clickable and the status is phrased in
/// the third person.
pub fn derive_view(snapshot: &GameSnapshot, local_player: Option<&str>) -> ViewState {
    let current = snapshot.current_player.as_deref();
    let my_turn = snapshot.game_status == GameStatus::InProgress
        && local_player.is_some()
        && current == local_player;

    let cells = snapshot
        .board
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| CellView {
                    value: cell.clone().filter(|v| !v.is_empty()),
                    clickable: my_turn && is_empty(cell),
                })
                .collect()
        })
        .collect();

    let (status_text, status_style) = match snapshot.game_status {
        GameStatus::Waiting => ("Waiting for players…".to_string(), StatusStyle::Waiting),
        GameStatus::InProgress if my_turn => ("Your turn!".to_string(), StatusStyle::YourTurn),
        GameStatus::InProgress => {
            let name = current.map(|id| snapshot.display_name(id)).unwrap_or("opponent");
            (format!("Waiting for {name}…"), StatusStyle::TheirTurn)
        }
        GameStatus::Finished => match snapshot.winner.as_deref() {
            None => ("It's a draw!".to_string(), StatusStyle::Draw),
            Some(winner) if Some(winner) == local_player => {
                ("You won!".to_string(), StatusStyle::Won)
            }
            Some(winner) => (
                format!("{} won!", snapshot.display_name(winner)),
                StatusStyle::Lost,
            ),
        },
    };

    ViewState {
        cells,
        status_text,
        status_style,
    }
}

/// The bounded view region a reconciler may touch. Implementations own
/// whatever sits behind it (a DOM node, a terminal, a test recorder).
pub trait GameContainer: Send {
    /// Identity declared by the container itself, if any.
    fn declared_player_id(&self) -> Option<String>;

    /// Replace the container with a server-rendered fragment.
    fn replace_fragment(&mut self, html: &str);

    /// Apply a locally derived view.
    fn apply_view(&mut self, view: &ViewState);

    /// Re-attach click affordances to freshly inserted content.
    fn rebind(&mut self);
}

/// Identity declared by a server-rendered fragment on its game container,
/// e.g. `<div id="game-container" data-player-id="p1">`. Text inside the
/// container never counts, only the attribute on the container element.
pub fn declared_player_id(html: &str) -> Option<String> {
    let selector = Selector::parse(&format!("#{GAME_CONTAINER_ID}[{PLAYER_ID_ATTRIBUTE}]")).ok()?;
    let fragment = Html::parse_fragment(html);
    let container = fragment.select(&selector).next()?;
    container
        .value()
        .attr(PLAYER_ID_ATTRIBUTE)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

use std::io::Write;

use tracing::warn;

use crate::client::{column_label, coord_to_string};
use crate::view::{declared_player_id, GameContainer, StatusStyle, ViewState};

/// Wrap width for fragments rendered as text.
const TEXT_WIDTH: usize = 80;

/// [`GameContainer`] that draws the game into a terminal (or any writer).
pub struct TerminalView<W: Write + Send> {
    out: W,
    declared_player: Option<String>,
    playable: Vec<(usize, usize)>,
}

impl<W: Write + Send> TerminalView<W> {
    /// `declared_player` plays the role of the page's identity attribute.
    pub fn new(out: W, declared_player: Option<String>) -> Self {
        Self {
            out,
            declared_player,
            playable: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "terminal write failed");
        }
    }
}

/// Render a view as a labelled grid: `X`/`O` for marks, `+` for playable
/// cells and `.` for the rest. Columns are lettered, or numbered on boards
/// too wide for letters.
pub fn render_board(view: &ViewState) -> String {
    let width = view.cells.iter().map(Vec::len).max().unwrap_or(0);
    let labels: Vec<String> = if width > 26 {
        (1..=width).map(|c| c.to_string()).collect()
    } else {
        (0..width).map(column_label).collect()
    };
    let pad = labels
        .iter()
        .map(String::len)
        .chain(view.cells.iter().flatten().filter_map(|c| c.value.as_ref().map(String::len)))
        .max()
        .unwrap_or(1);

    let mut out = String::from("   ");
    for label in &labels {
        out.push_str(&format!(" {:>pad$}", label));
    }
    out.push('\n');
    for (r, row) in view.cells.iter().enumerate() {
        out.push_str(&format!("{:2} ", r + 1));
        for cell in row {
            let mark = match (&cell.value, cell.clickable) {
                (Some(mark), _) => mark.as_str(),
                (None, true) => "+",
                (None, false) => ".",
            };
            out.push_str(&format!(" {:>pad$}", mark));
        }
        out.push('\n');
    }
    out
}

fn status_banner(view: &ViewState) -> String {
    let decoration = match view.status_style {
        StatusStyle::YourTurn => ">>",
        StatusStyle::Won => "**",
        StatusStyle::Lost => "--",
        StatusStyle::Draw => "==",
        StatusStyle::Waiting | StatusStyle::TheirTurn => "..",
    };
    format!("{} {} {}\n", decoration, view.status_text, decoration)
}

/// Plain-text rendering of a server fragment, entities decoded.
pub fn fragment_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) => text.trim_end().to_string(),
        Err(e) => {
            warn!(error = %e, "could not render fragment as text");
            String::new()
        }
    }
}

impl<W: Write + Send> GameContainer for TerminalView<W> {
    fn declared_player_id(&self) -> Option<String> {
        self.declared_player.clone()
    }

    fn replace_fragment(&mut self, html: &str) {
        if let Some(player) = declared_player_id(html) {
            self.declared_player = Some(player);
        }
        self.playable.clear();
        let text = format!("\n{}\n", fragment_text(html));
        self.emit(&text);
    }

    fn apply_view(&mut self, view: &ViewState) {
        self.playable = view.clickable_cells();
        let text = format!("\n{}{}", render_board(view), status_banner(view));
        self.emit(&text);
    }

    fn rebind(&mut self) {
        if self.playable.is_empty() {
            return;
        }
        let cells: Vec<String> = self
            .playable
            .iter()
            .map(|&(r, c)| coord_to_string(r, c))
            .collect();
        let prompt = format!("Playable: {} (type `move <cell>`)\n> ", cells.join(" "));
        self.emit(&prompt);
    }
}

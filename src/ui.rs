//! Layout and drawing: board, active piece, ghost, next preview, stats, pause, game over.

use crate::app::Screen;
use crate::board::{Board, Cell};
use crate::piece::{TetrominoKind, bounding_box};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per board cell (two columns make a roughly square block).
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;
/// Rows the sidebar needs: next (6) + stats (6) + keys (9).
const SIDEBAR_HEIGHT: u16 = 21;

/// Duration of the line-clear flash (TachyonFX) in ms.
const LINE_CLEAR_FLASH_MS: u32 = 350;

const FILLED: &str = "██";
const GHOST: &str = "░░";
const EMPTY: &str = " ·";

/// Board size in terminal cells, border included.
fn board_outer_size(width: usize, height: usize) -> (u16, u16) {
    (width as u16 * CELL_WIDTH + 2, height as u16 + 2)
}

/// Smallest terminal (cols, rows) that fits board + sidebar.
pub fn required_terminal_size(width: usize, height: usize) -> (u16, u16) {
    let (bw, bh) = board_outer_size(width, height);
    (bw + SIDEBAR_WIDTH, bh.max(SIDEBAR_HEIGHT))
}

/// Everything the renderer reads in one frame.
pub struct View<'a> {
    pub board: &'a Board,
    pub theme: &'a Theme,
    pub screen: Screen,
    pub best: u32,
    pub show_ghost: bool,
}

/// Line-clear flash: rows to highlight plus the running effect.
///
/// The board has already compacted when the flash starts, so `rows` (the
/// indices the cleared lines occupied) now hold the stack that dropped into
/// their place. The flash marks where the lines were: those rows fade in
/// from white as the settled blocks appear.
#[derive(Default)]
pub struct LineClearFx {
    pub rows: Vec<usize>,
    pub effect: Option<Effect>,
    pub last_process: Option<Instant>,
}

impl LineClearFx {
    pub fn trigger(&mut self, rows: Vec<usize>) {
        self.rows = rows;
        self.effect = None;
        self.last_process = None;
    }

    pub fn is_active(&self) -> bool {
        !self.rows.is_empty()
    }

    /// True once the running flash has played out.
    pub fn is_done(&self) -> bool {
        self.effect.as_ref().is_some_and(|e| e.done())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Draw the current screen. When `flash` is active the cleared rows fade in from white.
pub fn draw(frame: &mut Frame, view: &View, flash: Option<&mut LineClearFx>, now: Instant) {
    let area = frame.area();
    let (need_w, need_h) = required_terminal_size(view.board.width(), view.board.height());
    if area.width < need_w || area.height < need_h {
        draw_too_small(frame, view.theme, area, need_w, need_h);
        return;
    }

    let board_rect = draw_game(frame, view, area);
    if let Some(flash) = flash.filter(|f| f.is_active()) {
        apply_line_clear_effect(frame, view.theme, board_rect, flash, now);
    }
    match view.screen {
        Screen::Playing => {}
        Screen::Paused => draw_pause_overlay(frame, view.theme, area),
        Screen::GameOver => draw_game_over(frame, view, area),
    }
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect, need_w: u16, need_h: u16) {
    let lines = vec![
        Line::from(Span::styled(
            " Terminal too small ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Need {need_w}×{need_h}, have {}×{}", area.width, area.height),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled("Q — Quit", Style::default().fg(theme.inactive_fg))),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(area, frame.buffer_mut());
}

/// Create or advance the flash effect over the cleared rows of `board_rect`.
fn apply_line_clear_effect(
    frame: &mut Frame,
    theme: &Theme,
    board_rect: Rect,
    flash: &mut LineClearFx,
    now: Instant,
) {
    let delta = flash
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    flash.last_process = Some(now);

    if flash.effect.is_none() {
        let top = board_rect.y;
        let rows: HashSet<u16> = flash.rows.iter().map(|&r| r as u16).collect();
        let filter =
            CellFilter::PositionFn(ref_count(move |pos: Position| in_flash_rows(top, &rows, pos)));
        let effect = fx::fade_from(
            Color::White,
            theme.bg,
            (LINE_CLEAR_FLASH_MS, Interpolation::QuadOut),
        )
        .with_filter(filter)
        .with_area(board_rect);
        flash.effect = Some(effect);
    }

    if let Some(effect) = flash.effect.as_mut() {
        frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
    }
}

/// True for screen cells on one of the flashed board rows; `top` is the
/// screen row of board row 0.
fn in_flash_rows(top: u16, rows: &HashSet<u16>, pos: Position) -> bool {
    pos.y >= top && rows.contains(&(pos.y - top))
}

/// Draw board + sidebar centred in `area`. Returns the board's inner rect.
fn draw_game(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let (bw, bh) = board_outer_size(view.board.width(), view.board.height());
    let total_w = bw + SIDEBAR_WIDTH;
    let total_h = bh.max(SIDEBAR_HEIGHT);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let board_area = Rect {
        height: bh,
        ..inner[0]
    };

    let board_rect = draw_board(frame, view, board_area);
    draw_sidebar(frame, view, inner[1]);
    board_rect
}

fn draw_board(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let theme = view.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Tetrixtui ", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let board = view.board;
    let buf = frame.buffer_mut();
    for (row, cells) in board.grid().rows().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let (symbol, fg) = match *cell {
                Cell::Block(i) => (FILLED, theme.piece_color(i)),
                Cell::Empty => (EMPTY, theme.div_line),
            };
            put_cell(buf, inner, row as i32, col as i32, symbol, fg, theme.bg);
        }
    }

    if view.show_ghost && board.is_playing() {
        if let (Some(ghost), Some(active)) = (board.ghost(), board.active()) {
            let fg = theme.piece_color(ghost.color_index());
            if ghost.y != active.y {
                for (row, col) in ghost.board_cells() {
                    put_cell(buf, inner, row, col, GHOST, fg, theme.bg);
                }
            }
        }
    }

    if let Some((cells, color)) = board.active_cells() {
        let fg = theme.piece_color(color);
        for (row, col) in cells {
            put_cell(buf, inner, row, col, FILLED, fg, theme.bg);
        }
    }
    inner
}

/// Paint one board cell; cells above the top or outside `inner` are skipped.
fn put_cell(buf: &mut Buffer, inner: Rect, row: i32, col: i32, symbol: &str, fg: Color, bg: Color) {
    if row < 0 || col < 0 {
        return;
    }
    let x = inner.x + col as u16 * CELL_WIDTH;
    let y = inner.y + row as u16;
    if x + CELL_WIDTH > inner.x + inner.width || y >= inner.y + inner.height {
        return;
    }
    buf.set_string(x, y, symbol, Style::default().fg(fg).bg(bg));
}

fn sidebar_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let hint_style = Style::default().fg(theme.inactive_fg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Next (border + title + preview)
            Constraint::Length(6), // Stats
            Constraint::Length(9), // Keys
        ])
        .split(area);

    let next_block = sidebar_block(theme);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(2)])
        .split(next_inner);
    Paragraph::new(Line::from(Span::styled("Next", title_style)))
        .render(next_layout[0], frame.buffer_mut());
    draw_piece_preview(frame.buffer_mut(), theme, next_layout[1], view.board.next());

    let stat = |label: &'static str, value: u32| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value.to_string(), fg_style),
        ])
    };
    let stats = vec![
        stat("Score: ", view.board.score()),
        stat("Best:  ", view.best),
        stat("Level: ", view.board.level()),
        stat("Lines: ", view.board.lines()),
    ];
    let stats_block = sidebar_block(theme);
    let stats_inner = stats_block.inner(chunks[1]);
    stats_block.render(chunks[1], frame.buffer_mut());
    Paragraph::new(stats).render(stats_inner, frame.buffer_mut());

    let keys = vec![
        Line::from(Span::styled("←/→ h/l  move", hint_style)),
        Line::from(Span::styled("↑ k     rotate", hint_style)),
        Line::from(Span::styled("u z     rotate ccw", hint_style)),
        Line::from(Span::styled("↓ j     soft drop", hint_style)),
        Line::from(Span::styled("space   hard drop", hint_style)),
        Line::from(Span::styled("p pause  r restart", hint_style)),
        Line::from(Span::styled("q quit", hint_style)),
    ];
    let keys_block = sidebar_block(theme);
    let keys_inner = keys_block.inner(chunks[2]);
    keys_block.render(chunks[2], frame.buffer_mut());
    Paragraph::new(keys).render(keys_inner, frame.buffer_mut());
}

/// Draw `kind` in its spawn orientation, centred in `area`.
fn draw_piece_preview(buf: &mut Buffer, theme: &Theme, area: Rect, kind: TetrominoKind) {
    let shape = &kind.states()[0];
    let (rows, cols) = bounding_box(shape);
    let off_x = area.width.saturating_sub(cols as u16 * CELL_WIDTH) / 2;
    let off_y = area.height.saturating_sub(rows as u16) / 2;
    let inner = Rect {
        x: area.x + off_x,
        y: area.y + off_y,
        width: area.width.saturating_sub(off_x),
        height: area.height.saturating_sub(off_y),
    };
    let fg = theme.piece_color(kind.color_index());
    for &(r, c) in shape {
        put_cell(buf, inner, i32::from(r), i32::from(c), FILLED, fg, theme.bg);
    }
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered_popup(area, 28, 6);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let score = view.board.score();
    let popup = centered_popup(area, 30, 11);
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {score} "), fg)),
        Line::from(Span::styled(format!(" Best: {} ", view.best), fg)),
        Line::from(Span::styled(format!(" Lines: {} ", view.board.lines()), fg)),
    ];
    if score > 0 && score >= view.best {
        lines.push(Line::from(Span::styled(
            " New best! ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R — Restart    Q — Quit ", fg)));
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

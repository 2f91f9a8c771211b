//! Board state: grid, active piece, collision, freezing, line clear, score.

use crate::piece::{Piece, TetrominoKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// Points for clearing `n` rows with a single lock.
pub const fn line_clear_points(n: u32) -> u32 {
    100 * n
}

/// Rows cleared per level.
const LINES_PER_LEVEL: u32 = 10;

/// Single cell: either empty or a block of a given colour index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Block(u8),
}

impl Cell {
    pub fn is_filled(self) -> bool {
        matches!(self, Self::Block(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Playing,
    GameOver,
}

/// What a lock (freeze) did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lock {
    /// Indices of the removed rows, ascending, as they were before removal.
    pub cleared_rows: Vec<usize>,
    pub points: u32,
    pub game_over: bool,
}

/// Result of one gravity step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing to move (no piece, or game over).
    Idle,
    Moved,
    Locked(Lock),
}

/// Grid of cells. Row 0 is the top; rows[row][col].
#[derive(Debug, Clone)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    rows: VecDeque<Vec<Cell>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: (0..height).map(|_| vec![Cell::Empty; width]).collect(),
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = cell;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// True if `piece` shifted by (dx, dy) leaves the side walls, passes the
    /// floor, or overlaps a filled cell. Cells above row 0 never collide.
    pub fn intersects(&self, piece: &Piece, dx: i32, dy: i32) -> bool {
        piece.board_cells().iter().any(|&(row, col)| {
            let (row, col) = (row + dy, col + dx);
            if col < 0 || col >= self.width as i32 || row >= self.height as i32 {
                return true;
            }
            row >= 0 && self.get(row as usize, col as usize).is_some_and(Cell::is_filled)
        })
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.iter().all(|c| c.is_filled()))
    }

    /// Removes every full row at once and pads the top with empty rows.
    /// Returns the removed row indices, ascending.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let full: Vec<usize> = (0..self.height).filter(|&r| self.is_row_full(r)).collect();
        for &row in full.iter().rev() {
            self.rows.remove(row);
        }
        for _ in 0..full.len() {
            self.rows.push_front(vec![Cell::Empty; self.width]);
        }
        full
    }
}

/// One game session: grid, falling piece, score and status.
#[derive(Debug)]
pub struct Board {
    grid: Grid,
    active: Option<Piece>,
    next: TetrominoKind,
    score: u32,
    lines: u32,
    status: Status,
    rng: StdRng,
}

impl Board {
    /// New board with a random first piece; `seed` makes the sequence reproducible.
    pub fn new(width: usize, height: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let first = TetrominoKind::random(&mut rng);
        let next = TetrominoKind::random(&mut rng);
        let mut board = Self {
            grid: Grid::new(width, height),
            active: None,
            next,
            score: 0,
            lines: 0,
            status: Status::Playing,
            rng,
        };
        board.spawn(first);
        board
    }

    /// Fresh grid, zero score, new piece. Keeps the RNG stream going.
    pub fn reset(&mut self) {
        self.grid = Grid::new(self.grid.width, self.grid.height);
        self.score = 0;
        self.lines = 0;
        self.status = Status::Playing;
        self.active = None;
        let first = TetrominoKind::random(&mut self.rng);
        self.next = TetrominoKind::random(&mut self.rng);
        self.spawn(first);
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn active(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    /// Absolute cells and colour index of the falling piece.
    pub fn active_cells(&self) -> Option<([(i32, i32); 4], u8)> {
        self.active.map(|p| (p.board_cells(), p.color_index()))
    }

    pub fn next(&self) -> TetrominoKind {
        self.next
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn level(&self) -> u32 {
        1 + self.lines / LINES_PER_LEVEL
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == Status::Playing
    }

    pub fn intersects(&self, piece: &Piece, dx: i32, dy: i32) -> bool {
        self.grid.intersects(piece, dx, dy)
    }

    /// Where the falling piece would land on a hard drop.
    pub fn ghost(&self) -> Option<Piece> {
        let mut p = self.active?;
        while !self.intersects(&p, 0, 1) {
            p.y += 1;
        }
        Some(p)
    }

    /// Places a new piece of `kind` at the spawn position. Game over if it
    /// already overlaps the stack.
    pub fn spawn(&mut self, kind: TetrominoKind) {
        let piece = Piece::spawn(kind, self.grid.width);
        if self.grid.intersects(&piece, 0, 0) {
            self.status = Status::GameOver;
        }
        self.active = Some(piece);
    }

    fn spawn_next(&mut self) {
        let kind = self.next;
        self.next = TetrominoKind::random(&mut self.rng);
        self.spawn(kind);
    }

    /// Shift sideways by `dx` columns; rejected moves leave the piece alone.
    pub fn move_horizontal(&mut self, dx: i32) -> bool {
        if self.status != Status::Playing {
            return false;
        }
        if let Some(ref mut piece) = self.active {
            if !self.grid.intersects(piece, dx, 0) {
                piece.x += dx;
                return true;
            }
        }
        false
    }

    pub fn move_left(&mut self) -> bool {
        self.move_horizontal(-1)
    }

    pub fn move_right(&mut self) -> bool {
        self.move_horizontal(1)
    }

    /// Clockwise rotation in place; no wall kicks.
    pub fn rotate_active(&mut self) -> bool {
        if self.status != Status::Playing {
            return false;
        }
        if let Some(ref mut piece) = self.active {
            piece.rotate();
            if self.grid.intersects(piece, 0, 0) {
                piece.rotate_back();
                return false;
            }
            return true;
        }
        false
    }

    pub fn rotate_active_back(&mut self) -> bool {
        if self.status != Status::Playing {
            return false;
        }
        if let Some(ref mut piece) = self.active {
            piece.rotate_back();
            if self.grid.intersects(piece, 0, 0) {
                piece.rotate();
                return false;
            }
            return true;
        }
        false
    }

    /// One row of gravity; locks the piece when it cannot fall further.
    pub fn step_down(&mut self) -> Step {
        if self.status != Status::Playing {
            return Step::Idle;
        }
        let Some(ref mut piece) = self.active else {
            return Step::Idle;
        };
        if self.grid.intersects(piece, 0, 1) {
            return self.freeze().map_or(Step::Idle, Step::Locked);
        }
        piece.y += 1;
        Step::Moved
    }

    /// Drop straight to the resting row and lock there.
    pub fn hard_drop(&mut self) -> Option<Lock> {
        if self.status != Status::Playing {
            return None;
        }
        let piece = self.active.as_mut()?;
        while !self.grid.intersects(piece, 0, 1) {
            piece.y += 1;
        }
        self.freeze()
    }

    /// Write the falling piece into the grid, clear lines, spawn the next one.
    pub fn freeze(&mut self) -> Option<Lock> {
        if self.status != Status::Playing {
            return None;
        }
        let piece = self.active.take()?;
        let color = piece.color_index();
        let mut above_top = false;
        for (row, col) in piece.board_cells() {
            if row < 0 || col < 0 {
                above_top |= row < 0;
                continue;
            }
            self.grid.set(row as usize, col as usize, Cell::Block(color));
        }
        if above_top {
            self.status = Status::GameOver;
            return Some(Lock {
                game_over: true,
                ..Lock::default()
            });
        }

        let cleared_rows = self.clear_lines();
        let points = line_clear_points(cleared_rows.len() as u32);
        self.spawn_next();
        Some(Lock {
            cleared_rows,
            points,
            game_over: self.status == Status::GameOver,
        })
    }

    /// Remove full rows and score them. Returns the removed row indices.
    pub fn clear_lines(&mut self) -> Vec<usize> {
        let cleared = self.grid.clear_full_rows();
        let n = cleared.len() as u32;
        self.lines += n;
        self.score += line_clear_points(n);
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board_with(kind: TetrominoKind) -> Board {
        let mut b = Board::new(10, 20, Some(1));
        b.active = None;
        b.spawn(kind);
        b
    }

    fn fill_row(b: &mut Board, row: usize, skip: &[usize]) {
        for col in 0..b.width() {
            if !skip.contains(&col) {
                b.grid.set(row, col, Cell::Block(9));
            }
        }
    }

    #[test]
    fn test_new_board_is_empty_and_playing() {
        let b = Board::new(10, 20, Some(3));
        assert_eq!((b.width(), b.height()), (10, 20));
        assert!(b.grid().rows().flatten().all(|c| *c == Cell::Empty));
        assert!(b.active().is_some());
        assert_eq!(b.status(), Status::Playing);
        assert_eq!((b.score(), b.lines(), b.level()), (0, 0, 1));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Board::new(10, 20, Some(42));
        let mut b = Board::new(10, 20, Some(42));
        for _ in 0..20 {
            assert_eq!(a.active().map(|p| p.kind), b.active().map(|p| p.kind));
            assert_eq!(a.next(), b.next());
            a.hard_drop();
            b.hard_drop();
        }
    }

    #[test]
    fn test_intersects_walls_and_floor() {
        let b = board_with(TetrominoKind::O);
        let p = *b.active().unwrap();
        assert!(!b.intersects(&p, 0, 0));
        assert!(b.intersects(&p, -5, 0));
        assert!(!b.intersects(&p, -4, 0));
        assert!(b.intersects(&p, 5, 0));
        assert!(!b.intersects(&p, 4, 0));
        assert!(!b.intersects(&p, 0, 19));
        assert!(b.intersects(&p, 0, 20));
    }

    #[test]
    fn test_intersects_allows_cells_above_top() {
        let b = board_with(TetrominoKind::I);
        let mut p = *b.active().unwrap();
        p.rotate();
        assert!(!b.intersects(&p, 0, -3));
        assert!(!b.intersects(&p, 0, -10));
    }

    #[test]
    fn test_intersects_filled_cell() {
        let mut b = board_with(TetrominoKind::O);
        b.grid.set(5, 4, Cell::Block(0));
        let p = *b.active().unwrap();
        assert!(!b.intersects(&p, 0, 3));
        assert!(b.intersects(&p, 0, 5));
        assert!(b.intersects(&p, 0, 6));
        assert!(!b.intersects(&p, 0, 7));
    }

    #[test]
    fn test_move_horizontal_stops_at_wall() {
        let mut b = board_with(TetrominoKind::O);
        for _ in 0..4 {
            assert!(b.move_left());
        }
        assert!(!b.move_left());
        assert_eq!(b.active().unwrap().x, 0);
        for _ in 0..8 {
            assert!(b.move_right());
        }
        assert!(!b.move_right());
        assert_eq!(b.active().unwrap().x, 8);
    }

    #[test]
    fn test_move_blocked_by_stack() {
        let mut b = board_with(TetrominoKind::O);
        b.grid.set(0, 3, Cell::Block(0));
        assert!(!b.move_left());
        assert_eq!(b.active().unwrap().x, 4);
    }

    #[test]
    fn test_rotation_rejected_without_kick() {
        let mut b = board_with(TetrominoKind::I);
        for _ in 0..20 {
            b.step_down();
            if b.active().unwrap().y == 19 {
                break;
            }
        }
        assert_eq!(b.active().unwrap().y, 19);
        // Vertical I would poke through the floor.
        assert!(!b.rotate_active());
        assert_eq!(b.active().unwrap().rotation, 0);
        assert!(!b.rotate_active_back());
        assert_eq!(b.active().unwrap().rotation, 0);
    }

    #[test]
    fn test_rotation_accepted_in_open_space() {
        let mut b = board_with(TetrominoKind::T);
        b.step_down();
        b.step_down();
        assert!(b.rotate_active());
        assert_eq!(b.active().unwrap().rotation, 1);
        assert!(b.rotate_active_back());
        assert!(b.rotate_active_back());
        assert_eq!(b.active().unwrap().rotation, 3);
    }

    #[test]
    fn test_o_piece_settles_on_bottom_row() {
        let mut b = board_with(TetrominoKind::O);
        assert_eq!(b.active().unwrap().x, 4);
        for _ in 0..19 {
            assert_eq!(b.step_down(), Step::Moved);
        }
        let p = *b.active().unwrap();
        assert_eq!(p.board_cells().iter().map(|&(r, _)| r).max(), Some(19));
        assert!(b.intersects(&p, 0, 1));
        assert_eq!(b.status(), Status::Playing);

        match b.step_down() {
            Step::Locked(lock) => {
                assert!(lock.cleared_rows.is_empty());
                assert!(!lock.game_over);
            }
            other => panic!("expected lock, got {other:?}"),
        }
        assert_eq!(b.grid().get(19, 4), Some(Cell::Block(TetrominoKind::O.color_index())));
        assert_eq!(b.grid().get(18, 5), Some(Cell::Block(TetrominoKind::O.color_index())));
        assert!(b.active().is_some());
    }

    #[test]
    fn test_vertical_i_completes_bottom_row() {
        let mut b = board_with(TetrominoKind::I);
        fill_row(&mut b, 19, &[5]);
        b.grid.set(18, 0, Cell::Block(2));
        assert!(b.rotate_active());
        assert!(b.move_right());
        assert!(b.move_right());
        assert_eq!(b.active().unwrap().x, 5);

        let lock = b.hard_drop().unwrap();
        assert_eq!(lock.cleared_rows, vec![19]);
        assert_eq!(lock.points, line_clear_points(1));
        assert_eq!(b.score(), 100);
        assert_eq!(b.lines(), 1);
        assert!(b.grid().rows().next().unwrap().iter().all(|c| *c == Cell::Empty));
        // Row 18 shifted down; the rest of the I sits above it.
        assert_eq!(b.grid().get(19, 0), Some(Cell::Block(2)));
        assert!(b.grid().get(19, 5).unwrap().is_filled());
        assert!(b.grid().get(17, 5).unwrap().is_filled());
        assert!(!b.grid().get(16, 5).unwrap().is_filled());
    }

    #[test]
    fn test_horizontal_i_completes_bottom_row() {
        let mut b = board_with(TetrominoKind::I);
        fill_row(&mut b, 19, &[3, 4, 5, 6]);
        let lock = b.hard_drop().unwrap();
        assert_eq!(lock.cleared_rows, vec![19]);
        assert_eq!(b.score(), 100);
        assert!(b.grid().rows().all(|r| r.iter().all(|c| *c == Cell::Empty)));
    }

    #[test]
    fn test_clear_non_contiguous_rows() {
        let mut b = board_with(TetrominoKind::O);
        fill_row(&mut b, 19, &[]);
        fill_row(&mut b, 18, &[2]);
        fill_row(&mut b, 17, &[]);
        fill_row(&mut b, 16, &[]);
        b.grid.set(15, 7, Cell::Block(1));
        let cleared = b.clear_lines();
        assert_eq!(cleared, vec![16, 17, 19]);
        assert_eq!(b.score(), 300);
        assert_eq!(b.lines(), 3);
        assert_eq!(b.grid().get(18, 7), Some(Cell::Block(1)));
        assert_eq!(b.grid().get(19, 2), Some(Cell::Empty));
        assert_eq!(b.grid().get(19, 3), Some(Cell::Block(9)));
        assert!(!b.grid().is_row_full(19));
    }

    #[test]
    fn test_clear_stacked_full_rows() {
        let mut b = board_with(TetrominoKind::O);
        for row in 16..20 {
            fill_row(&mut b, row, &[]);
        }
        assert_eq!(b.clear_lines(), vec![16, 17, 18, 19]);
        assert_eq!(b.score(), 400);
        assert!(b.grid().rows().flatten().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn test_level_follows_lines() {
        let mut b = board_with(TetrominoKind::O);
        for _ in 0..3 {
            for row in 16..20 {
                fill_row(&mut b, row, &[]);
            }
            b.clear_lines();
        }
        assert_eq!(b.lines(), 12);
        assert_eq!(b.level(), 2);
    }

    #[test]
    fn test_freeze_above_top_is_game_over() {
        let mut b = board_with(TetrominoKind::O);
        fill_row(&mut b, 1, &[]);
        // O rows -1..0 are resting on row 1 already.
        let lock = match b.step_down() {
            Step::Locked(lock) => lock,
            other => panic!("expected lock, got {other:?}"),
        };
        assert!(lock.game_over);
        assert_eq!(b.status(), Status::GameOver);
        assert!(b.active().is_none());
        assert!(b.grid().get(0, 4).unwrap().is_filled());
        // Row 1 stays: no clear on a top-out.
        assert!(b.grid().is_row_full(1));
    }

    #[test]
    fn test_spawn_on_full_board_is_game_over() {
        let mut b = board_with(TetrominoKind::I);
        for row in 0..20 {
            fill_row(&mut b, row, &[9]);
        }
        b.active = None;
        b.spawn(TetrominoKind::T);
        assert_eq!(b.status(), Status::GameOver);
        assert_eq!(b.freeze(), None);
        assert_eq!(b.status(), Status::GameOver);
    }

    #[test]
    fn test_freeze_into_overlap_is_game_over() {
        let mut b = board_with(TetrominoKind::I);
        for row in 0..20 {
            fill_row(&mut b, row, &[9]);
        }
        let lock = b.freeze().unwrap();
        assert!(lock.game_over);
        assert_eq!(b.status(), Status::GameOver);
    }

    #[test]
    fn test_game_over_ignores_commands_until_reset() {
        let mut b = board_with(TetrominoKind::O);
        fill_row(&mut b, 1, &[]);
        b.hard_drop();
        assert_eq!(b.status(), Status::GameOver);
        let score = b.score();
        assert!(!b.move_left());
        assert!(!b.rotate_active());
        assert_eq!(b.step_down(), Step::Idle);
        assert_eq!(b.hard_drop(), None);
        assert_eq!(b.score(), score);

        b.reset();
        assert_eq!(b.status(), Status::Playing);
        assert_eq!(b.score(), 0);
        assert!(b.active().is_some());
        assert!(b.grid().rows().flatten().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn test_hard_drop_rests_on_stack() {
        let mut b = board_with(TetrominoKind::O);
        b.grid.set(10, 4, Cell::Block(3));
        let ghost = b.ghost().unwrap();
        assert_eq!(ghost.y, 8);
        b.hard_drop();
        assert!(b.grid().get(9, 4).unwrap().is_filled());
        assert!(b.grid().get(8, 5).unwrap().is_filled());
        assert!(!b.grid().get(7, 4).unwrap().is_filled());
    }

    #[derive(Debug, Clone, Copy)]
    enum Cmd {
        Left,
        Right,
        Rotate,
        RotateBack,
        Step,
        Drop,
    }

    fn cmd() -> impl Strategy<Value = Cmd> {
        prop_oneof![
            Just(Cmd::Left),
            Just(Cmd::Right),
            Just(Cmd::Rotate),
            Just(Cmd::RotateBack),
            Just(Cmd::Step),
            Just(Cmd::Drop),
        ]
    }

    proptest! {
        #[test]
        fn active_piece_never_overlaps(seed in any::<u64>(), cmds in prop::collection::vec(cmd(), 1..400)) {
            let mut b = Board::new(10, 20, Some(seed));
            let mut last_score = 0;
            for c in cmds {
                let lines_before = b.lines();
                match c {
                    Cmd::Left => { b.move_left(); }
                    Cmd::Right => { b.move_right(); }
                    Cmd::Rotate => { b.rotate_active(); }
                    Cmd::RotateBack => { b.rotate_active_back(); }
                    Cmd::Step => { b.step_down(); }
                    Cmd::Drop => {
                        if let Some(lock) = b.hard_drop() {
                            prop_assert_eq!(lock.points, line_clear_points(lock.cleared_rows.len() as u32));
                            prop_assert_eq!(b.lines() - lines_before, lock.cleared_rows.len() as u32);
                        }
                    }
                }
                prop_assert!(b.score() >= last_score);
                prop_assert_eq!(b.score(), line_clear_points(b.lines()));
                last_score = b.score();
                if b.is_playing() {
                    let p = *b.active().unwrap();
                    prop_assert!(!b.intersects(&p, 0, 0));
                    prop_assert!(p.board_cells().iter().all(|&(_, col)| (0..10).contains(&col)));
                    prop_assert!(!b.grid().rows().any(|r| r.iter().all(|c| c.is_filled())));
                }
            }
        }

        #[test]
        fn clear_removes_exactly_full_rows(full in prop::collection::vec(any::<bool>(), 20), hole in 0usize..10) {
            let mut b = board_with(TetrominoKind::O);
            for (row, &is_full) in full.iter().enumerate() {
                let skip = if is_full { vec![] } else { vec![(hole + row) % 10] };
                fill_row(&mut b, row, &skip);
                // Tag surviving rows so order can be checked.
                if !is_full {
                    b.grid.set(row, (hole + row + 1) % 10, Cell::Block(row as u8));
                }
            }
            let expected: Vec<u8> = full.iter().enumerate().filter(|(_, f)| !**f).map(|(r, _)| r as u8).collect();
            let k = full.iter().filter(|f| **f).count();

            let cleared = b.clear_lines();
            prop_assert_eq!(cleared.len(), k);
            prop_assert_eq!(b.score(), line_clear_points(k as u32));
            let rows: Vec<&[Cell]> = b.grid().rows().collect();
            for row in &rows[..k] {
                prop_assert!(row.iter().all(|c| *c == Cell::Empty));
            }
            let tags: Vec<u8> = rows[k..].iter().enumerate().map(|(i, r)| {
                let orig = expected[i] as usize;
                match r[(hole + orig + 1) % 10] { Cell::Block(t) => t, Cell::Empty => u8::MAX }
            }).collect();
            prop_assert_eq!(tags, expected);
        }
    }
}

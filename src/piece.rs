//! Tetromino kinds, rotation tables and the falling piece.

use rand::Rng;

/// One filled cell of a shape, as (row, col) inside the shape's bounding box.
pub type Offset = (i8, i8);

/// The four filled cells of one rotation state.
pub type Shape = [Offset; 4];

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TetrominoKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

// Each state is the clockwise quarter turn of the one before it, anchored at
// the top-left of its own (tight) bounding box.
const I_STATES: [Shape; 2] = [
    [(0, 0), (0, 1), (0, 2), (0, 3)],
    [(0, 0), (1, 0), (2, 0), (3, 0)],
];
const O_STATES: [Shape; 1] = [[(0, 0), (0, 1), (1, 0), (1, 1)]];
const T_STATES: [Shape; 4] = [
    [(0, 1), (1, 0), (1, 1), (1, 2)],
    [(0, 0), (1, 0), (1, 1), (2, 0)],
    [(0, 0), (0, 1), (0, 2), (1, 1)],
    [(0, 1), (1, 0), (1, 1), (2, 1)],
];
const S_STATES: [Shape; 2] = [
    [(0, 1), (0, 2), (1, 0), (1, 1)],
    [(0, 0), (1, 0), (1, 1), (2, 1)],
];
const Z_STATES: [Shape; 2] = [
    [(0, 0), (0, 1), (1, 1), (1, 2)],
    [(0, 1), (1, 0), (1, 1), (2, 0)],
];
const J_STATES: [Shape; 4] = [
    [(0, 0), (1, 0), (1, 1), (1, 2)],
    [(0, 0), (0, 1), (1, 0), (2, 0)],
    [(0, 0), (0, 1), (0, 2), (1, 2)],
    [(0, 1), (1, 1), (2, 0), (2, 1)],
];
const L_STATES: [Shape; 4] = [
    [(0, 2), (1, 0), (1, 1), (1, 2)],
    [(0, 0), (1, 0), (2, 0), (2, 1)],
    [(0, 0), (0, 1), (0, 2), (1, 0)],
    [(0, 0), (0, 1), (1, 1), (2, 1)],
];

impl TetrominoKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::S, Self::Z, Self::J, Self::L];

    /// Rotation states in clockwise order.
    pub fn states(self) -> &'static [Shape] {
        match self {
            Self::I => &I_STATES,
            Self::O => &O_STATES,
            Self::T => &T_STATES,
            Self::S => &S_STATES,
            Self::Z => &Z_STATES,
            Self::J => &J_STATES,
            Self::L => &L_STATES,
        }
    }

    pub fn rotation_count(self) -> u8 {
        self.states().len() as u8
    }

    /// Colour index 0..7 for `Theme::piece_color`.
    pub fn color_index(self) -> u8 {
        match self {
            Self::I => 0, // Cyan
            Self::O => 1, // Yellow
            Self::T => 2, // Magenta
            Self::S => 3, // Green
            Self::Z => 4, // Red
            Self::J => 5, // Blue
            Self::L => 6, // Orange
        }
    }

    /// Uniform pick among the seven kinds.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// (rows, cols) covered by a shape.
pub fn bounding_box(shape: &Shape) -> (i32, i32) {
    let rows = shape.iter().map(|&(r, _)| r).max().unwrap_or(0);
    let cols = shape.iter().map(|&(_, c)| c).max().unwrap_or(0);
    (i32::from(rows) + 1, i32::from(cols) + 1)
}

/// Active piece: kind, rotation state and bounding-box origin on the board.
/// `y` may be negative while the piece is still entering from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: TetrominoKind,
    pub rotation: u8,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// New piece centred on a board `width` columns wide, its lowest cell on row 0.
    pub fn spawn(kind: TetrominoKind, width: usize) -> Self {
        let (rows, cols) = bounding_box(&kind.states()[0]);
        Self {
            kind,
            rotation: 0,
            x: width as i32 / 2 - cols / 2,
            y: 1 - rows,
        }
    }

    /// Filled (row, col) offsets for the current rotation.
    pub fn cells(&self) -> &'static Shape {
        let states = self.kind.states();
        &states[self.rotation as usize % states.len()]
    }

    /// Absolute (row, col) board coordinates of the four cells.
    pub fn board_cells(&self) -> [(i32, i32); 4] {
        self.cells()
            .map(|(r, c)| (self.y + i32::from(r), self.x + i32::from(c)))
    }

    pub fn rotate(&mut self) {
        self.rotation = (self.rotation + 1) % self.kind.rotation_count();
    }

    pub fn rotate_back(&mut self) {
        let n = self.kind.rotation_count();
        self.rotation = (self.rotation + n - 1) % n;
    }

    pub fn color_index(&self) -> u8 {
        self.kind.color_index()
    }
}

//! Tetrixtui — classic falling-block puzzle game in the terminal.

mod app;
mod board;
mod input;
mod piece;
mod theme;
mod timer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// Playfield columns accepted on the command line.
const WIDTH_RANGE: std::ops::RangeInclusive<usize> = 4..=40;
/// Playfield rows accepted on the command line.
const HEIGHT_RANGE: std::ops::RangeInclusive<usize> = 4..=60;

/// Options derived from CLI that affect game behaviour (board size, speed, seeding, visuals).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Gravity ticks per second at level 1.
    pub tick_rate: f64,
    pub relaxed: bool,
    pub seed: Option<u64>,
    pub no_animation: bool,
    pub ghost: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("width {0} out of range (expected {min}..={max})", min = WIDTH_RANGE.start(), max = WIDTH_RANGE.end())]
    Width(usize),
    #[error("height {0} out of range (expected {min}..={max})", min = HEIGHT_RANGE.start(), max = HEIGHT_RANGE.end())]
    Height(usize),
    #[error("tick rate must be a positive number, got {0}")]
    TickRate(f64),
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !WIDTH_RANGE.contains(&args.width) {
            return Err(ConfigError::Width(args.width));
        }
        if !HEIGHT_RANGE.contains(&args.height) {
            return Err(ConfigError::Height(args.height));
        }
        let tick_rate = args.tick_rate.unwrap_or_else(|| args.difficulty.base_rate());
        if !(tick_rate.is_finite() && tick_rate > 0.0) {
            return Err(ConfigError::TickRate(tick_rate));
        }
        Ok(Self {
            width: args.width,
            height: args.height,
            tick_rate,
            relaxed: args.relaxed,
            seed: args.seed,
            no_animation: args.no_animation,
            ghost: !args.no_ghost,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path, args.verbose)?;
    }
    let config = GameConfig::from_args(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        warn!(error = %e, "theme load failed, using defaults");
        theme::Theme::default_for_palette(args.palette)
    });
    info!(?config, "config");
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// The UI owns the terminal, so logs only go to a file.
fn init_logging(path: &Path, verbose: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .with_target(false)
        .init();
    Ok(())
}

/// Classic falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tetrixtui",
    version,
    about = "Classic falling-block puzzle in the terminal. Fill horizontal lines to clear them and score.",
    long_about = "Tetrixtui is a terminal take on the classic falling-block puzzle.\n\n\
        Move and rotate the falling tetromino. Complete a horizontal line to clear it; \
        each cleared line scores 100 points and every 10 lines raise the level and the speed.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up        Rotate CW   Down       Soft drop\n  Enter/Space Hard drop   P          Pause      R          Restart   Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i     Rotate CW   u or z     Rotate CCW\n  j           Soft drop  Space      Hard drop  p          Pause   q  Quit\n\n\
        Hold a movement key to keep the piece moving. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Difficulty: sets the starting gravity (easy 1, medium 2, hard 4 rows per second).
    #[arg(short, long, default_value = "easy")]
    pub difficulty: Difficulty,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Playfield width in columns.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: usize,

    /// Playfield height in rows.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: usize,

    /// Gravity ticks per second at level 1. Overrides --difficulty.
    #[arg(long, value_name = "RATE")]
    pub tick_rate: Option<f64>,

    /// Relaxed mode: gravity speed does not increase with level (fixed speed).
    #[arg(long)]
    pub relaxed: bool,

    /// Seed for the piece sequence; the same seed deals the same pieces.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Disable line-clear animation.
    #[arg(long)]
    pub no_animation: bool,

    /// Hide the landing preview under the falling piece.
    #[arg(long)]
    pub no_ghost: bool,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Include debug events (every lock and clear) in the log file.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Gravity ticks per second at level 1.
    pub fn base_rate(self) -> f64 {
        match self {
            Self::Easy => 1.0,
            Self::Medium => 2.0,
            Self::Hard => 4.0,
        }
    }
}

//! App: terminal init, main loop, gravity tick and key handling.

use crate::GameConfig;
use crate::board::{Board, Lock, Status, Step};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::timer::{DropTimer, tick_interval};
use crate::ui::{self, LineClearFx, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;
/// Frame budget for event polling (~60 FPS).
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    Paused,
    GameOver,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    board: Board,
    screen: Screen,
    timer: DropTimer,
    /// Held action and when it was first pressed.
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// Terminal reports key releases; without them held keys can't be tracked
    /// and each press (or terminal repeat) is a single action.
    key_release: bool,
    line_clear: LineClearFx,
    /// Best score of this session (not persisted).
    best: u32,
    quit: bool,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let board = Board::new(config.width, config.height, config.seed);
        let mut timer = DropTimer::new(tick_interval(config.tick_rate, board.level(), config.relaxed));
        timer.start(Instant::now());
        Self {
            config,
            theme,
            board,
            screen: Screen::Playing,
            timer,
            repeat_state: None,
            last_repeat_fire: None,
            key_release: false,
            line_clear: LineClearFx::default(),
            best: 0,
            quit: false,
        }
    }

    fn reset_game(&mut self, now: Instant) {
        self.board.reset();
        self.screen = Screen::Playing;
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.line_clear.clear();
        self.timer
            .set_interval(tick_interval(self.config.tick_rate, 1, self.config.relaxed));
        self.timer.start(now);
        info!("restart");
    }

    /// Handle one key action. Returns false when the app should exit.
    pub fn handle_action(&mut self, action: Action, now: Instant) -> bool {
        match action {
            Action::Quit => {
                self.quit = true;
                return false;
            }
            Action::Restart => self.reset_game(now),
            Action::Pause => match self.screen {
                Screen::Playing => {
                    self.screen = Screen::Paused;
                    self.timer.cancel();
                    self.repeat_state = None;
                }
                Screen::Paused => {
                    self.screen = Screen::Playing;
                    self.timer.start(now);
                }
                Screen::GameOver => {}
            },
            _ if self.screen == Screen::Playing => {
                if self.key_release && action.repeats() {
                    self.repeat_state = Some((action, now));
                    self.last_repeat_fire = None;
                }
                self.apply_action(action);
            }
            _ => {}
        }
        true
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => {
                self.board.move_left();
            }
            Action::MoveRight => {
                self.board.move_right();
            }
            Action::RotateCw => {
                self.board.rotate_active();
            }
            Action::RotateCcw => {
                self.board.rotate_active_back();
            }
            Action::SoftDrop => {
                if let Step::Locked(lock) = self.board.step_down() {
                    self.on_lock(lock);
                }
            }
            Action::HardDrop => {
                if let Some(lock) = self.board.hard_drop() {
                    self.on_lock(lock);
                }
            }
            Action::Pause | Action::Restart | Action::Quit | Action::None => {}
        }
    }

    /// React to a piece locking: flash cleared rows, speed up, stop on game over.
    fn on_lock(&mut self, lock: Lock) {
        // A lock ends any hold so the next piece doesn't inherit it.
        self.repeat_state = None;
        self.last_repeat_fire = None;
        debug!(
            cleared = lock.cleared_rows.len(),
            points = lock.points,
            score = self.board.score(),
            "lock"
        );
        self.best = self.best.max(self.board.score());
        if !lock.cleared_rows.is_empty() {
            if !self.config.no_animation {
                self.line_clear.trigger(lock.cleared_rows);
            }
            self.timer.set_interval(tick_interval(
                self.config.tick_rate,
                self.board.level(),
                self.config.relaxed,
            ));
        }
        if lock.game_over || self.board.status() == Status::GameOver {
            self.timer.cancel();
            self.screen = Screen::GameOver;
            info!(
                score = self.board.score(),
                lines = self.board.lines(),
                level = self.board.level(),
                "game over"
            );
        }
    }

    /// Gravity: one `step_down` per elapsed timer interval.
    pub fn tick(&mut self, now: Instant) {
        if self.screen != Screen::Playing || !self.timer.poll(now) {
            return;
        }
        if let Step::Locked(lock) = self.board.step_down() {
            self.on_lock(lock);
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if now.saturating_duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Key release ends auto-repeat for that action.
    fn release(&mut self, action: Action) {
        if self.repeat_state.map(|(a, _)| a) == Some(action) {
            self.repeat_state = None;
            self.last_repeat_fire = None;
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held keys stop repeating; not every terminal supports them.
        self.key_release = supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();

        let result = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| {
                info!(
                    width = self.config.width,
                    height = self.config.height,
                    tick_rate = self.config.tick_rate,
                    key_release = self.key_release,
                    "start"
                );
                self.timer.start(Instant::now());
                self.run_loop(&mut terminal)
            });

        // Restore every step even if one fails.
        let pop = if self.key_release {
            execute!(std::io::stdout(), PopKeyboardEnhancementFlags)
        } else {
            Ok(())
        };
        let restored = first_error([
            pop,
            execute!(std::io::stdout(), LeaveAlternateScreen),
            disable_raw_mode(),
        ]);

        result?;
        restored?;
        Ok(())
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.quit {
            let now = Instant::now();
            let view = View {
                board: &self.board,
                theme: &self.theme,
                screen: self.screen,
                best: self.best,
                show_ghost: self.config.ghost,
            };
            let flash = &mut self.line_clear;
            terminal.draw(|f| ui::draw(f, &view, Some(flash), now))?;

            if self.line_clear.is_done() {
                self.line_clear.clear();
            }

            let mut timeout = FRAME.saturating_sub(now.elapsed());
            if let Some(gravity) = self.timer.remaining(now) {
                timeout = timeout.min(gravity);
            }
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    let action = key_to_action(key);
                    match key.kind {
                        KeyEventKind::Release => self.release(action),
                        // With release events our own repeat handles held keys.
                        KeyEventKind::Repeat if self.key_release => {}
                        KeyEventKind::Press | KeyEventKind::Repeat => {
                            if self.repeat_state.map(|(a, _)| a) == Some(action) {
                                continue;
                            }
                            if !self.handle_action(action, Instant::now()) {
                                return Ok(());
                            }
                        }
                    }
                }
            }

            if self.screen == Screen::Playing {
                let now = Instant::now();
                self.tick_repeat(now);
                self.tick(now);
            }
        }
        Ok(())
    }
}

/// First error of a batch of steps that have all already run.
fn first_error<const N: usize>(results: [std::io::Result<()>; N]) -> std::io::Result<()> {
    results.into_iter().collect()
}

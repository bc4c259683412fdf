//! Terminal front end: owns the terminal, turns crossterm events into
//! `PlayerInput`s and draws every `PlayerView` the core publishes.

use std::io;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyboardEnhancementFlags,
        MouseButton, MouseEvent, MouseEventKind, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::core::{PlayerInput, PlayerView, PointerInput};
use crate::ui::{self, Areas};

/// Rows moved per wheel notch over the list.
const WHEEL_ROWS: isize = 3;

pub struct App {
    inputs: mpsc::Sender<PlayerInput>,
    view: watch::Receiver<PlayerView>,
    areas: Areas,
    /// Pointer is over the seek bar.
    hovering_seek: bool,
    /// A left-button press started on the seek bar.
    dragging: bool,
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.width > 0
        && r.height > 0
        && col >= r.x
        && col < r.x + r.width
        && row >= r.y
        && row < r.y + r.height
}

impl App {
    pub fn new(inputs: mpsc::Sender<PlayerInput>, view: watch::Receiver<PlayerView>) -> Self {
        Self {
            inputs,
            view,
            areas: Areas::default(),
            hovering_seek: false,
            dragging: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Key release events (for arrow-release-to-play) and a distinct
        // ctrl+M need the kitty keyboard protocol.
        let enhanced = supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )?;
        }
        debug!("run(): keyboard enhancement {}", enhanced);

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // ── Background task: keyboard/mouse events ────────────────────────────
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(1024);
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        let size = terminal.size()?;
        self.relayout(Rect::new(0, 0, size.width, size.height)).await;

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                let view = self.view.borrow_and_update().clone();
                if view.quit {
                    break;
                }
                let mut drawn = self.areas;
                terminal.draw(|f| drawn = ui::draw(f, &view))?;
                if drawn != self.areas {
                    self.relayout(drawn.whole).await;
                }
            }

            tokio::select! {
                Some(ev) = event_rx.recv() => {
                    needs_redraw = self.handle_event(ev).await;
                }
                changed = self.view.changed() => {
                    if changed.is_err() {
                        debug!("run(): core stopped publishing");
                        break;
                    }
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        if enhanced {
            execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
        }
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        Ok(())
    }

    async fn send(&self, input: PlayerInput) {
        if self.inputs.send(input).await.is_err() {
            warn!("player core is gone, dropping input");
        }
    }

    async fn relayout(&mut self, area: Rect) {
        self.areas = ui::layout(area);
        let bar = self.areas.seek_bar();
        self.send(PlayerInput::Pointer(PointerInput::Resize {
            seek_width: bar.width,
            list_height: self.areas.rows.height,
        }))
        .await;
    }

    /// Returns true when the frame must be redrawn without waiting for the core.
    async fn handle_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) => {
                self.send(PlayerInput::Key(key)).await;
                false
            }
            Event::Mouse(m) => {
                for input in self.map_mouse(m) {
                    self.send(PlayerInput::Pointer(input)).await;
                }
                false
            }
            Event::Resize(w, h) => {
                self.relayout(Rect::new(0, 0, w, h)).await;
                true
            }
            _ => false,
        }
    }

    fn bar_x(&self, col: u16) -> u16 {
        let bar = self.areas.seek_bar();
        col.saturating_sub(bar.x)
            .min(bar.width.saturating_sub(1))
    }

    fn map_mouse(&mut self, m: MouseEvent) -> Vec<PointerInput> {
        let (col, row) = (m.column, m.row);
        let bar = self.areas.seek_bar();
        let mut out = Vec::new();

        let over_seek = hit(bar, col, row);
        if over_seek != self.hovering_seek {
            self.hovering_seek = over_seek;
            out.push(PointerInput::SeekHover(over_seek));
        }

        match m.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if over_seek {
                    self.dragging = true;
                    out.push(PointerInput::SeekDown(self.bar_x(col)));
                } else if hit(self.areas.rows, col, row) {
                    out.push(PointerInput::ListClick(usize::from(row - self.areas.rows.y)));
                } else if hit(self.areas.now_playing, col, row) {
                    out.push(PointerInput::NowPlayingClick);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.dragging => {
                out.push(PointerInput::SeekDrag(self.bar_x(col)));
            }
            MouseEventKind::Up(MouseButton::Left) if self.dragging => {
                self.dragging = false;
                out.push(PointerInput::SeekUp(self.bar_x(col)));
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let up = m.kind == MouseEventKind::ScrollUp;
                if hit(self.areas.list, col, row) {
                    out.push(PointerInput::ListScroll(if up { -WHEEL_ROWS } else { WHEEL_ROWS }));
                } else if hit(self.areas.seek, col, row) || hit(self.areas.now_playing, col, row) {
                    out.push(PointerInput::VolumeWheel(up));
                }
            }
            _ => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn app() -> App {
        let (tx, _rx) = mpsc::channel(4);
        let (_view_tx, view_rx) = watch::channel(PlayerView::default());
        let mut app = App::new(tx, view_rx);
        app.areas = ui::layout(Rect::new(0, 0, 100, 30));
        app
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_drag_on_seek_bar_maps_to_bar_columns() {
        let mut app = app();
        let bar = app.areas.seek_bar();
        let down = app.map_mouse(mouse(MouseEventKind::Down(MouseButton::Left), bar.x + 10, bar.y + 1));
        assert_eq!(down, vec![PointerInput::SeekHover(true), PointerInput::SeekDown(10)]);

        // Leaving the bar mid-drag still drags, clamped to the bar.
        let drag = app.map_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 0, 0));
        assert_eq!(drag, vec![PointerInput::SeekHover(false), PointerInput::SeekDrag(0)]);

        let up = app.map_mouse(mouse(MouseEventKind::Up(MouseButton::Left), bar.x + 500, 0));
        assert_eq!(up, vec![PointerInput::SeekUp(bar.width - 1)]);
    }

    #[test]
    fn test_clicks_and_wheel_route_by_area() {
        let mut app = app();
        let rows = app.areas.rows;
        assert_eq!(
            app.map_mouse(mouse(MouseEventKind::Down(MouseButton::Left), rows.x + 2, rows.y + 3)),
            vec![PointerInput::ListClick(3)]
        );
        assert_eq!(
            app.map_mouse(mouse(MouseEventKind::ScrollDown, rows.x + 2, rows.y)),
            vec![PointerInput::ListScroll(WHEEL_ROWS)]
        );
        let np = app.areas.now_playing;
        assert_eq!(
            app.map_mouse(mouse(MouseEventKind::ScrollUp, np.x + 1, np.y + 1)),
            vec![PointerInput::VolumeWheel(true)]
        );
        assert_eq!(
            app.map_mouse(mouse(MouseEventKind::Down(MouseButton::Left), np.x + 1, np.y + 1)),
            vec![PointerInput::NowPlayingClick]
        );
    }
}

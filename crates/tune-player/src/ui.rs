//! Frame layout and drawing.
//!
//! `layout` depends only on the terminal size so the input task can hit-test
//! mouse events against the same rectangles the last frame was drawn into.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::core::PlayerView;
use crate::theme::{
    blend, style_accent, style_default, style_muted, style_playing, style_secondary,
    style_selected, style_unfocused_border, C_MUTED, C_PANEL_BORDER, C_PLAYING, C_PRIMARY,
    C_SECONDARY,
};
use crate::widgets::{popup, search_box, seekbar};

/// Below this width the now-playing panel is dropped.
const NARROW: u16 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Areas {
    pub whole: Rect,
    pub header: Rect,
    pub list: Rect,
    /// List rows inside the border.
    pub rows: Rect,
    pub now_playing: Rect,
    pub seek: Rect,
    pub footer: Rect,
}

impl Areas {
    pub fn seek_bar(&self) -> Rect {
        seekbar::bar_rect(self.seek)
    }
}

pub fn layout(area: Rect) -> Areas {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),               // header
            Constraint::Min(3),                  // body
            Constraint::Length(seekbar::HEIGHT), // seek bar
            Constraint::Length(1),               // keys
        ])
        .split(area);

    let (list, now_playing) = if area.width < NARROW {
        (outer[1], Rect::default())
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(outer[1]);
        (body[0], body[1])
    };
    let rows = Block::default().borders(Borders::ALL).inner(list);

    Areas {
        whole: area,
        header: outer[0],
        list,
        rows,
        now_playing,
        seek: outer[2],
        footer: outer[3],
    }
}

pub fn draw(frame: &mut Frame, view: &PlayerView) -> Areas {
    let areas = layout(frame.area());

    draw_header(frame, areas.header, view);
    draw_list(frame, &areas, view);
    if areas.now_playing.width > 0 {
        draw_now_playing(frame, areas.now_playing, view);
    }
    seekbar::draw(frame, areas.seek, view);
    draw_keys(frame, areas.footer);

    if let Some(search) = &view.search {
        search_box::draw(frame, areas.whole, search);
    }
    if let Some((text, severity)) = &view.notice {
        popup::draw(frame, areas.whole, text, *severity);
    }
    areas
}

// ── Header ────────────────────────────────────────────────────────────────────

fn draw_header(frame: &mut Frame, area: Rect, view: &PlayerView) {
    let sort = if view.sort.is_modified() {
        "date modified"
    } else {
        "date added"
    };
    let spans = vec![
        Span::styled(" tunebox ", style_accent().add_modifier(Modifier::BOLD)),
        Span::styled("│ ", style_muted()),
        Span::styled(view.play_mode.label(), style_default()),
        Span::styled(" · ", style_muted()),
        Span::styled(sort, style_secondary()),
        Span::styled(" · ", style_muted()),
        Span::styled(format!("vol {}%", view.volume), style_secondary()),
        Span::styled(" · ", style_muted()),
        Span::styled(view.endpoint.clone(), style_muted()),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Song list ─────────────────────────────────────────────────────────────────

fn draw_list(frame: &mut Frame, areas: &Areas, view: &PlayerView) {
    let count = if view.list_exhausted {
        format!(" songs · {} ", view.list_len)
    } else {
        format!(" songs · {}+ ", view.list_len)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_unfocused_border())
        .title(Span::styled(count, Style::default().fg(C_SECONDARY)));
    frame.render_widget(block, areas.list);

    if view.rows.is_empty() {
        let text = if view.list_exhausted {
            "no songs"
        } else {
            "loading…"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(text, style_muted())),
            areas.rows,
        );
        return;
    }

    let lines: Vec<Line> = view
        .rows
        .iter()
        .map(|row| {
            let base = if row.highlighted {
                style_selected()
            } else {
                style_default()
            };
            let icon = if row.playing {
                Span::styled(" ▶ ", style_playing())
            } else {
                Span::styled("   ", base)
            };
            Line::from(vec![
                icon,
                Span::styled(row.title.clone(), base),
                Span::styled(
                    format!("  {}", row.artist),
                    if row.highlighted { base } else { style_secondary() },
                ),
            ])
            .style(base)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), areas.rows);
}

// ── Now playing ───────────────────────────────────────────────────────────────

fn draw_now_playing(frame: &mut Frame, area: Rect, view: &PlayerView) {
    let border = match view.pulse {
        Some(p) => blend(C_PANEL_BORDER, C_PLAYING, p),
        None => C_PANEL_BORDER,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some((title, artist)) = &view.now_playing else {
        frame.render_widget(
            Paragraph::new(Span::styled(" nothing playing", style_muted())),
            inner,
        );
        return;
    };
    let (icon, state) = if view.paused {
        ("⏸", "paused")
    } else {
        ("▶", "playing")
    };
    let cover = if view.has_image { "♫" } else { "♪" };
    let lines = vec![
        Line::from(Span::styled(
            format!(" {}", cover),
            Style::default().fg(border).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" {}", title),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!(" {}", artist), style_secondary())),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!(" {} ", icon), style_playing()),
            Span::styled(state, Style::default().fg(C_MUTED)),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

// ── Keys ──────────────────────────────────────────────────────────────────────

fn draw_keys(frame: &mut Frame, area: Rect) {
    const KEYS: &[(&str, &str)] = &[
        ("space", "play"),
        ("←→", "scrub"),
        ("↑↓", "select"),
        ("^]/^/", "volume"),
        ("^A", "mode"),
        ("^M", "mark"),
        ("^C", "clear"),
        ("^O", "sort"),
        ("^Q", "quit"),
    ];
    let mut spans = vec![Span::raw(" ")];
    for (key, what) in KEYS {
        spans.push(Span::styled(*key, style_default()));
        spans.push(Span::styled(format!(" {}  ", what), style_muted()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_drops_panel_when_narrow() {
        let wide = layout(Rect::new(0, 0, 120, 40));
        assert!(wide.now_playing.width > 0);
        assert_eq!(wide.seek.height, seekbar::HEIGHT);
        assert_eq!(wide.rows.y, wide.list.y + 1);

        let narrow = layout(Rect::new(0, 0, 50, 40));
        assert_eq!(narrow.now_playing.width, 0);
        assert_eq!(narrow.list.width, 50);
    }
}

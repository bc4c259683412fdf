//! Seek bar: time labels, smooth fill, marker ticks and the drag readout.
//!
//! The bar occupies two rows.  The top row carries marker ticks and, while
//! dragging, the time readout; the bottom row carries the fill.  Collapsed
//! bars draw a thin line, enlarged ones the eighth-block fill.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::core::PlayerView;
use crate::theme::{C_MARKER, C_MUTED, C_PLAYING, C_PRIMARY, C_SECONDARY, C_TRACK};

/// Columns reserved on each side for the time labels.
pub const LABEL_WIDTH: u16 = 7;
pub const HEIGHT: u16 = 2;

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// The clickable part of the seek area, between the labels.
pub fn bar_rect(area: Rect) -> Rect {
    let width = area.width.saturating_sub(LABEL_WIDTH * 2);
    Rect {
        x: area.x + LABEL_WIDTH.min(area.width),
        y: area.y,
        width,
        height: area.height,
    }
}

/// Column (relative to the bar) for `fraction`.
fn column(fraction: f64, width: u16) -> u16 {
    if width <= 1 {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * f64::from(width - 1)).round() as u16
}

/// Eighth-block fill for `bar_w` cells.
fn smooth_fill(progress: f64, bar_w: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * bar_w as f64 * 8.0) as usize;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;
    let mut bar = String::with_capacity(bar_w * 3);
    for _ in 0..full_blocks.min(bar_w) {
        bar.push('█');
    }
    if full_blocks < bar_w {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..bar_w {
            bar.push(' ');
        }
    }
    bar
}

pub fn draw(frame: &mut Frame, area: Rect, view: &PlayerView) {
    if area.width < LABEL_WIDTH * 2 + 4 || area.height < HEIGHT {
        return;
    }
    let bar = bar_rect(area);
    let width = bar.width as usize;
    let enlarged = !view.seek.shrunken;

    // Top row: marker ticks plus readout.
    let mut ticks: Vec<char> = vec![' '; width];
    for &m in &view.markers {
        if let Some(cell) = ticks.get_mut(usize::from(column(m, bar.width))) {
            *cell = '▾';
        }
    }
    let tick_style = Style::default().fg(C_MARKER);
    let top_spans = match &view.readout {
        Some(readout) => {
            let at = usize::from(column(view.progress, bar.width));
            let len = readout.chars().count().min(width);
            let start = at.saturating_sub(len / 2).min(width - len);
            vec![
                Span::styled(ticks[..start].iter().collect::<String>(), tick_style),
                Span::styled(
                    readout.clone(),
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                ),
                Span::styled(ticks[start + len..].iter().collect::<String>(), tick_style),
            ]
        }
        None => vec![Span::styled(ticks.into_iter().collect::<String>(), tick_style)],
    };
    frame.render_widget(
        Paragraph::new(Line::from(top_spans)),
        Rect { height: 1, ..bar },
    );

    // Bottom row: labels and fill.
    let fill = if enlarged {
        Span::styled(
            smooth_fill(view.progress, width),
            Style::default().fg(C_PLAYING).bg(C_TRACK),
        )
    } else {
        let done = usize::from(column(view.progress, bar.width));
        let line: String = (0..width)
            .map(|i| if i <= done && view.progress > 0.0 { '━' } else { '─' })
            .collect();
        Span::styled(line, Style::default().fg(C_SECONDARY))
    };
    let row = Rect {
        y: area.y + 1,
        height: 1,
        ..area
    };
    let spans = vec![
        Span::styled(
            format!("{:>w$} ", view.elapsed, w = usize::from(LABEL_WIDTH - 1)),
            Style::default().fg(C_SECONDARY),
        ),
        fill,
        Span::styled(
            format!(" {:<w$}", view.duration, w = usize::from(LABEL_WIDTH - 1)),
            Style::default().fg(C_MUTED),
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), row);
}

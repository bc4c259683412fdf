//! Search overlay: input line on top, results below.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::core::SearchView;
use crate::theme::{
    style_focused_border, style_secondary, style_selected, C_FILTER_BG, C_FILTER_FG, C_MUTED,
    C_PRIMARY,
};

const PLACEHOLDER: &str = "search title or artist";

/// Centered box, at most 70 columns wide.
pub fn overlay_rect(area: Rect) -> Rect {
    let width = area.width.saturating_sub(4).min(70);
    let height = area.height.saturating_sub(4).min(16);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + 2.min(area.height),
        width,
        height,
    }
}

pub fn draw(frame: &mut Frame, area: Rect, search: &SearchView) {
    let rect = overlay_rect(area);
    if rect.width < 10 || rect.height < 4 {
        return;
    }
    frame.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_focused_border())
        .title(Span::styled(" search ", Style::default().fg(C_PRIMARY)));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    // Input line, scrolled so the cursor stays visible.
    let input_area = Rect { height: 1, ..inner };
    let room = usize::from(input_area.width.saturating_sub(3));
    let scroll = search.cursor.saturating_sub(room);
    let display = if search.query.is_empty() {
        Span::styled(format!("/ {}", PLACEHOLDER), Style::default().fg(C_MUTED))
    } else {
        let visible: String = search.query.chars().skip(scroll).collect();
        Span::styled(format!("/ {}", visible), Style::default().fg(C_FILTER_FG))
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_FILTER_BG)),
        input_area,
    );
    if search.input_focused {
        let before: String = search.query.chars().skip(scroll).take(search.cursor - scroll).collect();
        let cursor_x = input_area.x + 2 + before.width() as u16;
        frame.set_cursor_position((
            cursor_x.min(input_area.x + input_area.width.saturating_sub(1)),
            input_area.y,
        ));
    }

    // Results, keeping the highlighted one in view.
    let list_area = Rect {
        y: inner.y + 1,
        height: inner.height.saturating_sub(1),
        ..inner
    };
    let rows = usize::from(list_area.height);
    if rows == 0 {
        return;
    }
    let top = search
        .highlighted
        .map(|h| (h + 1).saturating_sub(rows))
        .unwrap_or(0);
    let lines: Vec<Line> = search
        .results
        .iter()
        .enumerate()
        .skip(top)
        .take(rows)
        .map(|(i, (title, artist))| {
            let selected = search.highlighted == Some(i);
            let base = if selected { style_selected() } else { Style::default().fg(C_PRIMARY) };
            Line::from(vec![
                Span::styled(if selected { "› " } else { "  " }, base),
                Span::styled(title.clone(), base),
                Span::styled(format!("  {}", artist), if selected { base } else { style_secondary() }),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), list_area);
}

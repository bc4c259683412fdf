//! Notice popup in the top-right corner.  One notice at a time.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::notice::Severity;
use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS};

pub fn draw(frame: &mut Frame, area: Rect, text: &str, severity: Severity) {
    if area.height < 2 || area.width < 8 {
        return;
    }
    let max_width = (area.width / 2).clamp(20, 60).min(area.width);

    let (color, icon) = match severity {
        Severity::Info => (C_TOAST_INFO, "·"),
        Severity::Success => (C_TOAST_SUCCESS, "✓"),
        Severity::Error => (C_TOAST_ERROR, "✗"),
    };

    let msg_len = text.chars().count() as u16;
    let w = (msg_len + 4).min(max_width);
    let popup_area = Rect {
        x: area.x + area.width.saturating_sub(w + 1),
        y: area.y + 1,
        width: w,
        height: 1,
    };
    frame.render_widget(Clear, popup_area);
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        format!(" {} {} ", icon, text),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )]));
    frame.render_widget(paragraph, popup_area);
}

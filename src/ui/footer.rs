use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, ViewMode};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    match app.view_mode {
        ViewMode::ProjectSelection => {
            spans.push(hint("↑↓", "navigate"));
            spans.push(hint("enter", "select"));
            if app.project.is_some() {
                spans.push(hint("esc", "back"));
            }
            spans.push(hint("r", "reload"));
            spans.push(hint("q", "quit"));
        }
        ViewMode::Items => {
            spans.push(hint("↑↓", "navigate"));
            spans.push(hint(":", "instruct"));
            spans.push(hint("/", "search"));
            spans.push(hint("t", "type"));
            spans.push(hint("u", "assignee"));
            spans.push(hint("r", "refresh"));
            spans.push(hint("p", "project"));
            spans.push(hint("q", "quit"));

            if let Some(item_type) = &app.type_filter {
                spans.push(badge(item_type.as_str()));
            }
            if let Some(user) = &app.assignee_filter {
                spans.push(badge(user));
            }
            if !app.search.is_empty() {
                spans.push(badge(&format!("/{}", app.search)));
            }
        }
    }

    if let Some((msg, _)) = &app.flash_message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(msg.as_str(), Style::default().fg(Color::Yellow)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn hint(key: &str, desc: &str) -> Span<'static> {
    Span::styled(format!(" {key}:{desc} "), Style::default().fg(Color::DarkGray))
}

fn badge(text: &str) -> Span<'static> {
    Span::styled(
        format!(" {text} "),
        Style::default().fg(Color::Black).bg(Color::Cyan),
    )
}

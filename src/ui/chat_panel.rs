use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::model::chat::ChatSender;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let mut all_lines: Vec<Line> = Vec::new();

    for msg in &app.chat_messages {
        let (name, name_color, body_color) = match msg.sender {
            ChatSender::User => ("you", Color::White, Color::White),
            ChatSender::Assistant => ("agent", Color::Cyan, Color::Rgb(0xCC, 0xCC, 0xCC)),
            ChatSender::System => ("system", Color::Yellow, Color::Yellow),
        };

        all_lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", msg.timestamp),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                name,
                Style::default().fg(name_color).add_modifier(Modifier::BOLD),
            ),
        ]));

        for text_line in msg.text.lines() {
            let color = if text_line.starts_with('✗') {
                Color::Red
            } else if text_line.starts_with('✓') {
                Color::Green
            } else {
                body_color
            };
            all_lines.push(Line::from(Span::styled(
                format!("  {text_line}"),
                Style::default().fg(color),
            )));
        }

        all_lines.push(Line::raw(""));
    }

    if app.waiting_for_response {
        all_lines.push(Line::from(Span::styled(
            "  working...",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    // Auto-scroll to bottom
    let skip = all_lines.len().saturating_sub(visible_height);
    let visible_lines: Vec<Line> = all_lines.into_iter().skip(skip).collect();

    let msg_count = app.chat_messages.len();
    let title = if msg_count > 0 {
        format!(" Chat ({msg_count}) ")
    } else {
        " Chat: press : to give an instruction ".to_string()
    };

    let paragraph = Paragraph::new(visible_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(title),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, InputMode};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    if !app.input_active {
        return;
    }

    let (title, color) = match app.input_mode {
        InputMode::Instruction if app.input_buffer.is_empty() => (
            " Instruction: e.g. add a bug for the login timeout under Auth ",
            Color::Yellow,
        ),
        InputMode::Instruction => (" Instruction ", Color::Yellow),
        InputMode::Search => (" Search titles ", Color::Cyan),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title);

    // Keep the cursor in view on long input
    let width = area.width.saturating_sub(2) as usize;
    let skip = app.input_cursor.saturating_sub(width.saturating_sub(1));
    let shown: String = app.input_buffer.chars().skip(skip).collect();

    let paragraph = Paragraph::new(Line::raw(shown)).block(block);
    f.render_widget(paragraph, area);

    let x = area.x + 1 + (app.input_cursor - skip) as u16;
    let y = area.y + 1;
    f.set_cursor_position((x.min(area.x + area.width.saturating_sub(2)), y));
}

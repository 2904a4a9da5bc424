pub mod chat_panel;
pub mod command_bar;
pub mod detail_panel;
pub mod footer;
pub mod item_list;
pub mod project_picker;
pub mod theme;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::{App, InputMode, ViewMode};

pub fn render(f: &mut Frame, app: &App) {
    let size = f.area();

    // Command bar (3) while typing, footer (1) otherwise
    let bottom_height = if app.input_active { 3 } else { 1 };

    let show_chat = !app.chat_messages.is_empty()
        || app.waiting_for_response
        || (app.input_active && app.input_mode == InputMode::Instruction);
    let chat_height = if show_chat { 12 } else { 0 };

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(chat_height),
            Constraint::Length(bottom_height),
        ])
        .split(size);

    let main_area = vertical[0];
    let chat_area = vertical[1];
    let bottom_area = vertical[2];

    match app.view_mode {
        ViewMode::ProjectSelection => {
            project_picker::render(f, main_area, app);
        }
        ViewMode::Items => {
            let horizontal = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
                .split(main_area);

            item_list::render(f, horizontal[0], app);
            detail_panel::render(f, horizontal[1], app);
        }
    }

    if show_chat {
        chat_panel::render(f, chat_area, app);
    }

    if app.input_active {
        command_bar::render(f, bottom_area, app);
    } else {
        footer::render(f, bottom_area, app);
    }
}

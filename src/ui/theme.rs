use ratatui::style::Color;

use crate::model::work_item::WorkItemType;

pub const NEW_ITEM: Color = Color::Green;

pub fn type_color(item_type: Option<&WorkItemType>) -> Color {
    match item_type {
        Some(WorkItemType::Epic) => Color::Rgb(0xFF, 0x7B, 0x00),
        Some(WorkItemType::Feature) => Color::Rgb(0x77, 0x3B, 0x93),
        Some(WorkItemType::UserStory) => Color::Rgb(0x00, 0x98, 0xC7),
        Some(WorkItemType::Task) => Color::Rgb(0xF2, 0xCB, 0x1D),
        Some(WorkItemType::Bug) => Color::Rgb(0xCC, 0x29, 0x3D),
        Some(WorkItemType::Other(_)) | None => Color::Gray,
    }
}

pub fn state_color(state: &str) -> Color {
    match state.to_ascii_lowercase().as_str() {
        "new" | "to do" | "proposed" => Color::Gray,
        "active" | "in progress" | "committed" | "doing" => Color::Cyan,
        "resolved" | "review" => Color::Yellow,
        "closed" | "done" | "completed" => Color::Green,
        "removed" | "cut" => Color::DarkGray,
        _ => Color::White,
    }
}

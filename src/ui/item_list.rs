use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::ui::theme::{state_color, type_color, NEW_ITEM};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let visible = app.visible_items();

    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let selected = i == app.selected_item;

            let marker = if item.is_new {
                Span::styled("● ", Style::default().fg(NEW_ITEM))
            } else {
                Span::raw("  ")
            };

            let id_span = Span::styled(
                format!("{:>6} ", item.id),
                Style::default().fg(Color::DarkGray),
            );

            let type_span = Span::styled(
                format!("{:<10} ", clip(item.type_label(), 10)),
                Style::default().fg(type_color(item.item_type.as_ref())),
            );

            let max_title = area.width.saturating_sub(36) as usize;
            let mut title_style = if item.is_new {
                Style::default().fg(NEW_ITEM)
            } else {
                Style::default()
            };
            if selected {
                title_style = title_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
            }
            let title_span = Span::styled(clip(&item.title, max_title), title_style);

            let state = item.state.as_deref().unwrap_or("");
            let state_span = Span::styled(format!(" [{state}]"), Style::default().fg(state_color(state)));

            ListItem::new(Line::from(vec![marker, id_span, type_span, title_span, state_span]))
        })
        .collect();

    let mut title = format!(" {} ", app.project.as_deref().unwrap_or("Work Items"));
    if visible.len() != app.items.len() {
        title.push_str(&format!("({}/{}) ", visible.len(), app.items.len()));
    } else {
        title.push_str(&format!("({}) ", app.items.len()));
    }
    let new_count = app.new_item_count();
    if new_count > 0 {
        title.push_str(&format!("+{new_count} new "));
    }
    if app.loading {
        title.push_str("(loading...) ");
    }

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::Rgb(0x22, 0x22, 0x33)));

    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.selected_item));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

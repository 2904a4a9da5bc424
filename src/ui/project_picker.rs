use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .projects
        .iter()
        .enumerate()
        .map(|(i, project)| {
            let selected = i == app.selected_project;
            let recent = app.recent_projects.contains(project);

            let marker = if recent {
                Span::styled("★ ", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("  ")
            };
            let style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let mut spans = vec![marker, Span::styled(project.clone(), style)];
            if app.project.as_deref() == Some(project.as_str()) {
                spans.push(Span::styled(" (current)", Style::default().fg(Color::DarkGray)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if app.loading {
        " Projects (loading...) ".to_string()
    } else if app.projects.is_empty() {
        " Projects: none found, press r to reload ".to_string()
    } else {
        format!(" Projects ({}) ", app.projects.len())
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::Rgb(0x22, 0x22, 0x33)));

    let mut state = ListState::default();
    if !app.projects.is_empty() {
        state.select(Some(app.selected_project));
    }
    f.render_stateful_widget(list, area, &mut state);
}

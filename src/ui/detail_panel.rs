use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use crate::app::App;
use crate::ui::theme::{state_color, type_color};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Details ");

    let Some(item) = app.selected() else {
        f.render_widget(block, area);
        return;
    };

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            item.title.clone(),
            Style::default().fg(Color::White),
        )),
        Line::raw(""),
        field("ID", format!("#{}", item.id), Color::White),
        field(
            "Type",
            item.type_label().to_string(),
            type_color(item.item_type.as_ref()),
        ),
    ];

    if let Some(state) = &item.state {
        lines.push(field("State", state.clone(), state_color(state)));
    }
    lines.push(field("Assigned", item.assignee_label().to_string(), Color::White));
    if let Some(parent) = item.parent_label() {
        lines.push(field("Parent", parent, Color::White));
    }
    if item.is_new {
        lines.push(Line::from(Span::styled(
            "new since last refresh",
            Style::default().fg(crate::ui::theme::NEW_ITEM),
        )));
    }

    if !item.fields.is_empty() {
        lines.push(Line::raw(""));
        for (name, value) in &item.fields {
            let short = name.rsplit('.').next().unwrap_or(name);
            lines.push(field(short, display_value(value), Color::Gray));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn field(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn display_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => map
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    };
    text.chars().take(200).collect()
}

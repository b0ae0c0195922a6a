use crate::app::{App, FocusPane, InputMode};
use adgen_core::{ChatMessage, ChatRole, TurnState};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

/// Parse simple markdown (**bold**) into styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing **, treat as literal
            _ => break,
        }
    }
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Labels of the quick action buttons, whatever shape the backend sent them in
fn quick_action_labels(value: &Value) -> Vec<String> {
    let label = |item: &Value| -> Option<String> {
        match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["label", "text", "title"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    };
    match value {
        Value::Array(items) => items.iter().filter_map(label).collect(),
        other => label(other).into_iter().collect(),
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [chat_column, campaign_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
            .areas(body_area);
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(chat_column);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_campaign(app, frame, campaign_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let state = app.conversation.state();
    let state_style = match state {
        TurnState::Idle => Style::default().fg(Color::Green),
        TurnState::Errored => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::Yellow),
    };

    let mut spans = vec![
        Span::styled(" adgen ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("[{}] ", state), state_style),
        Span::styled(app.endpoint().to_string(), Style::default().fg(Color::DarkGray)),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled(
            format!("  {}", status),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn message_lines(app: &App, msg: &ChatMessage, is_open: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(msg.content.clone()));
        }
        ChatRole::Assistant => {
            let mut role = vec![Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )];
            if msg.is_question {
                role.push(Span::styled(" (asking)", Style::default().fg(Color::DarkGray)));
            }
            lines.push(Line::from(role));

            if msg.content.is_empty() && is_open {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            for line in msg.content.lines() {
                lines.push(parse_markdown_line(line));
            }

            if let Some(image) = &msg.image_ref {
                let label = if msg.image_loading {
                    format!("[generating image: {}]", image.display_short())
                } else {
                    format!("[image: {}]", image.display_short())
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(Color::Magenta),
                )));
            } else if msg.image_loading {
                lines.push(Line::from(Span::styled(
                    "[generating image...]",
                    Style::default().fg(Color::Magenta),
                )));
            }
        }
    }
    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Inner size minus borders
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let border_color = if app.focus == FocusPane::Chat {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let transcript = app.conversation.transcript();
    let text = if transcript.is_empty() {
        Text::from(Span::styled(
            "Describe the campaign you want to create...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let open_index = transcript.len().checked_sub(1).filter(|_| app.is_busy());
        let lines: Vec<Line> = transcript
            .iter()
            .enumerate()
            .flat_map(|(i, msg)| message_lines(app, msg, Some(i) == open_index))
            .collect();
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let title = if app.is_busy() {
        " Message (reply streaming) "
    } else {
        " Message "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn section(lines: &mut Vec<Line<'static>>, title: &str) {
    if !lines.is_empty() {
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )));
}

fn placeholder(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

fn campaign_lines(app: &App) -> Vec<Line<'static>> {
    let side = &app.side_channel;
    let mut lines = Vec::new();

    section(&mut lines, "Title");
    lines.push(if side.title.is_empty() {
        placeholder("(none yet)")
    } else {
        Line::from(side.title.clone())
    });

    section(&mut lines, "SMS draft");
    if side.draft_text.is_empty() {
        lines.push(placeholder("(none yet)"));
    } else {
        lines.extend(side.draft_text.lines().map(|l| Line::from(l.to_string())));
    }

    section(&mut lines, "Image");
    lines.push(match app.current_image() {
        Some(image) => Line::from(image.display_short()),
        None => placeholder("(none yet)"),
    });

    if let Some(actions) = &side.quick_actions {
        let labels = quick_action_labels(actions);
        if !labels.is_empty() {
            section(&mut lines, "Quick actions");
            lines.extend(labels.into_iter().map(|l| Line::from(format!(" [{}]", l))));
        }
    }

    if let Some(recommendation) = &side.recommendation {
        section(&mut lines, "Recommendation");
        let text = match recommendation {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        lines.extend(text.lines().map(|l| Line::from(l.to_string())));
    }

    if !side.templates.is_empty() {
        section(&mut lines, "Templates");
        for template in &side.templates {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} ", template.created_at.format("%H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(template.title.clone(), Style::default().bold()),
            ]));
            if !template.description.is_empty() {
                lines.push(Line::from(format!("  {}", template.description)));
            }
            lines.push(placeholder(&format!("  {}", template.image_ref.display_short())));
        }
    }

    lines
}

fn render_campaign(app: &mut App, frame: &mut Frame, area: Rect) {
    app.campaign_area = Some(area);

    let border_color = if app.focus == FocusPane::Campaign {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Campaign ");

    let panel = Paragraph::new(Text::from(campaign_lines(app)))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.campaign_scroll, 0));
    frame.render_widget(panel, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        InputMode::Normal => {
            let mut hints = vec![
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
            ];
            if app.is_busy() {
                hints.extend(vec![
                    Span::styled(" Esc ", key_style),
                    Span::styled(" cancel ", label_style),
                ]);
            }
            hints.extend(vec![
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use ollama_chat_core::{Message, MessageKind};
use crate::app::App;

const MAX_INPUT_ROWS: u16 = 5;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' || chars.peek() != Some(&'*') {
            current_text.push(c);
            continue;
        }
        chars.next();

        if !current_text.is_empty() {
            spans.push(Span::raw(std::mem::take(&mut current_text)));
        }

        // Find closing **
        let mut bold_text = String::new();
        let mut found_close = false;
        while let Some(c) = chars.next() {
            if c == '*' && chars.peek() == Some(&'*') {
                chars.next();
                found_close = true;
                break;
            }
            bold_text.push(c);
        }

        if found_close && !bold_text.is_empty() {
            spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
        } else {
            // No closing **, treat as literal
            current_text.push_str("**");
            current_text.push_str(&bold_text);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Indicator colour for a connectivity style tag
fn status_color(class: &str) -> Color {
    match class {
        "status-connected" => Color::Green,
        "status-connecting" => Color::Yellow,
        "status-disconnected" => Color::Red,
        _ => Color::DarkGray,
    }
}

/// Rows a line of `chars` characters occupies when wrapped at `width`
fn wrapped_rows(chars: usize, width: usize) -> u16 {
    if chars == 0 || width == 0 {
        1
    } else {
        u16::try_from(chars.div_ceil(width)).unwrap_or(u16::MAX)
    }
}

fn message_lines(messages: &[Message]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for msg in messages {
        let (label, color) = match msg.kind {
            MessageKind::User => ("You:", Color::Cyan),
            MessageKind::Assistant => ("AI:", Color::Yellow),
            MessageKind::Error => ("Error:", Color::Red),
        };
        lines.push(Line::from(vec![
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!(" {}", msg.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        match msg.kind {
            MessageKind::Assistant => lines.extend(msg.content.lines().map(parse_markdown_line)),
            MessageKind::Error => lines.extend(
                msg.content
                    .lines()
                    .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Red)))),
            ),
            MessageKind::User => lines.extend(msg.content.lines().map(|line| Line::from(line.to_string()))),
        }
        lines.push(Line::default());
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_rows = (app.session.input.matches('\n').count() as u16 + 1).min(MAX_INPUT_ROWS);

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_rows + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_clear_confirm {
        render_clear_confirm(frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let class = app.session.status_class();

    let title = Line::from(vec![
        Span::styled(" Ollama AI Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("● ", Style::default().fg(status_color(class))),
        Span::styled(app.session.status_label(), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(app.session.selected_model.clone(), Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, used for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let mut lines = message_lines(&app.messages());

    if app.session.is_pending() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let width = app.chat_width as usize;
    let total_rows = lines
        .iter()
        .map(|line| wrapped_rows(line.width(), width))
        .fold(0u16, u16::saturating_add);
    let max_scroll = total_rows.saturating_sub(app.chat_height);

    if app.follow_tail || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_tail = true;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.session.client().get_url()));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.session.is_pending() { Color::DarkGray } else { Color::Yellow };
    let title = if app.session.is_pending() { " Waiting for response... " } else { " Message " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_rows = area.height.saturating_sub(2) as usize;
    let (cursor_row, cursor_col) = app.cursor_position();

    // Keep the cursor visible both ways
    let row_offset = (cursor_row + 1).saturating_sub(inner_rows);
    let col_offset = (cursor_col + 1).saturating_sub(inner_width);

    let visible: Vec<Line> = app
        .session
        .input
        .split('\n')
        .skip(row_offset)
        .take(inner_rows)
        .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
        .collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if !app.show_clear_confirm && !app.show_model_picker {
        frame.set_cursor_position((
            area.x + 1 + cursor_col.saturating_sub(col_offset) as u16,
            area.y + 1 + cursor_row.saturating_sub(row_offset) as u16,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let content = if let Some(notice) = &app.notice {
        Line::from(Span::styled(format!(" {} ", notice), Style::default().fg(Color::Red)))
    } else {
        Line::from(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift/Alt+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" ^O ", key_style),
            Span::styled(" model ", label_style),
            Span::styled(" ^R ", key_style),
            Span::styled(" reconnect ", label_style),
            Span::styled(" ^L ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ])
    };

    let footer = Paragraph::new(content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn render_clear_confirm(frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 52, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear chat ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to clear the chat history?"),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" yes   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup_area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 50, app.available_models.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.session.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ollama_chat_core::EndpointConfig;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn bold_markdown_becomes_styled_span() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        assert_eq!(line_text(&parse_markdown_line("2 ** 3")), "2 ** 3");
    }

    #[test]
    fn wrapping_counts_rows() {
        assert_eq!(wrapped_rows(0, 10), 1);
        assert_eq!(wrapped_rows(10, 10), 1);
        assert_eq!(wrapped_rows(11, 10), 2);
        assert_eq!(wrapped_rows(200_000, 1), u16::MAX);
    }

    #[test]
    fn status_tags_map_to_colours() {
        assert_eq!(status_color("status-connected"), Color::Green);
        assert_eq!(status_color("status-connecting"), Color::Yellow);
        assert_eq!(status_color("status-disconnected"), Color::Red);
    }

    #[test]
    fn error_messages_are_labelled() {
        let lines = message_lines(&[Message::error("boom")]);
        assert!(line_text(&lines[0]).starts_with("Error:"));
        assert_eq!(line_text(&lines[1]), "boom");
    }

    #[tokio::test]
    async fn renders_greeting_and_status() {
        let mut app = App::new(EndpointConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gemma3:1b".to_string(),
            timeout: Duration::from_millis(200),
        });
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("Ollama AI Assistant"));
        assert!(screen.contains("Connecting..."));
        assert!(screen.contains("Hello! I'm your local AI assistant"));
    }
}

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};

use diagramgen::Status;

use crate::app::{App, Focus, InputMode, TextInput};

/// Slice of a single-line input that keeps the cursor inside `width` columns.
///
/// Returns the visible text and the cursor column within it.
fn visible_window(input: &TextInput, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }
    let skip = (input.cursor + 1).saturating_sub(width);
    let text: String = input.value.chars().skip(skip).take(width).collect();
    (text, (input.cursor - skip) as u16)
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

    let [left_area, right_area] = Layout::horizontal([
        Constraint::Percentage(45),
        Constraint::Percentage(55),
    ])
    .areas(body_area);

    let [description_area, feedback_area, diagram_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(left_area);

    let [code_area, output_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(8),
    ])
    .areas(right_area);

    render_input(app, frame, description_area, Focus::Description);
    render_input(app, frame, feedback_area, Focus::Feedback);
    render_diagram_panel(app, frame, diagram_area);
    render_code(app, frame, code_area);
    render_output(app, frame, output_area);
    render_footer(app, frame, footer_area);

    // Store areas for mouse hit-testing
    app.code_area = Some(code_area);
    app.output_area = Some(output_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" diagramgen ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{}: {} ", app.provider.as_str(), app.model),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn border_color(app: &App, pane: Focus) -> Color {
    match (app.focus == pane, app.input_mode) {
        (true, InputMode::Editing) if pane.is_input() => Color::Yellow,
        (true, _) => Color::Cyan,
        (false, _) => Color::DarkGray,
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, pane: Focus) {
    let (input, title, placeholder) = match pane {
        Focus::Description => (
            &app.description,
            " Architecture description ",
            "e.g. Users hit a load balancer in front of two web servers backed by Postgres",
        ),
        _ => {
            let placeholder = if app.session.has_diagram() {
                "Describe a change, e.g. add a Redis cache"
            } else {
                "Generate a diagram first"
            };
            (&app.feedback, " Feedback ", placeholder)
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app, pane)))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (text, cursor_x) = visible_window(input, inner_width);

    let paragraph = if input.value.is_empty() {
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(text).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(paragraph.block(block), area);

    if app.input_mode == InputMode::Editing && app.focus == pane {
        frame.set_cursor_position((area.x + 1 + cursor_x, area.y + 1));
    }
}

fn render_diagram_panel(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Diagram ");

    let label = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();

    if app.is_busy() {
        lines.push(Line::from(Span::styled(
            format!("{} Generating diagram...", app.spinner()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
    } else {
        match app.session.status() {
            Status::Idle => lines.push(Line::from(Span::styled(
                "Describe your architecture above and press Enter.",
                label,
            ))),
            Status::Generated(message) => lines.push(Line::from(Span::styled(
                format!("✔ {}", message),
                Style::default().fg(Color::Green),
            ))),
            Status::Accepted => lines.push(Line::from(Span::styled(
                "✔ Diagram accepted. Press n to start a new one.",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ))),
            Status::Failed(message) => {
                lines.push(Line::from(Span::styled(
                    "Diagram generation failed.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))));
            }
        }
    }
    lines.push(Line::default());

    if let Some(image) = app.session.image() {
        lines.push(Line::from(vec![
            Span::styled("Image:      ", label),
            Span::raw(image.path.display().to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Size:       ", label),
            Span::raw(format!("{:.1} KB", image.bytes as f64 / 1024.0)),
        ]));
        if let Some((width, height)) = image.dimensions {
            lines.push(Line::from(vec![
                Span::styled("Dimensions: ", label),
                Span::raw(format!("{} x {}", width, height)),
            ]));
        }
        if matches!(app.session.status(), Status::Failed(_)) {
            lines.push(Line::from(Span::styled("(previous diagram kept)", label)));
        }
        lines.push(Line::from(vec![
            Span::styled("Press ", label),
            Span::styled("o", Style::default().fg(Color::Cyan).bold()),
            Span::styled(" to open it in your image viewer.", label),
        ]));
        lines.push(Line::default());
    }

    if let Some(prompt) = app.session.original_prompt() {
        lines.push(Line::from(Span::styled("Prompt", label)));
        lines.push(Line::from(prompt.to_string()));
        lines.push(Line::default());
        let iterations = app.session.state().map(|s| s.iteration).unwrap_or(0);
        lines.push(Line::from(vec![
            Span::styled("Feedback rounds: ", label),
            Span::raw(app.session.feedback_rounds().to_string()),
            Span::styled("   Iterations: ", label),
            Span::raw(iterations.to_string()),
        ]));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn latest_code(app: &App) -> Option<&str> {
    app.session
        .state()
        .and_then(|s| s.latest_code())
        .or_else(|| app.session.last_report().map(|r| r.code.as_str()))
}

fn render_code(app: &App, frame: &mut Frame, area: Rect) {
    let iteration = app.session.state().map(|s| s.iteration).unwrap_or(0);
    let title = if iteration > 0 {
        format!(" Generated code (v{}) ", iteration)
    } else {
        " Generated code ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app, Focus::Code)))
        .title(title);

    let Some(code) = latest_code(app) else {
        let empty = Paragraph::new(Span::styled(
            "No code yet.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(empty, area);
        return;
    };

    let total = code.lines().count();
    let width = total.to_string().len();
    let lines: Vec<Line> = code
        .lines()
        .enumerate()
        .map(|(i, line)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>width$} ", i + 1, width = width),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(line),
            ])
        })
        .collect();

    let visible = area.height.saturating_sub(2);
    let max_scroll = (total as u16).saturating_sub(visible);
    let scroll = app.code_scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);

    if total as u16 > visible {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state = ScrollbarState::new(max_scroll as usize).position(scroll as usize);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_output(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app, Focus::Output)))
        .title(" Interpreter output ");

    let text = match app.session.last_report() {
        Some(report) if report.output.is_empty() => {
            Text::from(Span::styled("(no output)", Style::default().fg(Color::DarkGray)))
        }
        Some(report) => {
            let style = if report.succeeded() {
                Style::default()
            } else {
                Style::default().fg(Color::Red)
            };
            Text::styled(report.output.clone(), style)
        }
        None => Text::default(),
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.output_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(notice) = &app.notice {
        spans.push(Span::styled(
            format!(" {} ", notice),
            Style::default().bg(Color::Red).fg(Color::White),
        ));
    } else {
        let hints: Vec<(&str, &str)> = match app.input_mode {
            InputMode::Editing => {
                let submit = if app.focus == Focus::Feedback { " update " } else { " generate " };
                vec![
                    ("Enter", submit),
                    ("Tab", " switch "),
                    ("Esc", " normal "),
                    ("^N", " new "),
                    ("^O", " open "),
                ]
            }
            InputMode::Normal => vec![
                ("d", " describe "),
                ("f", " feedback "),
                ("Tab", " focus "),
                ("j/k", " scroll "),
                ("o", " open "),
                ("n", " new "),
                ("q", " quit "),
            ],
        };
        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(label, label_style));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

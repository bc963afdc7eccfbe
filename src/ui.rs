use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use crate::app::{
    App, Role, STATUS_CHECKING, STATUS_KEY_PRESENT, STATUS_READY, STATUS_THINKING,
};
use crate::page::{self, Section, SectionMap, DETAILS, INTRO};

const DEMO_BUTTON: &str = " F2 Demo ";
const DETAILS_BUTTON: &str = " F3 Details ";
const EMPTY_TRANSCRIPT_HINT: &str =
    "Ask about deductions, documents, or what to prepare for this year's return...";
const BUBBLE_INDENT: &str = "  ";

/// Parse text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current_text), base));
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
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }
    spans
}

fn line_count(lines: &[Line]) -> u16 {
    u16::try_from(lines.len()).unwrap_or(u16::MAX)
}

fn push_heading(lines: &mut Vec<Line<'static>>, section: Section, width: usize) {
    let title = format!(" {} ", section.title());
    let rule = "─".repeat(width.saturating_sub(title.width() + 2));
    lines.push(Line::from(vec![
        Span::styled("──", Style::default().fg(Color::DarkGray)),
        Span::styled(title, Style::default().fg(Color::Cyan).bold()),
        Span::styled(rule, Style::default().fg(Color::DarkGray)),
    ]));
    lines.push(Line::default());
}

fn push_paragraph(lines: &mut Vec<Line<'static>>, text: &str, width: usize, style: Style) {
    for wrapped in page::wrap(text, width) {
        lines.push(Line::from(Span::styled(wrapped, style)));
    }
    lines.push(Line::default());
}

/// Lay out the whole page at `width` columns and record where each section starts.
fn page_lines(app: &App, width: usize) -> (Vec<Line<'static>>, SectionMap) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let text_width = width.saturating_sub(BUBBLE_INDENT.len()).max(1);

    let intro = line_count(&lines);
    push_heading(&mut lines, Section::Intro, width);
    for paragraph in INTRO {
        push_paragraph(&mut lines, paragraph, width, Style::default());
    }

    let demo = line_count(&lines);
    push_heading(&mut lines, Section::Demo, width);
    if app.transcript().is_empty() {
        push_paragraph(
            &mut lines,
            EMPTY_TRANSCRIPT_HINT,
            width,
            Style::default().fg(Color::DarkGray),
        );
    }
    for bubble in app.transcript() {
        let (label, color) = match bubble.role {
            Role::User => ("You:", Color::Cyan),
            Role::Agent => ("SteuerPilot:", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        // Markdown is resolved before wrapping so bold survives line breaks.
        let styled = match bubble.role {
            Role::User => vec![Span::styled(bubble.text.clone(), Style::default().fg(Color::Cyan))],
            Role::Agent => parse_markdown_line(&bubble.text, Style::default()),
        };
        let runs: Vec<(Style, &str)> = styled
            .iter()
            .map(|span| (span.style, span.content.as_ref()))
            .collect();
        for wrapped in page::wrap_styled(&runs, text_width) {
            let mut spans = vec![Span::raw(BUBBLE_INDENT)];
            spans.extend(
                wrapped
                    .into_iter()
                    .map(|(style, text)| Span::styled(text, style)),
            );
            lines.push(Line::from(spans));
        }
        lines.push(Line::default());
    }
    let demo_end = line_count(&lines);

    let details = line_count(&lines);
    push_heading(&mut lines, Section::Details, width);
    for paragraph in DETAILS {
        push_paragraph(&mut lines, paragraph, width, Style::default().fg(Color::Gray));
    }

    (lines, SectionMap::new(intro, demo, details, demo_end))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, page, input, status footer
    let [header_area, page_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_page(app, frame, page_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = " SteuerPilot ";
    let version = format!(" v{} ", env!("CARGO_PKG_VERSION"));

    let [title_area, demo_area, _, details_area, version_area] = Layout::horizontal([
        Constraint::Length(title.len() as u16),
        Constraint::Length(DEMO_BUTTON.len() as u16),
        Constraint::Length(1),
        Constraint::Length(DETAILS_BUTTON.len() as u16),
        Constraint::Min(0),
    ])
    .areas(area);

    // Store button areas for mouse hit-testing
    app.demo_button_area = Some(demo_area);
    app.details_button_area = Some(details_area);

    let button_style = Style::default().bg(Color::Blue).fg(Color::White);

    frame.render_widget(
        Paragraph::new(Span::styled(title, Style::default().fg(Color::Cyan).bold()))
            .style(Style::default().bg(Color::DarkGray)),
        title_area,
    );
    frame.render_widget(Paragraph::new(DEMO_BUTTON).style(button_style), demo_area);
    frame.render_widget(Paragraph::new(DETAILS_BUTTON).style(button_style), details_area);
    frame.render_widget(
        Paragraph::new(Span::styled(version, Style::default().fg(Color::Gray)))
            .style(Style::default().bg(Color::DarkGray)),
        version_area,
    );
}

fn render_page(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);

    let (lines, sections) = page_lines(app, inner.width as usize);
    let content_height = line_count(&lines);
    app.page.set_layout(inner.height, content_height, sections);

    let offset = app.page.offset();
    let current = Section::ALL
        .into_iter()
        .filter(|section| sections.start(*section) <= offset)
        .last()
        .unwrap_or(Section::Intro);
    let block = block.title(format!(" {} ", current.title()));

    let paragraph = Paragraph::new(lines).block(block).scroll((offset, 0));
    frame.render_widget(paragraph, area);

    if content_height > inner.height {
        let mut scrollbar_state = ScrollbarState::new(
            content_height.saturating_sub(inner.height) as usize,
        )
        .position(offset as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let title = if app.is_awaiting_reply() {
        " Message (waiting for reply) "
    } else {
        " Message (Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn status_style(status: &str) -> Style {
    match status {
        STATUS_THINKING => Style::default().bg(Color::Yellow).fg(Color::Black),
        STATUS_READY | STATUS_KEY_PRESENT => Style::default().bg(Color::Green).fg(Color::Black),
        STATUS_CHECKING => Style::default().bg(Color::DarkGray).fg(Color::White),
        _ => Style::default().bg(Color::Red).fg(Color::White),
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(format!(" {} ", app.status()), status_style(app.status())),
        Span::styled(" ", label_style),
    ];
    spans.extend(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" F2 ", key_style),
        Span::styled(" demo ", label_style),
        Span::styled(" F3 ", key_style),
        Span::styled(" details ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

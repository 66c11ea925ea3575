use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use support_chat_core::format::local_bubble_time;
use support_chat_core::Message;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use crate::app::App;

const TITLE: &str = "TechStore Support";
const SUBTITLE: &str = "AI-powered assistance";
const WELCOME: &str = "👋 Welcome to TechStore Support";
const WELCOME_HINT: &str = "Ask me anything about shipping, returns, or products!";

const USER_BUBBLE: Color = Color::Blue;
const AI_BUBBLE: Color = Color::Gray;

/// Bubbles take at most this share of the chat width
const BUBBLE_WIDTH_PERCENT: usize = 70;

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Wrap text to fit within a given number of terminal columns.
/// Existing line breaks are kept; words wider than the width are split.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let first = lines.len();
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word_len = UnicodeWidthStr::width(word);

            // Hard-break words that can never fit
            let mut rest = word;
            while word_len > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current_line));
                    current_len = 0;
                }
                let mut taken = 0;
                let mut split_at = 0;
                for (idx, c) in rest.char_indices() {
                    let w = char_width(c);
                    // Always take one char so a glyph wider than the line still progresses
                    if taken + w > width && split_at > 0 {
                        break;
                    }
                    taken += w;
                    split_at = idx + c.len_utf8();
                }
                lines.push(rest[..split_at].to_string());
                rest = &rest[split_at..];
                word_len = word_len.saturating_sub(taken);
            }

            if rest.is_empty() {
                continue;
            }
            if current_len == 0 {
                current_line = rest.to_string();
                current_len = word_len;
            } else if current_len + 1 + word_len <= width {
                current_line.push(' ');
                current_line.push_str(rest);
                current_len += 1 + word_len;
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = rest.to_string();
                current_len = word_len;
            }
        }

        // Blank paragraphs still take a line
        if !current_line.is_empty() || lines.len() == first {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// ` text ` padded with trailing spaces to `inner` columns
fn pad_to_width(text: &str, inner: usize) -> String {
    let fill = inner.saturating_sub(UnicodeWidthStr::width(text));
    format!(" {}{} ", text, " ".repeat(fill))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = if app.state().error().is_some() { 1 } else { 0 };

    let [header_area, banner_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(banner_height),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    if banner_height > 0 {
        render_error_banner(app, frame, banner_area);
    }
    render_messages(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let header_style = Style::default().bg(Color::Blue).fg(Color::White);

    let [left, right] = Layout::horizontal([Constraint::Min(0), Constraint::Length(18)]).areas(area);

    let title = Paragraph::new(vec![
        Line::from(Span::raw(format!(" {}", TITLE)).bold()),
        Line::from(Span::raw(format!(" {}", SUBTITLE))),
    ])
    .style(header_style);
    frame.render_widget(title, left);

    let new_chat = Paragraph::new(vec![
        Line::from(" New Chat ").style(Style::default().bg(Color::DarkGray)),
        Line::from(" Ctrl-N ").style(Style::default().add_modifier(Modifier::DIM)),
    ])
    .alignment(Alignment::Right)
    .style(header_style);
    frame.render_widget(new_chat, right);
}

fn render_error_banner(app: &App, frame: &mut Frame, area: Rect) {
    let Some(error) = app.state().error() else {
        return;
    };
    let banner = Paragraph::new(format!(" {}", error))
        .style(Style::default().fg(Color::Red))
        .block(
            Block::default()
                .borders(Borders::LEFT)
                .border_style(Style::default().fg(Color::LightRed)),
        );
    frame.render_widget(banner, area);
}

/// One message as right- (user) or left-aligned bubble lines, plus a spacer
fn bubble_lines(message: &Message, max_width: usize) -> Vec<Line<'static>> {
    let (bg, fg, alignment) = if message.is_from_user() {
        (USER_BUBBLE, Color::White, Alignment::Right)
    } else {
        (AI_BUBBLE, Color::Black, Alignment::Left)
    };
    let style = Style::default().bg(bg).fg(fg);

    let wrapped = wrap_text_to_width(&message.text, max_width);
    let caption = local_bubble_time(&message.created_at);
    let inner = wrapped
        .iter()
        .map(|l| UnicodeWidthStr::width(l.as_str()))
        .chain(std::iter::once(UnicodeWidthStr::width(caption.as_str())))
        .max()
        .unwrap_or(0);

    let mut lines: Vec<Line<'static>> = wrapped
        .into_iter()
        .map(|text| {
            Line::from(Span::styled(pad_to_width(&text, inner), style)).alignment(alignment)
        })
        .collect();
    lines.push(
        Line::from(Span::styled(
            pad_to_width(&caption, inner),
            style.add_modifier(Modifier::DIM),
        ))
        .alignment(alignment),
    );
    lines.push(Line::default());
    lines
}

/// Three dots in a bubble, one highlighted per animation frame
fn typing_indicator(frame_idx: u8) -> Vec<Line<'static>> {
    let mut spans = vec![Span::styled(" ", Style::default().bg(AI_BUBBLE))];
    for i in 0..3u8 {
        let color = if i == frame_idx { Color::Black } else { Color::DarkGray };
        spans.push(Span::styled("● ", Style::default().bg(AI_BUBBLE).fg(color)));
    }
    vec![Line::from(spans), Line::default()]
}

fn welcome_lines(height: u16) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = (0..height.saturating_sub(2) / 2).map(|_| Line::default()).collect();
    lines.push(Line::from(Span::styled(WELCOME, Style::default().fg(Color::DarkGray).bold())).centered());
    lines.push(Line::from(Span::styled(WELCOME_HINT, Style::default().fg(Color::DarkGray))).centered());
    lines
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);

    let state = app.state();
    let lines: Vec<Line<'static>> = if state.messages().is_empty() && !state.is_loading() {
        welcome_lines(inner.height)
    } else {
        let max_width = (inner.width as usize * BUBBLE_WIDTH_PERCENT / 100)
            .saturating_sub(2)
            .max(1);
        let mut lines: Vec<Line<'static>> = state
            .messages()
            .iter()
            .flat_map(|message| bubble_lines(message, max_width))
            .collect();
        if state.is_loading() {
            lines.extend(typing_indicator(app.animation_frame));
        }
        lines
    };

    let total_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    app.update_chat_layout(total_lines, inner.height);

    let chat = Paragraph::new(lines).block(block).scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.max_scroll() > 0 {
        let mut scrollbar_state =
            ScrollbarState::new(app.max_scroll() as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.state().is_loading();
    let (border_color, title) = if busy {
        (Color::DarkGray, " Waiting for reply... ")
    } else {
        (Color::Yellow, " Message (Enter to send) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let fg = if busy { Color::DarkGray } else { Color::Cyan };
        Paragraph::new(visible_text).style(Style::default().fg(fg))
    };

    frame.render_widget(input.block(input_block), area);

    if !busy {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let session = app
        .state()
        .session_id()
        .map(|id| format!(" session {} ", id))
        .unwrap_or_else(|| " new conversation ".to_string());

    let footer = Line::from(vec![
        Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        Span::styled(
            " Enter send · Ctrl-N new chat · PgUp/PgDn scroll · Esc quit ",
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(session, Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)),
        Span::styled(format!(" {} ", app.api_url), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

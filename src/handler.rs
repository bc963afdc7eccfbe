use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::api::ChatClient;
use crate::app::{App, PendingChat};
use crate::page::Section;
use crate::tui::AppEvent;

const WHEEL_LINES: i32 = 3;

/// Runs backend calls off the UI loop and posts their results back as events.
#[derive(Clone)]
pub struct Dispatcher {
    client: ChatClient,
    tx: UnboundedSender<AppEvent>,
}

impl Dispatcher {
    pub fn new(client: ChatClient, tx: UnboundedSender<AppEvent>) -> Self {
        Self { client, tx }
    }

    pub fn check_health(&self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.health().await;
            let _ = tx.send(AppEvent::Health(result));
        });
    }

    pub fn send_chat(&self, pending: PendingChat) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.chat(&pending.request).await;
            let _ = tx.send(AppEvent::ChatReply {
                seq: pending.seq,
                result,
            });
        });
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, dispatcher: &Dispatcher) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, dispatcher),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Health(result) => app.apply_health(result),
        AppEvent::ChatReply { seq, result } => {
            app.apply_chat(seq, result);
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, dispatcher: &Dispatcher) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        // Quit
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,

        // Send
        KeyCode::Enter => {
            if let Some(pending) = app.submit() {
                dispatcher.send_chat(pending);
            }
        }

        // Section shortcuts
        KeyCode::F(2) => app.page.scroll_to(Section::Demo),
        KeyCode::F(3) => app.page.scroll_to(Section::Details),
        KeyCode::Char('1') if alt => app.page.scroll_to(Section::Demo),
        KeyCode::Char('2') if alt => app.page.scroll_to(Section::Details),

        // Page scrolling
        KeyCode::Up => app.page.scroll_by(-1),
        KeyCode::Down => app.page.scroll_by(1),
        KeyCode::PageUp => app.page.scroll_half_page(false),
        KeyCode::PageDown => app.page.scroll_half_page(true),
        KeyCode::Home if ctrl => app.page.scroll_to_top(),
        KeyCode::End if ctrl => app.page.scroll_to_bottom(),

        // Input editing
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) if !ctrl && !alt => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.page.scroll_by(-WHEEL_LINES),
        MouseEventKind::ScrollDown => app.page.scroll_by(WHEEL_LINES),
        MouseEventKind::Down(MouseButton::Left) => {
            let (x, y) = (mouse.column, mouse.row);
            if app.demo_button_area.is_some_and(|area| point_in_rect(x, y, area)) {
                debug!("demo button clicked");
                app.page.scroll_to(Section::Demo);
            } else if app
                .details_button_area
                .is_some_and(|area| point_in_rect(x, y, area))
            {
                debug!("details button clicked");
                app.page.scroll_to(Section::Details);
            }
        }
        _ => {}
    }
}

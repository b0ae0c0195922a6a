use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Turn(turn, event) => app.apply_turn_event(turn, event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let half = app.half_page() as i32;
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc => app.cancel_turn(),
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter if app.focus == FocusPane::Input => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('d') if ctrl => scroll_focused(app, half),
        KeyCode::Char('u') if ctrl => scroll_focused(app, -half),
        KeyCode::PageDown => scroll_focused(app, half),
        KeyCode::PageUp => scroll_focused(app, -half),
        KeyCode::Char('j') | KeyCode::Down => scroll_focused(app, 1),
        KeyCode::Char('k') | KeyCode::Up => scroll_focused(app, -1),
        KeyCode::Char('g') => match app.focus {
            FocusPane::Campaign => app.campaign_scroll = 0,
            _ => app.chat_scroll = 0,
        },
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        _ => {}
    }
}

fn scroll_focused(app: &mut App, delta: i32) {
    let amount = delta.unsigned_abs() as u16;
    match (app.focus, delta >= 0) {
        (FocusPane::Campaign, true) => {
            app.campaign_scroll = app.campaign_scroll.saturating_add(amount)
        }
        (FocusPane::Campaign, false) => {
            app.campaign_scroll = app.campaign_scroll.saturating_sub(amount)
        }
        (_, true) => app.scroll_chat_down(amount),
        (_, false) => app.scroll_chat_up(amount),
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if !app.query_input.trim().is_empty() {
                app.submit();
            }
        }
        KeyCode::Backspace => {
            if app.query_cursor > 0 {
                app.query_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.query_input.chars().count();
            if app.query_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.query_cursor = app.query_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.query_input.chars().count();
            app.query_cursor = (app.query_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.query_cursor = 0;
        }
        KeyCode::End => {
            app.query_cursor = app.query_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
            app.query_input.insert(byte_pos, c);
            app.query_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);
    let in_campaign = app
        .campaign_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_campaign => {
            app.campaign_scroll = app.campaign_scroll.saturating_add(3)
        }
        MouseEventKind::ScrollUp if in_campaign => {
            app.campaign_scroll = app.campaign_scroll.saturating_sub(3)
        }
        MouseEventKind::ScrollDown if in_chat => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp if in_chat => app.scroll_chat_up(3),
        _ => {}
    }
}

use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::App;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return;
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return;
      }
      KeyCode::Char('r') => {
        app.reload().await;
        return;
      }
      KeyCode::Char('n') | KeyCode::Char('j') => {
        app.select_next();
        return;
      }
      KeyCode::Char('p') | KeyCode::Char('k') => {
        app.select_previous();
        return;
      }
      _ => {}
    }
  }

  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.activate_selected().await;
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.refresh();
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.refresh();
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.refresh();
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Down | KeyCode::Tab => {
      app.select_next();
    }
    KeyCode::Up | KeyCode::BackTab => {
      app.select_previous();
    }
    KeyCode::Esc => {
      if app.input.is_empty() {
        app.should_quit = true;
      } else {
        app.clear_input();
      }
    }
    _ => {}
  }
}

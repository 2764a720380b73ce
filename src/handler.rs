use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, Focus, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_cycle().await;
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('n') => {
                app.start_new().await;
                return;
            }
            KeyCode::Char('o') => {
                app.open_image();
                return;
            }
            _ => {}
        }
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await,
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => app.focus = app.focus.next(),

        KeyCode::Char('i') | KeyCode::Enter => {
            if app.focus.is_input() {
                app.input_mode = InputMode::Editing;
                if let Some(input) = app.focused_input() {
                    input.end();
                }
            }
        }
        KeyCode::Char('d') => {
            app.focus = Focus::Description;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('f') => {
            app.focus = Focus::Feedback;
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('n') => app.start_new().await,
        KeyCode::Char('o') => app.open_image(),

        // Scrolling the code and output panes
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::Char('g') => app.scroll_up(u16::MAX),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::Description => Focus::Feedback,
                _ => Focus::Description,
            };
            if let Some(input) = app.focused_input() {
                input.end();
            }
        }
        KeyCode::Enter => match app.focus {
            Focus::Description => app.submit_description(),
            Focus::Feedback => app.submit_feedback(),
            Focus::Code | Focus::Output => app.input_mode = InputMode::Normal,
        },
        _ => {
            if !app.focus.is_input() {
                app.input_mode = InputMode::Normal;
                return;
            }
            let Some(input) = app.focused_input() else {
                return;
            };
            match key.code {
                KeyCode::Backspace => input.backspace(),
                KeyCode::Delete => input.delete(),
                KeyCode::Left => input.left(),
                KeyCode::Right => input.right(),
                KeyCode::Home => input.home(),
                KeyCode::End => input.end(),
                KeyCode::Char(c) => input.insert(c),
                _ => {}
            }
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);

    let in_code = app.code_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_output = app.output_area.is_some_and(|r| point_in_rect(x, y, r));

    let target = if in_code {
        Focus::Code
    } else if in_output {
        Focus::Output
    } else {
        return;
    };

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.focus = target;
            app.scroll_down(3);
        }
        MouseEventKind::ScrollUp => {
            app.focus = target;
            app.scroll_up(3);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_in_rect_edges() {
        let rect = Rect::new(2, 3, 4, 5);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(5, 7, rect));
        assert!(!point_in_rect(6, 3, rect));
        assert!(!point_in_rect(2, 8, rect));
    }
}

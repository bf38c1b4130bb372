use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ollama_chat_core::SubmitKey;
use crate::app::App;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if !app.show_model_picker && !app.show_clear_confirm {
                app.insert_str(&text);
            }
        }
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn submit_key(code: KeyCode) -> SubmitKey {
    match code {
        KeyCode::Enter => SubmitKey::Enter,
        _ => SubmitKey::Other,
    }
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work everywhere
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return Ok(());
    }

    app.notice = None;

    if app.show_clear_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.answer_clear(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_clear(false),
            _ => {}
        }
        return Ok(());
    }

    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => {
                app.show_model_picker = false;
            }
            KeyCode::Down => {
                app.model_picker_nav_down();
            }
            KeyCode::Up => {
                app.model_picker_nav_up();
            }
            KeyCode::Enter => {
                app.select_model();
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Char('l') if ctrl => {
            app.show_clear_confirm = true;
        }
        KeyCode::Char('r') if ctrl => {
            app.session.refresh_connectivity();
        }
        KeyCode::Char('o') if ctrl => app.request_models(),

        // Chat scrolling
        KeyCode::PageUp => {
            let step = app.half_page();
            app.scroll_up(step);
        }
        KeyCode::PageDown => {
            let step = app.half_page();
            app.scroll_down(step);
        }
        KeyCode::Char('u') if ctrl => {
            let step = app.half_page();
            app.scroll_up(step);
        }
        KeyCode::Char('d') if ctrl => {
            let step = app.half_page();
            app.scroll_down(step);
        }

        KeyCode::Enter => {
            // Many terminals cannot report Shift+Enter, so Alt+Enter also breaks the line
            let newline = key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT);
            if app.session.handle_key_submit(submit_key(key.code), newline) {
                app.sync_cursor();
                app.follow_tail = true;
            } else {
                app.insert_char('\n');
            }
        }

        // Input editing
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),

        _ => {}
    }
    Ok(())
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use ollama_chat_core::EndpointConfig;
    use std::time::Duration;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn app() -> App {
        App::new(EndpointConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gemma3:1b".to_string(),
            timeout: Duration::from_millis(200),
        })
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c), KeyModifiers::NONE)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn shift_enter_inserts_newline() {
        let mut app = app();
        type_text(&mut app, "one").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT)).await.unwrap();
        type_text(&mut app, "two").await;

        assert_eq!(app.session.input, "one\ntwo");
        assert_eq!(app.messages().len(), 1);
    }

    #[tokio::test]
    async fn enter_submits_input() {
        let mut app = app();
        type_text(&mut app, "hello").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE)).await.unwrap();

        assert!(app.session.input.is_empty());
        assert_eq!(app.cursor, 0);
        let messages = app.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hello");
        assert!(app.session.is_pending());
    }

    #[tokio::test]
    async fn enter_on_blank_input_does_nothing() {
        let mut app = app();
        type_text(&mut app, "   ").await;
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE)).await.unwrap();
        assert_eq!(app.session.input, "   ");
        assert_eq!(app.messages().len(), 1);
    }

    #[tokio::test]
    async fn clear_asks_before_wiping() {
        let mut app = app();
        app.session.store().append(ollama_chat_core::Message::user("x"));

        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::CONTROL)).await.unwrap();
        assert!(app.show_clear_confirm);
        // typing is swallowed while the popup is open
        type_text(&mut app, "q").await;
        assert!(app.session.input.is_empty());

        handle_event(&mut app, key(KeyCode::Char('n'), KeyModifiers::NONE)).await.unwrap();
        assert_eq!(app.messages().len(), 2);

        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::CONTROL)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('y'), KeyModifiers::NONE)).await.unwrap();
        assert_eq!(app.messages().len(), 1);
    }

    #[tokio::test]
    async fn model_listing_runs_in_background() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let mut app = App::new(EndpointConfig {
            base_url: format!("http://{addr}"),
            model: "gemma3:1b".to_string(),
            timeout: Duration::from_secs(30),
        });

        tokio::time::timeout(
            Duration::from_millis(500),
            handle_event(&mut app, key(KeyCode::Char('o'), KeyModifiers::CONTROL)),
        )
        .await
        .expect("Ctrl+O waited for the server")
        .unwrap();
        assert!(app.loading_models);

        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn ctrl_c_quits() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL)).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn esc_quits() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert!(app.should_quit);
    }
}

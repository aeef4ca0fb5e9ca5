//! Masked password entry on the controlling terminal.
use std::io::Write;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};

use crate::error::{AppError, Result};

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            tracing::warn!("failed to restore terminal mode: {err}");
        }
    }
}

/// What a key press did to the password being typed.
#[derive(Debug, PartialEq, Eq)]
enum Keystroke {
    Typed,
    Erased,
    Ignored,
    Submit,
    Interrupt,
}

fn apply_key(buf: &mut String, key: KeyEvent) -> Keystroke {
    if key.kind == KeyEventKind::Release {
        return Keystroke::Ignored;
    }
    match key.code {
        KeyCode::Enter => Keystroke::Submit,
        KeyCode::Backspace => {
            if buf.pop().is_some() {
                Keystroke::Erased
            } else {
                Keystroke::Ignored
            }
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Keystroke::Interrupt
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buf.push(ch);
            Keystroke::Typed
        }
        _ => Keystroke::Ignored,
    }
}

/// Reads a password without echoing it; every character shows as `*`.
pub fn password(label: &str) -> Result<String> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(label)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };

        match apply_key(&mut buf, key) {
            Keystroke::Typed => execute!(out, Print("*"))?,
            Keystroke::Erased => {
                execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?
            }
            Keystroke::Ignored => continue,
            Keystroke::Submit => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            Keystroke::Interrupt => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err(AppError::Input("interrupted".to_string()));
            }
        }
        out.flush()?;
    }

    if buf.is_empty() {
        return Err(AppError::Input("empty password".to_string()));
    }
    Ok(buf)
}

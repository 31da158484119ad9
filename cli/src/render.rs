use std::io::{self, Write};

use todo_core::view::summary_line;
use todo_core::{ItemStyle, SyncEngine};

/// Prints the list, the remaining count and the error slot.
pub fn render(engine: &SyncEngine, out: &mut dyn Write) -> io::Result<()> {
    if engine.is_loading() {
        writeln!(out, "Loading...")?;
    }
    for row in engine.rows() {
        let mark = match row.style {
            ItemStyle::Completed => "[x]",
            ItemStyle::Open => "[ ]",
        };
        match row.draft {
            Some(draft) => writeln!(out, "{:>3}. {mark} {draft}_  (editing)", row.position)?,
            None if row.style == ItemStyle::Completed => {
                writeln!(out, "{:>3}. {mark} {}", row.position, strike(row.text))?
            }
            None => writeln!(out, "{:>3}. {mark} {}", row.position, row.text)?,
        }
    }
    writeln!(out, "{}", summary_line(engine.store().items()))?;
    if let Some(err) = engine.error() {
        writeln!(out, "error: {err}")?;
    }
    Ok(())
}

/// Combining long stroke overlay after every char.
fn strike(text: &str) -> String {
    text.chars().flat_map(|c| [c, '\u{0336}']).collect()
}

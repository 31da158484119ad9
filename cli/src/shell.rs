//! Line-oriented front end over a `SyncEngine`.
//!
//! Each line is one user action. Unlike the one-shot commands, the shell
//! exposes the edit buffer step by step (`edit`, `draft`, `save`, `cancel`).

use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use todo_core::{SyncEngine, TodoId, Transport};

use crate::render::render;

pub const HELP: &str = "\
commands:
  add TEXT      create a todo
  toggle N      flip completion of row N
  edit N        start editing row N
  draft TEXT    replace the draft of the row being edited
  save          commit the draft
  cancel        leave edit mode without saving
  delete N      delete row N
  list          show the list
  reload        fetch the list again
  logout        clear the session and quit
  help          show this text
  quit          leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(usize),
    Edit(usize),
    Draft(String),
    Save,
    Cancel,
    Delete(usize),
    List,
    Reload,
    Logout,
    Help,
    Quit,
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Session is gone; hand control back to the login step.
    LoggedOut,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let cmd = match word {
        "add" => ShellCommand::Add(rest.to_string()),
        "toggle" | "t" => ShellCommand::Toggle(position(rest)?),
        "edit" | "e" => ShellCommand::Edit(position(rest)?),
        "draft" => ShellCommand::Draft(rest.to_string()),
        "save" => ShellCommand::Save,
        "cancel" => ShellCommand::Cancel,
        "delete" | "rm" => ShellCommand::Delete(position(rest)?),
        "list" | "ls" => ShellCommand::List,
        "reload" => ShellCommand::Reload,
        "logout" => ShellCommand::Logout,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => bail!("unknown command `{other}` (try `help`)"),
    };
    Ok(Some(cmd))
}

fn position(arg: &str) -> Result<usize> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => bail!("expected a row number, got `{arg}`"),
    }
}

/// The id shown at 1-based row `n`.
pub fn id_at(engine: &SyncEngine, n: usize) -> Result<TodoId> {
    match n.checked_sub(1).and_then(|i| engine.store().items().get(i)) {
        Some(item) => Ok(item.id.clone()),
        None => bail!("no todo at row {n}"),
    }
}

/// Runs one command. Operation failures land in the engine's error slot and
/// are not returned here; `Err` means the command itself was unusable.
pub fn execute(
    engine: &mut SyncEngine,
    net: &dyn Transport,
    cmd: ShellCommand,
    out: &mut dyn Write,
) -> Result<Flow> {
    match cmd {
        ShellCommand::Add(text) => {
            engine.set_input(text);
            let _ = engine.create(net);
        }
        ShellCommand::Toggle(n) => {
            let id = id_at(engine, n)?;
            let _ = engine.toggle(net, &id);
        }
        ShellCommand::Edit(n) => {
            let id = id_at(engine, n)?;
            engine.begin_edit(&id);
        }
        ShellCommand::Draft(text) => {
            if engine.edit_buffer().active_id().is_none() {
                bail!("not editing; use `edit N` first");
            }
            engine.set_draft(text);
        }
        ShellCommand::Save => {
            let _ = engine.commit_edit(net);
        }
        ShellCommand::Cancel => engine.cancel_edit(),
        ShellCommand::Delete(n) => {
            let id = id_at(engine, n)?;
            let _ = engine.delete(net, &id);
        }
        ShellCommand::List => {}
        ShellCommand::Reload => {
            let _ = engine.load(net);
        }
        ShellCommand::Logout => {
            return match engine.logout() {
                Ok(()) => {
                    writeln!(out, "Logged out.")?;
                    Ok(Flow::LoggedOut)
                }
                Err(_) => {
                    render(engine, out)?;
                    Ok(Flow::Continue)
                }
            };
        }
        ShellCommand::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(Flow::Continue);
        }
        ShellCommand::Quit => return Ok(Flow::Quit),
    }
    render(engine, out)?;
    Ok(Flow::Continue)
}

/// Reads commands from `input` until `quit`, logout or end of input.
pub fn run_shell(
    engine: &mut SyncEngine,
    net: &dyn Transport,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<Flow> {
    render(engine, out)?;
    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(Flow::Quit);
        }
        let cmd = match parse_line(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };
        match execute(engine, net, cmd, out) {
            Ok(Flow::Continue) => {}
            Ok(flow) => return Ok(flow),
            Err(err) => writeln!(out, "{err}")?,
        }
    }
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use todo_core::{FileTokenStore, Session, SyncEngine, TodoClient, Transport};

use crate::render::render;
use crate::shell::{self, execute, Flow, ShellCommand};
use crate::transport::UreqTransport;

#[derive(Debug, Parser)]
#[command(name = "todo", about = "Keep a todo list in sync with the todo service", version)]
pub struct Cli {
    /// Base URL of the todo service.
    #[arg(long, env = "TODO_API_BASE", default_value = "http://127.0.0.1:3000")]
    pub api_base: String,

    /// Where the session token is kept between runs.
    #[arg(long, env = "TODO_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store a bearer token issued by the login flow.
    Login {
        #[arg(long)]
        token: String,
    },
    /// Clear the stored token.
    Logout,
    /// Show the list.
    List,
    /// Create a todo.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Flip completion of row N.
    Toggle { row: usize },
    /// Replace the text of row N.
    Edit {
        row: usize,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Delete row N.
    Delete { row: usize },
    /// Interactive session.
    Shell,
}

fn token_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.token_file {
        Some(path) => Ok(path.clone()),
        None => dirs::config_dir()
            .map(|dir| dir.join("todo-sync").join("token"))
            .ok_or_else(|| anyhow!("no config directory; pass --token-file")),
    }
}

fn open_session(cli: &Cli) -> Result<Session> {
    let path = token_path(cli)?;
    Session::open(Arc::new(FileTokenStore::new(&path)))
        .with_context(|| format!("reading token from {}", path.display()))
}

pub fn run_from_env() -> Result<bool> {
    let cli = Cli::parse();
    let net = UreqTransport::new();
    let stdin = io::stdin();
    run(cli, &net, &mut stdin.lock(), &mut io::stdout())
}

/// Runs one invocation. Returns `false` when an operation failed and the
/// error slot was shown to the user.
pub fn run(
    cli: Cli,
    net: &dyn Transport,
    input: &mut dyn io::BufRead,
    out: &mut dyn Write,
) -> Result<bool> {
    let mut session = open_session(&cli)?;

    let steps = match cli.command {
        Commands::Login { token } => {
            session.login(token.trim()).context("saving token")?;
            writeln!(out, "Logged in.")?;
            return Ok(true);
        }
        Commands::Logout => {
            let mut engine = SyncEngine::new(TodoClient::new(&cli.api_base), session);
            if engine.logout().is_err() {
                render(&engine, out)?;
                return Ok(false);
            }
            writeln!(out, "Logged out.")?;
            return Ok(true);
        }
        Commands::Shell => {
            let Some(mut engine) = connect(&cli.api_base, session, net, out)? else {
                return Ok(false);
            };
            let flow = shell::run_shell(&mut engine, net, input, out)?;
            if flow == Flow::LoggedOut {
                writeln!(out, "Run `todo login --token <TOKEN>` to sign in again.")?;
            }
            return Ok(engine.error().is_none());
        }
        Commands::List => vec![ShellCommand::List],
        Commands::Add { text } => vec![ShellCommand::Add(text.join(" "))],
        Commands::Toggle { row } => vec![ShellCommand::Toggle(row)],
        Commands::Edit { row, text } => vec![
            ShellCommand::Edit(row),
            ShellCommand::Draft(text.join(" ")),
            ShellCommand::Save,
        ],
        Commands::Delete { row } => vec![ShellCommand::Delete(row)],
    };

    let Some(mut engine) = connect(&cli.api_base, session, net, out)? else {
        return Ok(false);
    };

    // Only the last step renders, so an edit shows one list, not three.
    let last = steps.len().saturating_sub(1);
    for (i, step) in steps.into_iter().enumerate() {
        let mut sink = io::sink();
        let target: &mut dyn Write = if i == last { &mut *out } else { &mut sink };
        execute(&mut engine, net, step, target)?;
        if engine.error().is_some() && i != last {
            render(&engine, out)?;
            return Ok(false);
        }
    }
    Ok(engine.error().is_none())
}

/// Builds the engine and performs the initial fetch. `None` means the fetch
/// failed and the error slot has already been rendered.
fn connect(
    api_base: &str,
    session: Session,
    net: &dyn Transport,
    out: &mut dyn Write,
) -> Result<Option<SyncEngine>> {
    if !session.is_authenticated() {
        bail!("not logged in; run `todo login --token <TOKEN>`");
    }
    let mut engine = SyncEngine::new(TodoClient::new(api_base), session);
    tracing::debug!(api_base, "initial fetch");
    if engine.load(net).is_err() {
        render(&engine, out)?;
        return Ok(None);
    }
    Ok(Some(engine))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn cli(token_file: PathBuf, api_base: &str, command: Commands) -> Cli {
        Cli {
            api_base: api_base.to_string(),
            token_file: Some(token_file),
            command,
        }
    }

    fn start_server(token: &'static str) -> String {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener, [token]).await
            })
            .unwrap();
        });
        format!("http://{addr}")
    }

    fn invoke(cli: Cli) -> (bool, String) {
        let net = UreqTransport::new();
        let mut out = Vec::new();
        let ok = run(cli, &net, &mut Cursor::new(""), &mut out).unwrap();
        (ok, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["todo", "--token-file", "/tmp/t", "edit", "2", "new", "text"]).unwrap();
        match cli.command {
            Commands::Edit { row, text } => {
                assert_eq!(row, 2);
                assert_eq!(text, ["new", "text"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["todo", "add"]).is_err());
    }

    #[test]
    fn commands_require_login() {
        let dir = tempfile::tempdir().unwrap();
        let net = UreqTransport::new();
        let err = run(
            cli(dir.path().join("token"), "http://127.0.0.1:9", Commands::List),
            &net,
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }

    #[test]
    fn end_to_end_against_mock_server() {
        let base = start_server("cli-token");
        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("token");

        let (ok, text) = invoke(cli(
            token.clone(),
            &base,
            Commands::Login {
                token: "cli-token".into(),
            },
        ));
        assert!(ok);
        assert_eq!(text, "Logged in.\n");

        let (ok, text) = invoke(cli(
            token.clone(),
            &base,
            Commands::Add {
                text: vec!["Buy".into(), "milk".into()],
            },
        ));
        assert!(ok);
        assert!(text.contains("  1. [ ] Buy milk"));
        assert!(text.contains("1 Todos remaining"));

        let (ok, text) = invoke(cli(
            token.clone(),
            &base,
            Commands::Edit {
                row: 1,
                text: vec!["Buy oat milk".into()],
            },
        ));
        assert!(ok);
        assert_eq!(text.matches("Todos remaining").count(), 1);
        assert!(text.contains("Buy oat milk"));

        let (ok, text) = invoke(cli(token.clone(), &base, Commands::Toggle { row: 1 }));
        assert!(ok);
        assert!(text.contains("[x]"));
        assert!(text.contains("0 Todos remaining"));

        let (ok, _) = invoke(cli(token.clone(), &base, Commands::Delete { row: 1 }));
        assert!(ok);

        let (ok, text) = invoke(cli(token.clone(), &base, Commands::Logout));
        assert!(ok);
        assert_eq!(text, "Logged out.\n");
        assert!(!token.exists());
    }

    #[test]
    fn rejected_token_is_shown_in_error_slot() {
        let base = start_server("real-token");
        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("token");
        std::fs::write(&token, "stale-token").unwrap();

        let (ok, text) = invoke(cli(token, &base, Commands::List));
        assert!(!ok);
        assert!(text.ends_with("error: Unauthorized\n"));
    }
}

/*!
`repl.rs` - interactive session loop.

Lifecycle of one run:

  connect -> discover -> banner + help -> prompt/handle (strictly serial)
          -> Closing (exit / quit / q, end of input, Ctrl-C or SIGTERM)
          -> disconnect -> exit 0

Input handling per line (trimmed, blank lines ignored):
  1. control tokens (see `control.rs`)
  2. `<name> -h`           detail help from the registry
  3. `<name> [json-args]`  dispatch; the JSON text is passed whole

Nothing a single line does can end the loop except an exit token. A signal
is honoured even while a call is in flight: the pending call is dropped and
the session is released once.
*/

use std::fmt;
use std::future::Future;
use std::io::{self, Write};

use console::Term;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cmd::control::ControlToken;
use crate::cmd::dispatch::{self, Request, detail_help, render_result};
use crate::cmd::format::{Role, StyleOptions, box_header, color, invocation_failure, prefixed};
use crate::cmd::oneshot::open_session;
use crate::cmd::registry::Registry;
use crate::config::Config;
use crate::mcp::{Provider, Session};

pub const PROMPT: &str = "design-mcp> ";

/* ---- Output surface ---- */

/// Where the loop writes. Clearing is the only thing a plain writer cannot do.
pub trait Surface: Write {
    fn clear(&mut self) -> io::Result<()>;
}

impl Surface for Term {
    fn clear(&mut self) -> io::Result<()> {
        self.clear_screen()
    }
}

/* ---- Loop state ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

/// What ended the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Command,
    EndOfInput,
    Signal,
    OutputClosed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::Command => "exit command",
            ExitReason::EndOfInput => "end of input",
            ExitReason::Signal => "signal",
            ExitReason::OutputClosed => "output closed",
        })
    }
}

pub struct SessionLoop<P: Provider, W: Surface> {
    session: Session<P>,
    registry: Registry,
    out: W,
    style: StyleOptions,
    closed: bool,
}

impl<P: Provider, W: Surface> SessionLoop<P, W> {
    pub fn new(session: Session<P>, out: W, style: StyleOptions) -> Self {
        Self {
            session,
            registry: Registry::new(),
            out,
            style,
            closed: false,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Discovery, banner and the first help screen. A failed discovery is
    /// reported and otherwise ignored.
    pub async fn start(&mut self) -> io::Result<()> {
        if let Err(e) = self.registry.refresh(&self.session).await {
            warn!(error = %e, "discovery failed");
            let msg = prefixed(
                "warn",
                color(Role::Warning, format!("Could not discover commands: {e}"), &self.style),
                &self.style,
            );
            writeln!(self.out, "{msg}")?;
        }
        info!(commands = self.registry.len(), "session ready");

        let banner = box_header(
            prefixed("plug", "Connected to design tool", &self.style),
            Some(format!(
                "{} • {} commands available",
                self.session.endpoint(),
                self.registry.len()
            )),
            &self.style,
        );
        writeln!(self.out, "{banner}")?;
        self.print_help()
    }

    /// Handle one input line.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<LineOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineOutcome::Continue);
        }

        if let Some(token) = ControlToken::parse(line) {
            debug!(?token, "control token");
            match token {
                ControlToken::Exit => return Ok(LineOutcome::Exit),
                ControlToken::Help => self.print_help()?,
                ControlToken::Commands => self.print_commands()?,
                ControlToken::Clear => self.out.clear()?,
            }
            return Ok(LineOutcome::Continue);
        }

        match dispatch::parse_request(line) {
            Some(Request::DetailHelp { name }) => {
                let help = detail_help(&self.registry, name);
                writeln!(self.out, "{}", help.text().trim_end())?;
            }
            Some(Request::Invoke { name, args }) => {
                match dispatch::invoke(&self.session, name, args).await {
                    Ok(result) => writeln!(self.out, "{}", render_result(&result))?,
                    Err(e) => {
                        warn!(tool = name, error = %e, "dispatch failed");
                        let report = invocation_failure(
                            name,
                            &e,
                            self.session.endpoint().as_str(),
                            &self.style,
                        );
                        writeln!(self.out, "{}", report.trim_end())?;
                    }
                }
            }
            None => {}
        }
        Ok(LineOutcome::Continue)
    }

    pub fn print_help(&mut self) -> io::Result<()> {
        let s = &self.style;
        writeln!(
            self.out,
            "\n{} v{}",
            color(Role::Primary, env!("CARGO_PKG_NAME"), s),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.out, "{}", color(Role::Accent, "Usage:", s))?;
        writeln!(self.out, "  {:<22} Invoke a command", "<command> [json-args]")?;
        writeln!(self.out, "  {:<22} Show a command's parameters and an example", "<command> -h")?;
        for token in ControlToken::variants() {
            writeln!(self.out, "  {:<22} {}", token.to_string(), token.usage())?;
        }
        writeln!(
            self.out,
            "{}",
            color(Role::Dim, r#"  e.g. navigate_page {"pageId":"123:456"}"#, s)
        )?;
        writeln!(self.out)?;
        self.print_commands()
    }

    pub fn print_commands(&mut self) -> io::Result<()> {
        let heading = format!("Available commands ({}):", self.registry.len());
        writeln!(self.out, "{}", color(Role::Accent, heading, &self.style))?;
        write!(self.out, "{}", self.registry.render_listing())?;
        Ok(())
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{}", color(Role::Success, PROMPT, &self.style))?;
        self.out.flush()
    }

    /// Close the session. Only the first call does anything.
    pub async fn shutdown(&mut self, reason: ExitReason) -> bool {
        if self.closed {
            debug!(%reason, "shutdown already done");
            return false;
        }
        self.closed = true;
        info!(%reason, "closing session");
        self.session.disconnect().await;
        let _ = writeln!(self.out, "\n{}", prefixed("bye", "Goodbye!", &self.style));
        let _ = self.out.flush();
        true
    }

    /// Drive the loop until exit, end of input or `shutdown` resolves.
    /// Returns the process exit status.
    pub async fn run<R, S>(&mut self, input: R, shutdown: S) -> i32
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut lines = input.lines();

        let started = tokio::select! {
            _ = &mut shutdown => None,
            r = self.start() => Some(r),
        };
        let reason = match started {
            None => Some(ExitReason::Signal),
            Some(Err(e)) => {
                warn!(error = %e, "cannot write to output");
                Some(ExitReason::OutputClosed)
            }
            Some(Ok(())) => None,
        };

        let reason = match reason {
            Some(r) => r,
            None => loop {
                if self.prompt().is_err() {
                    break ExitReason::OutputClosed;
                }
                let next = tokio::select! {
                    _ = &mut shutdown => break ExitReason::Signal,
                    line = lines.next_line() => line,
                };
                let line = match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break ExitReason::EndOfInput,
                    Err(e) => {
                        warn!(error = %e, "failed to read input");
                        break ExitReason::EndOfInput;
                    }
                };
                let outcome = tokio::select! {
                    _ = &mut shutdown => break ExitReason::Signal,
                    outcome = self.handle_line(&line) => outcome,
                };
                match outcome {
                    Ok(LineOutcome::Continue) => {}
                    Ok(LineOutcome::Exit) => break ExitReason::Command,
                    Err(e) => {
                        warn!(error = %e, "cannot write to output");
                        break ExitReason::OutputClosed;
                    }
                }
            },
        };

        self.shutdown(reason).await;
        0
    }
}

/* ---- Entry point ---- */

/// Resolves on Ctrl-C, or SIGTERM on unix. Never resolves if no handler
/// could be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("received shutdown signal");
}

/// Interactive mode. Returns the process exit status.
pub async fn run_interactive(config: &Config) -> i32 {
    run_interactive_reporting(config, &mut io::stderr()).await
}

/// Connection failures are written to `err`.
async fn run_interactive_reporting<E: Write>(config: &Config, err: &mut E) -> i32 {
    let style = StyleOptions::detect();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let connected = tokio::select! {
        _ = &mut shutdown => return 0,
        session = open_session(config, &style, err) => session,
    };
    let Some(session) = connected else {
        return 1;
    };

    let mut repl = SessionLoop::new(session, Term::stdout(), style);
    repl.run(BufReader::new(tokio::io::stdin()), shutdown).await
}

/* ---- Tests ---- */
#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::fake::{CallBehavior, FakeProvider, sample_tools};
    use crate::mcp::{Endpoint, SessionState};
    use std::time::Duration;

    const CLEAR_MARK: &str = "<<clear>>";

    impl Surface for Vec<u8> {
        fn clear(&mut self) -> io::Result<()> {
            self.extend_from_slice(CLEAR_MARK.as_bytes());
            Ok(())
        }
    }

    fn make_loop(fake: FakeProvider) -> SessionLoop<FakeProvider, Vec<u8>> {
        SessionLoop::new(
            Session::ready(Endpoint::default(), fake),
            Vec::new(),
            StyleOptions::plain(),
        )
    }

    fn text(repl: &SessionLoop<FakeProvider, Vec<u8>>) -> String {
        String::from_utf8_lossy(repl.output()).into_owned()
    }

    #[tokio::test]
    async fn unreachable_endpoint_exits_one_with_checklist() {
        let config = Config {
            endpoint: crate::mcp::parse_endpoint("http://127.0.0.1:1/mcp").unwrap(),
            connect_timeout: Duration::from_secs(2),
        };
        let mut err = Vec::new();

        let code = run_interactive_reporting(&config, &mut err).await;

        assert_eq!(code, 1);
        let err = String::from_utf8_lossy(&err);
        assert!(err.contains("Failed to connect"));
        assert!(err.contains("Troubleshooting:"));
        assert!(err.contains("http://127.0.0.1:1/mcp"));
    }

    #[tokio::test]
    async fn start_prints_banner_help_and_commands() {
        let mut repl = make_loop(FakeProvider::new(sample_tools()));
        repl.start().await.unwrap();
        let out = text(&repl);
        assert!(out.contains("Connected to design tool"));
        assert!(out.contains("2 commands available"));
        assert!(out.contains("Usage:"));
        assert!(out.contains(concat!("v", env!("CARGO_PKG_VERSION"))));
        assert!(out.contains("1. get_current_page"));
        assert!(out.contains("2. navigate_page - Navigate to a page"));
    }

    #[tokio::test]
    async fn discovery_failure_is_not_fatal() {
        let fake = FakeProvider::new(sample_tools());
        fake.set_discovery_failure(true);
        let log = fake.call_log();
        let mut repl = make_loop(fake);

        let code = repl
            .run(&b"get_current_page\nexit\n"[..], std::future::pending::<()>())
            .await;

        assert_eq!(code, 0);
        let out = text(&repl);
        assert!(out.contains("Could not discover commands"));
        assert!(out.contains("No commands available (not connected)"));
        assert_eq!(log.borrow().len(), 1, "dispatch still works");
    }

    #[tokio::test]
    async fn control_tokens_and_blank_lines() {
        let mut repl = make_loop(FakeProvider::new(sample_tools()));
        repl.start().await.unwrap();

        assert_eq!(repl.handle_line("   ").await.unwrap(), LineOutcome::Continue);
        assert_eq!(repl.handle_line("commands").await.unwrap(), LineOutcome::Continue);
        assert_eq!(repl.handle_line("clear").await.unwrap(), LineOutcome::Continue);
        assert_eq!(repl.handle_line("?").await.unwrap(), LineOutcome::Continue);
        assert_eq!(repl.handle_line("Q").await.unwrap(), LineOutcome::Exit);
        assert!(text(&repl).contains(CLEAR_MARK));
    }

    #[tokio::test]
    async fn detail_help_known_and_unknown() {
        let fake = FakeProvider::new(sample_tools());
        let log = fake.call_log();
        let mut repl = make_loop(fake);
        repl.start().await.unwrap();

        repl.handle_line("navigate_page -h").await.unwrap();
        repl.handle_line("frobnicate -h").await.unwrap();

        let out = text(&repl);
        assert!(out.contains("- pageId (required): string -"));
        assert!(out.contains(r#"navigate_page {"pageId":"<pageId>"}"#));
        assert!(out.contains("Unknown command: frobnicate"));
        assert!(log.borrow().is_empty(), "help never dispatches");
    }

    #[tokio::test]
    async fn dispatch_prints_pretty_result() {
        let fake = FakeProvider::new(sample_tools());
        let log = fake.call_log();
        let mut repl = make_loop(fake);

        repl.handle_line(r#"navigate_page {"pageId":"123:456"}"#)
            .await
            .unwrap();

        assert_eq!(log.borrow()[0].0, "navigate_page");
        assert!(text(&repl).contains("\"pageId\": \"123:456\""));
    }

    #[tokio::test]
    async fn errors_keep_the_loop_alive() {
        let fake = FakeProvider::new(sample_tools())
            .with_behavior(CallBehavior::Fail("connection refused".into()));
        let log = fake.call_log();
        let mut repl = make_loop(fake);

        let code = repl
            .run(
                &b"navigate_page not json\nnavigate_page {}\ncommands\nquit\n"[..],
                std::future::pending::<()>(),
            )
            .await;

        assert_eq!(code, 0);
        let out = text(&repl);
        assert!(out.contains("Invalid arguments for navigate_page: invalid JSON arguments"));
        assert!(out.contains("Error executing navigate_page: connection refused"));
        assert!(out.contains("Troubleshooting"));
        assert_eq!(log.borrow().len(), 1, "malformed line never reached the provider");
        assert!(out.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn end_of_input_closes_session() {
        let fake = FakeProvider::new(sample_tools());
        let closes = fake.close_counter();
        let mut repl = make_loop(fake);

        let code = repl.run(&b""[..], std::future::pending::<()>()).await;

        assert_eq!(code, 0);
        assert_eq!(closes.get(), 1);
        assert_eq!(repl.session().state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn signal_during_dispatch_releases_once() {
        let fake = FakeProvider::new(sample_tools()).with_behavior(CallBehavior::Hang);
        let closes = fake.close_counter();
        let log = fake.call_log();
        let mut repl = make_loop(fake);

        let code = repl
            .run(
                &b"navigate_page {\"pageId\":\"1:2\"}\n"[..],
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;

        assert_eq!(code, 0);
        assert_eq!(log.borrow().len(), 1, "call was in flight");
        assert_eq!(closes.get(), 1);

        // A manual exit racing the signal is a no-op.
        assert!(!repl.shutdown(ExitReason::Command).await);
        assert_eq!(closes.get(), 1);
        assert_eq!(text(&repl).matches("Goodbye!").count(), 1);
    }

    #[tokio::test]
    async fn exit_stops_reading_further_lines() {
        let fake = FakeProvider::new(sample_tools());
        let log = fake.call_log();
        let mut repl = make_loop(fake);

        repl.run(&b"exit\nget_current_page\n"[..], std::future::pending::<()>())
            .await;

        assert!(log.borrow().is_empty());
    }
}

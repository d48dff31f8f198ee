/*!
`oneshot.rs` - single command from the command line, then exit.

  design-mcp <command> [json-args] [--args-file PATH]   -> invoke once
  design-mcp <command> -h                              -> detail help
  design-mcp --commands                                -> numbered listing

Exit status: 0 on success, 1 on any failure (reported on stderr).
Arguments are parsed before connecting so malformed input fails fast.
*/

use std::future::Future;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cmd::dispatch::{self, detail_help, parse_arguments, render_result};
use crate::cmd::format::{StyleOptions, connection_failure, invocation_failure};
use crate::cmd::registry::Registry;
use crate::cmd::repl::shutdown_signal;
use crate::config::Config;
use crate::mcp::{self, ClientIdentity, InvocationError, JsonObject, McpProvider, Provider, Session};

/* ---- Argument preparation ---- */

/// Read a JSON or YAML (by extension) arguments file whose root is a mapping.
pub fn load_args_file(path: &Path) -> Result<JsonObject> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read args file: {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let value: Value = if is_yaml {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("failed to parse YAML args file")?;
        serde_json::to_value(yaml).context("failed to convert YAML args to JSON")?
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON args file")?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("args file root must be a mapping"),
    }
}

/// Inline arguments first, then any file keys they do not already set.
pub fn prepare_arguments(
    inline: Option<&str>,
    args_file: Option<&Path>,
) -> Result<JsonObject, InvocationError> {
    let mut arguments = parse_arguments(inline)?;
    if let Some(path) = args_file {
        let file = load_args_file(path)
            .map_err(|e| InvocationError::MalformedArguments(format!("{e:#}")))?;
        for (k, v) in file {
            arguments.entry(k).or_insert(v);
        }
    }
    Ok(arguments)
}

/* ---- Runners ---- */

/// Invoke `name` on an open session and release it. Returns the exit status.
pub async fn dispatch_once<P, O, E>(
    session: &mut Session<P>,
    name: &str,
    arguments: JsonObject,
    shutdown: impl Future<Output = ()>,
    out: &mut O,
    err: &mut E,
    style: &StyleOptions,
) -> i32
where
    P: Provider,
    O: Write,
    E: Write,
{
    let outcome = tokio::select! {
        _ = shutdown => None,
        r = dispatch::invoke_parsed(session, name, arguments) => Some(r),
    };
    session.disconnect().await;

    match outcome {
        Some(Ok(result)) => match writeln!(out, "{}", render_result(&result)) {
            Ok(()) => 0,
            Err(e) => {
                warn!(error = %e, "cannot write result");
                1
            }
        },
        Some(Err(e)) => {
            report(err, &invocation_failure(name, &e, session.endpoint().as_str(), style));
            1
        }
        None => {
            info!(tool = name, "interrupted");
            1
        }
    }
}

/// Discover and print either the listing or one command's detail help.
pub async fn describe<P: Provider, O: Write>(
    session: &mut Session<P>,
    command: Option<&str>,
    out: &mut O,
) -> io::Result<()> {
    let mut registry = Registry::new();
    if let Err(e) = registry.refresh(session).await {
        warn!(error = %e, "discovery failed");
    }
    session.disconnect().await;

    match command {
        Some(name) => writeln!(out, "{}", detail_help(&registry, name).text().trim_end()),
        None => {
            writeln!(out, "Available commands ({}):", registry.len())?;
            write!(out, "{}", registry.render_listing())
        }
    }
}

fn report<E: Write>(err: &mut E, text: &str) {
    let _ = writeln!(err, "{}", text.trim_end());
}

/// Connect, or write the connection failure report to `err`.
pub async fn open_session<E: Write>(
    config: &Config,
    style: &StyleOptions,
    err: &mut E,
) -> Option<Session<McpProvider>> {
    let identity = ClientIdentity::from_package();
    match mcp::connect(&config.endpoint, &identity, config.connect_timeout).await {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "connection failed");
            report(err, &connection_failure(&e, config.endpoint.as_str(), style));
            None
        }
    }
}

/// `<command> [json-args]`. `flag` is accepted for compatibility and ignored.
pub async fn run(
    config: &Config,
    name: &str,
    raw_args: Option<&str>,
    args_file: Option<&Path>,
    flag: Option<&str>,
) -> i32 {
    let style = StyleOptions::detect();
    if let Some(flag) = flag {
        debug!(flag, "ignoring trailing flag");
    }

    let arguments = match prepare_arguments(raw_args, args_file) {
        Ok(a) => a,
        Err(e) => {
            report(
                &mut io::stderr(),
                &invocation_failure(name, &e, config.endpoint.as_str(), &style),
            );
            return 1;
        }
    };

    let Some(mut session) = open_session(config, &style, &mut io::stderr()).await else {
        return 1;
    };
    dispatch_once(
        &mut session,
        name,
        arguments,
        shutdown_signal(),
        &mut io::stdout(),
        &mut io::stderr(),
        &style,
    )
    .await
}

/// `--commands` (no name) or `<command> -h`.
pub async fn run_describe(config: &Config, command: Option<&str>) -> i32 {
    let style = StyleOptions::detect();
    let Some(mut session) = open_session(config, &style, &mut io::stderr()).await else {
        return 1;
    };
    match describe(&mut session, command, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(e) => {
            warn!(error = %e, "cannot write output");
            1
        }
    }
}

/* ---- Tests ---- */

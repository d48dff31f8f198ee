/*!
format.rs

Human-facing formatting helpers (colour, emoji, boxed headers, remediation).

  - StyleOptions::detect() -> StyleOptions   (NO_COLOR / NO_EMOJI / terminal width)
  - color(role, text, &StyleOptions) -> String
  - emoji(tag, &StyleOptions) -> &'static str
  - prefixed(tag, text, &StyleOptions) -> String
  - box_header(title, subtitle_opt, &StyleOptions) -> String
  - remediation(endpoint) -> String
  - connection_failure / invocation_failure -> String

Helpers return strings and never print. JSON results are rendered elsewhere
and never pass through here.
*/

use console::{Style, Term, measure_text_width};

use crate::mcp::{ConnectionError, InvocationError, InvocationErrorKind};

/* ---- Style Options ---- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let use_color = std::env::var_os("NO_COLOR").is_none() && console::colors_enabled();
        let use_emoji = std::env::var_os("NO_EMOJI").is_none();

        let width = Term::stdout()
            .size_checked()
            .map(|(_, cols)| cols as usize)
            .or_else(|| {
                std::env::var("COLUMNS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
            })
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color,
            use_emoji,
            term_width: width,
        }
    }

    /// No colour, no emoji, fixed width. Output is stable across terminals.
    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

/* ---- Color / Emoji ---- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let s = match role {
        Role::Primary => Style::new().color256(45).bold(),
        Role::Secondary => Style::new().color256(250),
        Role::Accent => Style::new().color256(213),
        Role::Success => Style::new().color256(82),
        Role::Warning => Style::new().color256(214),
        Role::Error => Style::new().color256(196).bold(),
        Role::Dim => Style::new().dim(),
    };
    s.force_styling(true).apply_to(text.as_ref()).to_string()
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "error" => "✖",
        "warn" => "⚠",
        "info" => "ℹ",
        "plug" => "🔌",
        "tool" => "🛠",
        "list" => "📜",
        "bye" => "👋",
        _ => "",
    }
}

/// `text` led by the emoji for `tag`, or just `text` when emoji are off.
pub fn prefixed(tag: &str, text: impl AsRef<str>, style: &StyleOptions) -> String {
    match emoji(tag, style) {
        "" => text.as_ref().to_string(),
        e => format!("{e} {}", text.as_ref()),
    }
}

/* ---- Box Header ---- */

/// Single-line title (plus optional subtitle) in a light box, never wider
/// than the terminal.
pub fn box_header(
    title: impl AsRef<str>,
    subtitle: Option<impl AsRef<str>>,
    style: &StyleOptions,
) -> String {
    let title = color(Role::Primary, title.as_ref(), style);
    let inner = match subtitle {
        Some(sub) => format!("{title}  {}", color(Role::Secondary, sub.as_ref(), style)),
        None => title,
    };

    let max_inner = style.term_width.saturating_sub(4).max(16);
    let inner = if measure_text_width(&inner) > max_inner {
        console::truncate_str(&inner, max_inner, "…").into_owned()
    } else {
        inner
    };
    let width = measure_text_width(&inner);
    let bar = "─".repeat(width + 2);
    format!("┌{bar}┐\n│ {inner} │\n└{bar}┘")
}

/* ---- Remediation ---- */

/// Checklist shown with every connection or execution failure.
pub fn remediation(endpoint: &str) -> String {
    format!(
        "Troubleshooting:\n  \
         1. Make sure the design tool desktop app is running\n  \
         2. Make sure its MCP server feature is enabled and listening at {endpoint}\n  \
         3. If the command works on the current selection, make sure something is selected\n"
    )
}

/// Report for a session that could not be opened.
pub fn connection_failure(err: &ConnectionError, endpoint: &str, style: &StyleOptions) -> String {
    format!(
        "{}\n{err}\n\n{}",
        prefixed(
            "error",
            color(Role::Error, "Failed to connect to the design tool MCP server", style),
            style
        ),
        remediation(endpoint)
    )
}

/// Report for a failed dispatch. Malformed arguments show the parse error
/// and a pointer to the command's help instead of the checklist.
pub fn invocation_failure(
    name: &str,
    err: &InvocationError,
    endpoint: &str,
    style: &StyleOptions,
) -> String {
    match err.kind() {
        InvocationErrorKind::MalformedArguments => format!(
            "{} {err}\n{}",
            prefixed("error", color(Role::Error, format!("Invalid arguments for {name}:"), style), style),
            color(Role::Dim, format!("Run `{name} -h` to see its parameters."), style)
        ),
        InvocationErrorKind::ExecutionFailed => format!(
            "{} {err}\n\n{}",
            prefixed("error", color(Role::Error, format!("Error executing {name}:"), style), style),
            remediation(endpoint)
        ),
    }
}

/* ---- Tests ---- */

/*!
Control tokens understood by the interactive loop.

Variants (checked in this order before anything is dispatched):
  exit / quit / q  -> Exit
  help / ?         -> Help
  commands         -> Commands
  clear            -> Clear

Anything else on the line is a command name.
*/

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlToken {
    Exit,
    Help,
    Commands,
    Clear,
}

impl ControlToken {
    /// All tokens, in the order they are matched.
    pub const fn variants() -> &'static [ControlToken] {
        &[
            ControlToken::Exit,
            ControlToken::Help,
            ControlToken::Commands,
            ControlToken::Clear,
        ]
    }

    /// Words that select this token.
    pub const fn aliases(&self) -> &'static [&'static str] {
        match self {
            ControlToken::Exit => &["exit", "quit", "q"],
            ControlToken::Help => &["help", "?"],
            ControlToken::Commands => &["commands"],
            ControlToken::Clear => &["clear"],
        }
    }

    /// Match a whole trimmed line. Case-insensitive; a control word followed
    /// by more text is not a control token.
    pub fn parse(line: &str) -> Option<Self> {
        let norm = line.trim().to_ascii_lowercase();
        Self::variants()
            .iter()
            .copied()
            .find(|t| t.aliases().contains(&norm.as_str()))
    }

    /// One-line usage text for the help screen.
    pub fn usage(&self) -> &'static str {
        match self {
            ControlToken::Exit => "Leave the session",
            ControlToken::Help => "Show this help",
            ControlToken::Commands => "List every discovered command",
            ControlToken::Clear => "Clear the screen",
        }
    }
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.aliases().join(", "))
    }
}

/*!
Command layer: everything between the CLI and the MCP session.

Layout:
  src/cmd/
    mod.rs       (this file)
    control.rs   (exit / help / commands / clear tokens)
    registry.rs  (discovered commands, parameter specs, rendered help)
    dispatch.rs  (request parsing, argument parsing, invocation, detail help)
    format.rs    (colour, emoji, boxed headers, failure reports)
    repl.rs      (interactive session loop + signal handling)
    oneshot.rs   (single invocation / listing / detail help, then exit)

main.rs only calls `run_interactive`, `run_oneshot` and `run_describe`.
*/

pub mod control;
pub mod dispatch;
pub mod format;
pub mod oneshot;
pub mod registry;
pub mod repl;

pub use oneshot::{run as run_oneshot, run_describe};
pub use repl::run_interactive;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

mod cmd;
mod config;
mod mcp;
mod utils;

use config::Config;

/// Design MCP - drive a locally running design tool through its MCP server.
///
/// Modes:
///   design-mcp                              interactive session
///   design-mcp <command> [json-args]        invoke one command, print the result
///   design-mcp <command> -h                 parameters and example for a command
///   design-mcp --commands                   list every command the tool offers
///
/// Global flags / env:
///   --verbose (repeat)    More diagnostics on stderr (RUST_LOG refines)
///   -q / --quiet          Errors only
///   -e / --endpoint       MCP endpoint (or DESIGN_MCP_ENDPOINT env)
///   NO_COLOR / NO_EMOJI   Plain output
///
/// Examples:
///   design-mcp get_current_page
///   design-mcp navigate_page '{"pageId":"123:456"}'
///   design-mcp navigate_page --args-file page.yaml
#[derive(Parser, Debug)]
#[command(
    name = "design-mcp",
    version,
    author,
    about = "Design MCP - interactive and one-shot CLI for a local design-tool MCP server",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Command to invoke once (omit for the interactive session)
    #[arg(value_name = "COMMAND")]
    command: Option<String>,

    /// JSON object with the command's arguments
    #[arg(value_name = "JSON_ARGS", allow_hyphen_values = true)]
    args: Option<String>,

    /// Extra trailing token, accepted and ignored
    #[arg(value_name = "FLAG", hide = true)]
    flag: Option<String>,

    /// Print help (with COMMAND: that command's parameters)
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// Print version
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// List available commands and exit
    #[arg(long)]
    commands: bool,

    /// Read arguments from a JSON or YAML file (inline JSON keys win)
    #[arg(long, value_name = "PATH")]
    args_file: Option<PathBuf>,

    /// MCP endpoint URL
    #[arg(short = 'e', long, value_name = "URL")]
    endpoint: Option<String>,

    /// Connection timeout in seconds
    #[arg(long = "timeout", value_name = "SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Increase verbosity (--verbose, --verbose --verbose)
    #[arg(long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let code = run(Cli::parse()).await;
    // Stdin reader threads must not hold the process open.
    std::process::exit(code);
}

/// Mode dispatch. Returns the process exit status.
async fn run(cli: Cli) -> i32 {
    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return 0;
    }
    if cli.help && cli.command.is_none() {
        let _ = Cli::command().print_help();
        println!();
        return 0;
    }

    utils::init_logging(utils::derive_level(cli.verbose, cli.quiet));

    let config = match Config::resolve(cli.endpoint.as_deref(), cli.timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e:#}");
            return 1;
        }
    };

    // `<command> -h` may also arrive as the argument position.
    let detail_help = cli.help || cli.args.as_deref() == Some(cmd::dispatch::HELP_FLAG);

    match cli.command.as_deref() {
        _ if cli.commands => cmd::run_describe(&config, None).await,
        Some(name) if detail_help => cmd::run_describe(&config, Some(name)).await,
        Some(name) => {
            cmd::run_oneshot(
                &config,
                name,
                cli.args.as_deref(),
                cli.args_file.as_deref(),
                cli.flag.as_deref(),
            )
            .await
        }
        None => cmd::run_interactive(&config).await,
    }
}

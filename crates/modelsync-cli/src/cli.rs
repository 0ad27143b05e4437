//! Argument parsing, bootstrap, and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use modelsync_config::ClientConfig;
use modelsync_telemetry::{LogFormat, LoggingConfig, build_sha, init_logging};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult};
use crate::commands::cancel::handle_cancel;
use crate::commands::download::{handle_download, handle_fetch};
use crate::commands::scan::handle_scan;
use crate::commands::status::handle_status;

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let ctx = match bootstrap(&cli, &trace_id) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    info!(command = command_name, trace_id = %trace_id, "dispatching command");

    match dispatch(cli, &ctx).await {
        Ok(()) => 0,
        Err(err) => {
            let message = err.display_message();
            eprintln!("error: {message}");
            err.exit_code()
        }
    }
}

fn bootstrap(cli: &Cli, trace_id: &str) -> CliResult<AppContext> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let logging = LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_name(config.logging.format.as_deref()),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    AppContext::from_config(&config, cli.server_url.clone(), trace_id)
}

async fn dispatch(cli: Cli, ctx: &AppContext) -> CliResult<()> {
    match cli.command {
        Command::Scan(args) => handle_scan(ctx, args, cli.output).await,
        Command::Download(args) => handle_download(ctx, args, cli.output).await,
        Command::Fetch(args) => handle_fetch(ctx, args, cli.output).await,
        Command::Cancel(args) => handle_cancel(ctx, args).await,
        Command::Status(args) => handle_status(ctx, args, cli.output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "modelsync",
    about = "Find the models a workflow needs and download them through the server"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "MODELSYNC_SERVER_URL",
        value_parser = parse_url,
        help = "Server base URL (overrides the configuration file)"
    )]
    server_url: Option<Url>,
    #[arg(long, global = true, env = "MODELSYNC_CONFIG")]
    config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the models referenced by a workflow and whether they are present.
    Scan(ScanArgs),
    /// Start a single server-side download.
    Download(DownloadArgs),
    /// Scan a workflow and download every missing model it references.
    Fetch(FetchArgs),
    /// Cancel an active download.
    Cancel(CancelArgs),
    /// Show server-side transfer status.
    Status(StatusArgs),
}

#[derive(Args)]
pub(crate) struct ScanArgs {
    #[arg(help = "Path to a workflow JSON document")]
    pub(crate) workflow: PathBuf,
}

#[derive(Args)]
pub(crate) struct DownloadArgs {
    #[arg(long, help = "Source URL")]
    pub(crate) url: String,
    #[arg(long, help = "Destination folder, e.g. checkpoints")]
    pub(crate) folder: String,
    #[arg(long, help = "File path relative to the folder")]
    pub(crate) path: String,
    #[arg(short = 'y', long, help = "Overwrite existing files without asking")]
    pub(crate) yes: bool,
    #[arg(long, help = "Return once the server accepts the request")]
    pub(crate) no_follow: bool,
}

#[derive(Args)]
pub(crate) struct FetchArgs {
    #[arg(help = "Path to a workflow JSON document")]
    pub(crate) workflow: PathBuf,
    #[arg(short = 'y', long, help = "Overwrite existing files without asking")]
    pub(crate) yes: bool,
    #[arg(long, help = "Return once the server accepts the requests")]
    pub(crate) no_follow: bool,
}

#[derive(Args)]
pub(crate) struct CancelArgs {
    #[arg(help = "Download identifier")]
    pub(crate) download_id: String,
}

#[derive(Args)]
pub(crate) struct StatusArgs {
    #[arg(help = "Download identifier; omit to list every transfer")]
    pub(crate) download_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Scan(_) => "scan",
        Command::Download(_) => "download",
        Command::Fetch(_) => "fetch",
        Command::Cancel(_) => "cancel",
        Command::Status(_) => "status",
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

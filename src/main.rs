use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, error, info};

use tftpc::tftp::client::{Client, ClientConfig};
use tftpc::tftp::core::{Mode, TransferError};

/// Exit status for failures outside the transfer itself (config, resolution, local files)
const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Download a file from the server
    Get,
    /// Upload a file to the server
    Put,
}

/// A simple TFTP client (RFC 1350)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name or IP address
    host: String,

    /// Transfer direction
    #[arg(value_enum)]
    action: Action,

    /// Name of the file to transfer
    filename: String,

    /// Server port [default: 69]
    #[arg(short, long)]
    port: Option<u16>,

    /// Transfer mode sent in the request: netascii, octet or mail [default: netascii]
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Local path to read from or write to [default: FILENAME]
    #[arg(short, long)]
    local: Option<PathBuf>,

    /// Seconds to wait for each reply [default: 5]
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Retransmissions before giving up [default: 5]
    #[arg(short, long)]
    retries: Option<u32>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode. Specify multiple times to increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logger(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    }
    .merge_cli(
        args.host,
        args.port,
        args.mode,
        args.timeout.map(Duration::from_secs),
        args.retries,
    );
    debug!("Client configuration: {:?}", config);

    let client = Client::new(config)?;
    let local = args
        .local
        .unwrap_or_else(|| PathBuf::from(&args.filename));

    match args.action {
        Action::Get => {
            client.get(&args.filename, &local)?;
            info!("File '{}' downloaded successfully.", args.filename);
        }
        Action::Put => {
            client.put(&local, &args.filename)?;
            info!("File '{}' uploaded successfully.", args.filename);
        }
    }

    Ok(())
}

/// Map a failure to the exit status of its class
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<TransferError>())
        .map(TransferError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);
    debug!("Command line parameters: {:?}", args);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

use std::{process::ExitCode, time::Duration};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ferry_transfer::Settings;
use ferry_vfs::{Credentials, VfsError};
use thiserror::Error;
use tracing::{debug, error};

mod command;
mod format;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transfer finished with {0} failed elements")]
    Incomplete(usize),
    #[error("Initialization error")]
    Initialization,
    #[error("Login required, pass --user and --password")]
    LoginRequired,
    #[error("Tracing error")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("{0}")]
    Vfs(#[from] VfsError),
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = init_logging() {
        eprintln!("ferry: {}", err);
        return ExitCode::FAILURE;
    }

    debug!("starting application");

    let args = cli().get_matches();
    let mut settings = Settings::default();
    map_args_to_settings(&args, &mut settings);
    let credentials = map_args_to_credentials(&args);

    match command::execute(&args, settings, credentials).await {
        Ok(()) => {
            debug!("closing application");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("closing application with error: {:?}", err);
            eprintln!("ferry: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() -> Result<(), Error> {
    let logpath = get_logging_path()?;
    let logfile = tracing_appender::rolling::daily(logpath, "log");
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_writer(logfile)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn cli() -> Command {
    Command::new("ferry")
        .about("ferry - copy files between local disks, ftp servers and memory volumes")
        .subcommand_required(true)
        .args([
            Arg::new("user")
                .long("user")
                .global(true)
                .action(ArgAction::Set)
                .help("user for backends that require a login"),
            Arg::new("password")
                .long("password")
                .global(true)
                .action(ArgAction::Set)
                .help("password for backends that require a login"),
            Arg::new("chunk-size")
                .long("chunk-size")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("bytes copied per chunk"),
            Arg::new("max-concurrent")
                .long("max-concurrent")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("batches transferring at the same time"),
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(value_parser!(u64))
                .help("seconds a single backend operation may take"),
        ])
        .subcommands([
            Command::new("ls").about("list a directory").arg(
                Arg::new("path")
                    .required(true)
                    .action(ArgAction::Set)
                    .help("directory to list"),
            ),
            Command::new("cp")
                .about("copy files and directories into a destination directory")
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .num_args(2..)
                        .action(ArgAction::Append)
                        .help("sources followed by the destination directory"),
                ),
            Command::new("mkdir")
                .about("create a directory")
                .args([
                    Arg::new("parent")
                        .required(true)
                        .action(ArgAction::Set)
                        .help("directory to create in"),
                    Arg::new("name")
                        .required(true)
                        .action(ArgAction::Set)
                        .help("name of the new directory"),
                ]),
            Command::new("rm").about("delete files and directories").arg(
                Arg::new("paths")
                    .required(true)
                    .num_args(1..)
                    .action(ArgAction::Append)
                    .help("paths to delete"),
            ),
        ])
}

fn map_args_to_settings(args: &ArgMatches, settings: &mut Settings) {
    if let Some(chunk_size) = args.get_one::<usize>("chunk-size") {
        settings.chunk_size = (*chunk_size).max(1);
    }
    if let Some(max_concurrent) = args.get_one::<usize>("max-concurrent") {
        settings.max_concurrent_batches = (*max_concurrent).max(1);
    }
    if let Some(seconds) = args.get_one::<u64>("timeout") {
        settings.timeouts.operation = Duration::from_secs(*seconds);
    }
}

fn map_args_to_credentials(args: &ArgMatches) -> Option<Credentials> {
    let user = args.get_one::<String>("user")?;
    let password = args
        .get_one::<String>("password")
        .map(|password| password.as_str())
        .unwrap_or_default();

    Some(Credentials::new(user, password))
}

fn get_logging_path() -> Result<String, Error> {
    let cache_dir = match dirs::cache_dir() {
        Some(cache_dir) => match cache_dir.to_str() {
            Some(cache_dir_string) => cache_dir_string.to_string(),
            None => return Err(Error::Initialization),
        },
        None => return Err(Error::Initialization),
    };

    Ok(format!("{}{}", cache_dir, "/ferry/logs"))
}

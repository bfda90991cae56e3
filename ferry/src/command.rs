use std::io::Write;

use clap::ArgMatches;
use ferry_pane::DirectoryCache;
use ferry_transfer::{BatchStatus, ElementStatus, Settings, TransferCoordinator};
use ferry_vfs::{Connectors, Credentials, VfsError, VfsPath};
use tracing::{info, warn};

use crate::{format, Error};

pub async fn execute(
    args: &ArgMatches,
    settings: Settings,
    credentials: Option<Credentials>,
) -> Result<(), Error> {
    let context = Context {
        connectors: Connectors::new().with_timeouts(settings.timeouts),
        credentials,
        settings,
    };

    match args.subcommand() {
        Some(("ls", args)) => list(&context, single(args, "path")?).await,
        Some(("cp", args)) => copy(&context, &many(args, "paths")).await,
        Some(("mkdir", args)) => {
            make_directory(&context, single(args, "parent")?, single(args, "name")?).await
        }
        Some(("rm", args)) => remove(&context, &many(args, "paths")).await,
        _ => Err(Error::Initialization),
    }
}

struct Context {
    connectors: Connectors,
    credentials: Option<Credentials>,
    settings: Settings,
}

impl Context {
    /// Opens a pane on `input`, logging in when the backend asks for it.
    async fn open_pane(&self, input: &str) -> Result<DirectoryCache, Error> {
        let (filesystem, path) = self.connectors.open(input)?;
        let mut pane = DirectoryCache::new(filesystem, self.settings.timeouts);

        match pane.change_directory(&path.to_string()).await {
            Ok(()) => Ok(pane),
            Err(VfsError::NotConnected) => match &self.credentials {
                Some(credentials) => {
                    pane.login(credentials.clone()).await?;
                    Ok(pane)
                }
                None => Err(Error::LoginRequired),
            },
            Err(err) => Err(err.into()),
        }
    }
}

async fn list(context: &Context, input: &str) -> Result<(), Error> {
    let pane = context.open_pane(input).await?;

    println!("{}", pane.path());
    for entry in pane.entries() {
        println!("{}", format::format_entry(entry));
    }

    Ok(())
}

async fn copy(context: &Context, paths: &[String]) -> Result<(), Error> {
    let (destination_input, source_inputs) = match paths.split_last() {
        Some(split) if !split.1.is_empty() => split,
        _ => return Err(Error::Initialization),
    };

    let sources = source_inputs
        .iter()
        .map(|input| VfsPath::parse(input))
        .collect::<Result<Vec<_>, _>>()?;

    let parent = match sources.first().and_then(|source| source.parent()) {
        Some(parent) => parent,
        None => return Err(VfsError::InvalidPath(source_inputs[0].clone()).into()),
    };

    let mut source_pane = context.open_pane(&parent.to_string()).await?;
    for source in &sources {
        if source.parent().as_ref() != Some(&parent) {
            return Err(VfsError::InvalidPath(format!(
                "{} is not in {}",
                source, parent
            ))
            .into());
        }

        let name = source.name().unwrap_or_default();
        if !source_pane.select(name) {
            return Err(VfsError::NotFound(source.to_string()).into());
        }
    }

    let destination_pane = context.open_pane(destination_input).await?;

    let coordinator = TransferCoordinator::new(context.settings);
    let handle = coordinator.begin_transfer(
        source_pane.selected_entries(),
        &source_pane,
        destination_pane.filesystem(),
        destination_pane.path(),
    )?;

    info!("copying {} entries into {}", sources.len(), destination_pane.path());

    let mut state = handle.subscribe();
    let batch = loop {
        let snapshot = state.borrow_and_update().clone();
        if snapshot.is_terminal() {
            break snapshot;
        }

        eprint!(
            "\r{}",
            format::format_progress(snapshot.transferred, snapshot.total_size)
        );
        let _ = std::io::stderr().flush();

        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break handle.finished().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, cancelling transfers");
                coordinator.cancel_all().await;
                break handle.snapshot();
            }
        }
    };

    eprintln!(
        "\r{}",
        format::format_progress(batch.transferred, batch.total_size)
    );

    for element in batch.visible_elements() {
        if element.status == ElementStatus::Error {
            let reason = element
                .error
                .as_ref()
                .map(|err| err.to_string())
                .unwrap_or_default();
            eprintln!("failed: {} ({})", element.source, reason);
        }
    }

    match batch.status {
        BatchStatus::Error => match batch.error {
            Some(err) => Err(err.into()),
            None => Err(Error::Incomplete(batch.error_count())),
        },
        BatchStatus::Cancelled => Err(VfsError::Cancelled.into()),
        _ if batch.error_count() > 0 => Err(Error::Incomplete(batch.error_count())),
        _ => Ok(()),
    }
}

async fn make_directory(context: &Context, parent: &str, name: &str) -> Result<(), Error> {
    let pane = context.open_pane(parent).await?;
    let created = pane.make_directory(pane.path(), name).await?;

    println!("{}", created);
    Ok(())
}

async fn remove(context: &Context, paths: &[String]) -> Result<(), Error> {
    let mut failed = 0;
    for input in paths {
        let path = VfsPath::parse(input)?;
        let parent = path.parent().unwrap_or_else(|| path.clone());
        let pane = context.open_pane(&parent.to_string()).await?;

        let report = pane.delete_paths(std::slice::from_ref(&path)).await;
        for (path, err) in &report.failures {
            eprintln!("failed: {} ({})", path, err);
        }
        failed += report.failures.len();
    }

    if failed > 0 {
        Err(Error::Incomplete(failed))
    } else {
        Ok(())
    }
}

fn single<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a str, Error> {
    match args.get_one::<String>(id) {
        Some(value) => Ok(value.as_str()),
        None => Err(Error::Initialization),
    }
}

fn many(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

use std::sync::Arc;

use chrono::Utc;
use log::warn;
use vulhub_api::{EnvironmentFilter, EnvironmentStatus, StatusList};
use vulhub_sync::{Mutation, QueryState, Session, Subscription};

use crate::cli::{CleanArgs, Command, StartArgs};
use crate::error::AppError;
use crate::render;
use crate::toast::ToastSink;

/// Wait for the first settled state and hand back its value.
async fn fetched<T>(subscription: &mut Subscription<T>) -> Result<Arc<T>, AppError>
where
    T: Send + Sync + 'static,
{
    let state = subscription.settled().await;
    match (state.data, state.error) {
        (Some(data), None) => Ok(data),
        (Some(data), Some(error)) => {
            warn!("Showing cached {} after failed refresh: {error}", subscription.key());
            Ok(data)
        }
        (None, Some(error)) => Err(error.into()),
        (None, None) => Err(AppError::InvalidArgument(format!(
            "No data for {}",
            subscription.key()
        ))),
    }
}

fn require_path(path: &str) -> Result<&str, AppError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(AppError::InvalidArgument(
            "An environment path is required".to_string(),
        ));
    }
    Ok(path)
}

fn print_toasts(toasts: &ToastSink) {
    for toast in toasts.take_visible() {
        if toast.notification.is_failure() {
            eprintln!("{}", render::toast(&toast));
        } else {
            println!("{}", render::toast(&toast));
        }
    }
}

pub async fn run(command: Command, session: &Session, toasts: &ToastSink) -> Result<(), AppError> {
    match command {
        Command::Dashboard => dashboard(session).await,
        Command::List(args) => list(session, args.filter.into(), &args.search).await,
        Command::Info(args) => info(session, &args.path).await,
        Command::Status(args) => status(session, &args.path).await,
        Command::Watch(args) => watch(session, args.path.as_deref()).await,
        Command::Sync => perform(session, toasts, Mutation::Sync).await,
        Command::Start(args) => start(session, toasts, &args).await,
        Command::Stop(args) => {
            let path = require_path(&args.path)?;
            perform(session, toasts, Mutation::stop(path)).await
        }
        Command::Restart(args) => {
            let path = require_path(&args.path)?;
            perform(session, toasts, Mutation::restart(path)).await
        }
        Command::Clean(args) => clean(session, toasts, &args).await,
    }
}

async fn dashboard(session: &Session) -> Result<(), AppError> {
    let queries = session.queries();
    let mut system = queries.system_status();
    let mut catalog = queries.catalog();
    let mut downloaded = queries.downloaded();
    let mut running = queries.running();

    fetched(&mut system).await?;
    fetched(&mut catalog).await?;
    fetched(&mut downloaded).await?;
    fetched(&mut running).await?;

    print!("{}", render::dashboard(&session.overview(EnvironmentFilter::All, "")));
    Ok(())
}

async fn list(session: &Session, filter: EnvironmentFilter, search: &str) -> Result<(), AppError> {
    let queries = session.queries();
    let mut catalog = queries.catalog();
    let mut downloaded = queries.downloaded();
    let mut running = queries.running();

    fetched(&mut catalog).await?;
    // Membership lists only refine the catalog flags.
    for membership in [&mut downloaded, &mut running] {
        if let Err(error) = fetched(membership).await {
            warn!("Grouping from catalog flags only: {error}");
        }
    }

    let overview = session.overview(filter, search);
    print!("{}", render::groups(&overview.groups));
    Ok(())
}

async fn info(session: &Session, path: &str) -> Result<(), AppError> {
    let path = require_path(path)?;
    let mut subscription = session.queries().info(path);
    match fetched(&mut subscription).await?.as_ref() {
        Some(info) => {
            print!("{}", render::environment_info(info));
            Ok(())
        }
        None => Err(AppError::not_found(path)),
    }
}

async fn status(session: &Session, path: &str) -> Result<(), AppError> {
    let path = require_path(path)?;
    let mut subscription = session.queries().status(path);
    match fetched(&mut subscription).await?.as_ref() {
        Some(status) => {
            print!("{}", render::environment_status(status, Utc::now()));
            Ok(())
        }
        None => Err(AppError::not_found(path)),
    }
}

fn print_running(state: &QueryState<StatusList>) {
    if let Some(list) = &state.data {
        print!("{}", render::running_list(list, Utc::now()));
    }
    if let Some(error) = &state.error {
        eprintln!("[error] {error}");
    }
}

fn print_status(path: &str, state: &QueryState<Option<EnvironmentStatus>>) {
    match state.data.as_deref() {
        Some(Some(status)) => print!("{}", render::environment_status(status, Utc::now())),
        Some(None) => eprintln!("[error] Environment not found: {path}"),
        None => {}
    }
    if let Some(error) = &state.error {
        eprintln!("[error] {error}");
    }
}

/// Print every settled state until Ctrl-C.
async fn watch(session: &Session, path: Option<&str>) -> Result<(), AppError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    match path {
        None => {
            let mut running = session.queries().running();
            print_running(&running.settled().await);
            loop {
                tokio::select! {
                    result = &mut ctrl_c => return result.map_err(|error| AppError::Signal(error.to_string())),
                    state = running.changed() => {
                        if state.is_settled() {
                            print_running(&state);
                        }
                    }
                }
            }
        }
        Some(path) => {
            let path = require_path(path)?;
            let mut status = session.queries().status(path);
            print_status(path, &status.settled().await);
            loop {
                tokio::select! {
                    result = &mut ctrl_c => return result.map_err(|error| AppError::Signal(error.to_string())),
                    state = status.changed() => {
                        if state.is_settled() {
                            print_status(path, &state);
                        }
                    }
                }
            }
        }
    }
}

async fn start(session: &Session, toasts: &ToastSink, args: &StartArgs) -> Result<(), AppError> {
    let path = require_path(&args.path)?;
    let mutation = Mutation::Start {
        path: path.to_string(),
        options: args.options(),
    };
    perform(session, toasts, mutation).await
}

async fn clean(session: &Session, toasts: &ToastSink, args: &CleanArgs) -> Result<(), AppError> {
    let path = require_path(&args.path)?;
    let mutation = Mutation::Clean {
        path: path.to_string(),
        options: args.options(),
    };
    perform(session, toasts, mutation).await
}

async fn perform(session: &Session, toasts: &ToastSink, mutation: Mutation) -> Result<(), AppError> {
    let result = session.perform(mutation).await;
    print_toasts(toasts);

    let outcome = result?;
    if let Some(details) = render::outcome(&outcome, Utc::now()) {
        print!("{details}");
    }
    Ok(())
}

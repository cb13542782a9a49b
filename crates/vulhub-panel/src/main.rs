mod cli;
mod commands;
mod error;
mod logging;
mod render;
mod settings;
mod toast;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use vulhub_api::VulhubClient;
use vulhub_platform::AppPaths;
use vulhub_sync::Session;

use crate::cli::Cli;
use crate::error::AppError;
use crate::settings::AppSettings;
use crate::toast::ToastSink;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let paths = AppPaths::new()?;
    let settings_path = paths.settings_file();
    let (mut settings, load_error) = match AppSettings::load(&settings_path) {
        Ok(settings) => (settings, None),
        Err(error) => {
            eprintln!(
                "warning: ignoring unreadable settings at {}: {error}",
                settings_path.display()
            );
            (AppSettings::default(), Some(error))
        }
    };
    if !settings_path.exists()
        && let Err(error) = settings.save(&settings_path)
    {
        eprintln!("warning: could not write {}: {error}", settings_path.display());
    }
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(timeout) = cli.timeout {
        settings.http_timeout_secs = timeout;
    }

    logging::init_logging(
        &paths,
        settings.debug_logging || cli.debug,
        settings.max_log_size_bytes,
    );
    if let Some(error) = load_error {
        log::warn!(
            "Ignoring unreadable settings at {}: {error}",
            settings_path.display()
        );
    }
    log::debug!("Using panel API at {}", settings.base_url);

    let client = VulhubClient::new(&settings.base_url, settings.http_timeout())?;
    let toasts = Arc::new(ToastSink::new(settings.toast_timeout_secs));
    let session = Session::new(
        Arc::new(client),
        Arc::clone(&toasts) as _,
        settings.sync_config(),
    );

    let result = commands::run(cli.command, &session, &toasts).await;
    session.shutdown();
    result
}

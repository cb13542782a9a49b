use clap::{Args, Parser, Subcommand, ValueEnum};
use vulhub_api::{CleanOptions, EnvironmentFilter, StartOptions};

#[derive(Debug, Parser)]
#[command(name = "vulhub-panel", version, about = "Control panel client for vulhub lab environments")]
pub struct Cli {
    /// Panel API base URL, overriding the settings file.
    #[arg(long, env = "VULHUB_PANEL_URL", global = true)]
    pub base_url: Option<String>,

    /// HTTP timeout in seconds, overriding the settings file.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log at debug level for this run.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show counters, sync state and running environments.
    Dashboard,
    /// List environments grouped by state.
    List(ListArgs),
    /// Show catalog details of one environment.
    Info(PathArg),
    /// Show container status of one environment.
    Status(PathArg),
    /// Print the running list, or one environment's status, on every poll.
    Watch(WatchArgs),
    /// Refresh the catalog from upstream.
    Sync,
    Start(StartArgs),
    Stop(PathArg),
    Restart(PathArg),
    /// Stop an environment and remove what it left behind.
    Clean(CleanArgs),
}

#[derive(Debug, Args)]
pub struct PathArg {
    /// Catalog path, e.g. `log4j/CVE-2021-44228`.
    pub path: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    #[default]
    All,
    Downloaded,
    Running,
}

impl From<FilterArg> for EnvironmentFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::All,
            FilterArg::Downloaded => Self::Downloaded,
            FilterArg::Running => Self::Running,
        }
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = FilterArg::All)]
    pub filter: FilterArg,

    /// Case-insensitive match on path, name, app, CVE or tag.
    #[arg(long, default_value = "")]
    pub search: String,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    pub path: String,

    #[arg(long)]
    pub pull: bool,

    #[arg(long)]
    pub build: bool,

    #[arg(long)]
    pub force_recreate: bool,
}

impl StartArgs {
    /// Only flags that were given are sent.
    #[must_use]
    pub fn options(&self) -> StartOptions {
        StartOptions {
            pull: self.pull.then_some(true),
            build: self.build.then_some(true),
            force_recreate: self.force_recreate.then_some(true),
        }
    }
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    pub path: String,

    #[arg(long)]
    pub remove_images: bool,

    #[arg(long)]
    pub keep_volumes: bool,

    #[arg(long)]
    pub keep_files: bool,
}

impl CleanArgs {
    #[must_use]
    pub fn options(&self) -> CleanOptions {
        CleanOptions {
            remove_volumes: Some(!self.keep_volumes),
            remove_images: self.remove_images.then_some(true),
            remove_files: Some(!self.keep_files),
        }
    }
}

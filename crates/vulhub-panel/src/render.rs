use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use vulhub_api::{
    ActionReply, DisplayGroup, Environment, EnvironmentInfo, EnvironmentStatus,
    GroupedEnvironments, StatusList,
};
use vulhub_sync::{MutationOutcome, NotificationKind, Overview};

use crate::toast::Toast;

fn count(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn group_title(group: DisplayGroup) -> &'static str {
    match group {
        DisplayGroup::Running => "Running",
        DisplayGroup::Downloaded => "Downloaded",
        DisplayGroup::Available => "Available",
    }
}

fn environment_line(out: &mut String, environment: &Environment) {
    let _ = write!(out, "  {:<40} {}", environment.path, environment.name);
    if let Some(cve) = environment.primary_cve() {
        let _ = write!(out, "  [{cve}]");
    }
    out.push('\n');
}

pub fn dashboard(overview: &Overview) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Environments: {}    Downloaded: {}    Running: {}",
        count(overview.catalog_total),
        count(overview.downloaded_total),
        count(overview.running_total)
    );

    if let Some(system) = &overview.system {
        let last_sync = overview
            .last_synced_at()
            .map_or_else(|| "never".to_string(), |time| time.to_string());
        let _ = writeln!(out, "Last sync: {last_sync}    Version: {}", system.version);
    }
    if overview.needs_sync() {
        out.push_str("The catalog has not been synced, run `vulhub-panel sync`.\n");
    }

    if !overview.groups.running.is_empty() {
        out.push_str("\nRunning\n");
        for environment in &overview.groups.running {
            environment_line(&mut out, environment);
        }
    }
    out
}

pub fn groups(groups: &GroupedEnvironments) -> String {
    if groups.total() == 0 {
        return "No environments match.\n".to_string();
    }

    let mut out = String::new();
    for group in [
        DisplayGroup::Running,
        DisplayGroup::Downloaded,
        DisplayGroup::Available,
    ] {
        let members = groups.group(group);
        if members.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{} ({})", group_title(group), members.len());
        for environment in members {
            environment_line(&mut out, environment);
        }
    }
    out
}

pub fn environment_info(info: &EnvironmentInfo) -> String {
    let environment = &info.environment;
    let mut out = String::new();
    let _ = writeln!(out, "Path:       {}", environment.path);
    let _ = writeln!(out, "Name:       {}", environment.name);
    if let Some(app) = &environment.app {
        let _ = writeln!(out, "App:        {app}");
    }
    if !environment.cve.is_empty() {
        let _ = writeln!(out, "CVE:        {}", environment.cve.join(", "));
    }
    if !environment.tags.is_empty() {
        let _ = writeln!(out, "Tags:       {}", environment.tags.join(", "));
    }
    let _ = writeln!(out, "Downloaded: {}", yes_no(info.downloaded));
    if let Some(local_path) = &info.local_path {
        let _ = writeln!(out, "Local path: {local_path}");
    }
    if let Some(readme) = &info.readme {
        let _ = write!(out, "\n{}\n", readme.trim_end());
    }
    out
}

pub fn environment_status(status: &EnvironmentStatus, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let state = if status.is_running() { "running" } else { "stopped" };
    let _ = writeln!(out, "{}: {state}", status.path());

    for container in &status.containers {
        let _ = write!(out, "  {}  {}  {}", container.name, container.state, container.image);
        if container.is_running()
            && let Some(uptime) = container.uptime(now)
        {
            let _ = write!(out, "  up {uptime}");
        }
        if !container.ports.is_empty() {
            let ports: Vec<String> = container.ports.iter().map(ToString::to_string).collect();
            let _ = write!(out, "  {}", ports.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn running_list(list: &StatusList, now: DateTime<Utc>) -> String {
    if list.environments.is_empty() {
        return "No environments running.\n".to_string();
    }
    list.environments
        .iter()
        .map(|status| environment_status(status, now))
        .collect()
}

pub fn outcome(outcome: &MutationOutcome, now: DateTime<Utc>) -> Option<String> {
    match outcome {
        MutationOutcome::Synced(result) => {
            let at = result
                .last_synced_at()
                .map(|time| format!(" at {time}"))
                .unwrap_or_default();
            Some(format!("Catalog holds {} environments{at}.\n", result.total))
        }
        MutationOutcome::Applied(Some(ActionReply::Status(status))) => {
            Some(environment_status(status, now))
        }
        MutationOutcome::Applied(Some(ActionReply::Ack { message })) => Some(format!("{message}\n")),
        MutationOutcome::Applied(None) => None,
    }
}

pub fn toast(toast: &Toast) -> String {
    let marker = match toast.notification.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Failure => "error",
    };
    format!("[{marker}] {}", toast.notification)
}

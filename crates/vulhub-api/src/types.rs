use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp layout used by the backend for `last_sync_time`.
pub const SYNC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

/// One addressable lab definition from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cve: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub running: bool,
}

/// The three mutually exclusive buckets an environment is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayGroup {
    Running,
    Downloaded,
    Available,
}

impl Environment {
    #[must_use]
    pub fn display_group(&self) -> DisplayGroup {
        if self.running {
            DisplayGroup::Running
        } else if self.downloaded {
            DisplayGroup::Downloaded
        } else {
            DisplayGroup::Available
        }
    }

    /// Case-insensitive match against path, name, app, CVE ids and tags.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let contains = |value: &str| value.to_lowercase().contains(&needle);
        contains(&self.path)
            || contains(&self.name)
            || self.app.as_deref().is_some_and(contains)
            || self.cve.iter().any(|cve| contains(cve.as_str()))
            || self.tags.iter().any(|tag| contains(tag.as_str()))
    }

    #[must_use]
    pub fn primary_cve(&self) -> Option<&str> {
        self.cve.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentList {
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub host_ip: Option<String>,
    pub host_port: String,
    pub container_port: String,
    pub protocol: String,
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.host_ip {
            Some(ip) => write!(
                f,
                "{ip}:{}->{}/{}",
                self.host_port, self.container_port, self.protocol
            ),
            None => write!(
                f,
                "{}->{}/{}",
                self.host_port, self.container_port, self.protocol
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub status: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub started_at: Option<String>,
}

impl ContainerStatus {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    #[must_use]
    pub fn started_at_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.started_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }

    /// Human readable uptime such as `2h 5m` or `12m`.
    #[must_use]
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<String> {
        let started = self.started_at_time()?;
        let elapsed = now.signed_duration_since(started);
        if elapsed.num_seconds() < 0 {
            return None;
        }

        let hours = elapsed.num_hours();
        let minutes = elapsed.num_minutes() % 60;
        if hours > 0 {
            Some(format!("{hours}h {minutes}m"))
        } else {
            Some(format!("{minutes}m"))
        }
    }
}

#[derive(Deserialize)]
struct EnvironmentStatusWire {
    environment: Environment,
    #[serde(default)]
    containers: Option<Vec<ContainerStatus>>,
    #[serde(default, deserialize_with = "empty_as_none")]
    local_path: Option<String>,
}

impl From<EnvironmentStatusWire> for EnvironmentStatus {
    fn from(wire: EnvironmentStatusWire) -> Self {
        Self::new(
            wire.environment,
            wire.containers.unwrap_or_default(),
            wire.local_path,
        )
    }
}

/// Live status of one environment instance.
///
/// `running` is derived from the containers when the value is built and is
/// never patched afterwards; a new status replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EnvironmentStatusWire")]
pub struct EnvironmentStatus {
    pub environment: Environment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerStatus>,
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl EnvironmentStatus {
    #[must_use]
    pub fn new(
        environment: Environment,
        containers: Vec<ContainerStatus>,
        local_path: Option<String>,
    ) -> Self {
        let running = containers.iter().any(ContainerStatus::is_running);
        Self {
            environment,
            containers,
            running,
            local_path,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.environment.path
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusList {
    #[serde(default)]
    pub environments: Vec<EnvironmentStatus>,
    #[serde(default)]
    pub total: usize,
}

impl StatusList {
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&EnvironmentStatus> {
        self.environments.iter().find(|status| status.path() == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub compose_file: Option<String>,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub last_sync_time: Option<String>,
    #[serde(default)]
    pub need_sync: bool,
    #[serde(default)]
    pub version: String,
}

impl SystemStatus {
    #[must_use]
    pub fn last_synced_at(&self) -> Option<NaiveDateTime> {
        parse_sync_time(self.last_sync_time.as_deref()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncupResult {
    pub success: bool,
    #[serde(default)]
    pub last_sync_time: String,
    #[serde(default)]
    pub total: usize,
}

impl SyncupResult {
    #[must_use]
    pub fn last_synced_at(&self) -> Option<NaiveDateTime> {
        parse_sync_time(&self.last_sync_time)
    }
}

fn parse_sync_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), SYNC_TIME_FORMAT).ok()
}

/// Flags for `start`; passed to the backend as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_recreate: Option<bool>,
}

impl StartOptions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pull.is_none() && self.build.is_none() && self.force_recreate.is_none()
    }
}

/// Flags for `clean`; passed to the backend as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_volumes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_files: Option<bool>,
}

impl CleanOptions {
    /// Removes volumes and downloaded files, keeps images.
    #[must_use]
    pub fn keep_images() -> Self {
        Self {
            remove_volumes: Some(true),
            remove_images: None,
            remove_files: Some(true),
        }
    }
}

/// Payload returned by the state-changing endpoints.
///
/// `start` and `restart` answer with a fresh status unless the backend could
/// not query it afterwards, in which case only a message is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionReply {
    Status(Box<EnvironmentStatus>),
    Ack { message: String },
}

impl ActionReply {
    #[must_use]
    pub fn status(&self) -> Option<&EnvironmentStatus> {
        match self {
            Self::Status(status) => Some(status),
            Self::Ack { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvironmentFilter {
    #[default]
    All,
    Downloaded,
    Running,
}

impl EnvironmentFilter {
    #[must_use]
    pub fn accepts(self, environment: &Environment) -> bool {
        match self {
            Self::All => true,
            Self::Downloaded => environment.downloaded,
            Self::Running => environment.running,
        }
    }
}

/// Partition of a catalog snapshot into its display groups, each sorted by
/// path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedEnvironments {
    pub running: Vec<Environment>,
    pub downloaded: Vec<Environment>,
    pub available: Vec<Environment>,
}

impl GroupedEnvironments {
    pub fn from_environments<I>(environments: I) -> Self
    where
        I: IntoIterator<Item = Environment>,
    {
        Self::filtered(environments, EnvironmentFilter::All, "")
    }

    pub fn filtered<I>(environments: I, filter: EnvironmentFilter, query: &str) -> Self
    where
        I: IntoIterator<Item = Environment>,
    {
        let mut grouped = Self::default();
        for environment in environments {
            if !filter.accepts(&environment) || !environment.matches_query(query) {
                continue;
            }
            match environment.display_group() {
                DisplayGroup::Running => grouped.running.push(environment),
                DisplayGroup::Downloaded => grouped.downloaded.push(environment),
                DisplayGroup::Available => grouped.available.push(environment),
            }
        }

        for group in [
            &mut grouped.running,
            &mut grouped.downloaded,
            &mut grouped.available,
        ] {
            group.sort_by(|a, b| a.path.cmp(&b.path));
        }
        grouped
    }

    #[must_use]
    pub fn group(&self, group: DisplayGroup) -> &[Environment] {
        match group {
            DisplayGroup::Running => &self.running,
            DisplayGroup::Downloaded => &self.downloaded,
            DisplayGroup::Available => &self.available,
        }
    }

    #[must_use]
    pub fn group_of(&self, path: &str) -> Option<DisplayGroup> {
        [
            DisplayGroup::Running,
            DisplayGroup::Downloaded,
            DisplayGroup::Available,
        ]
        .into_iter()
        .find(|group| self.group(*group).iter().any(|env| env.path == path))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.running.len() + self.downloaded.len() + self.available.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn env(path: &str, downloaded: bool, running: bool) -> Environment {
        Environment {
            path: path.to_string(),
            name: path.replace('/', " "),
            app: path.split('/').next().map(str::to_string),
            cve: vec![path.rsplit('/').next().unwrap_or_default().to_string()],
            tags: vec!["rce".to_string()],
            downloaded,
            running,
        }
    }

    fn container(state: &str) -> ContainerStatus {
        ContainerStatus {
            id: format!("id-{state}"),
            name: format!("web-{state}"),
            image: "vulhub/redis:5.0.7".to_string(),
            status: String::new(),
            state: state.to_string(),
            ports: Vec::new(),
            created_at: None,
            started_at: None,
        }
    }

    #[test]
    fn grouping_partitions_every_environment_exactly_once() {
        let catalog = vec![
            env("redis/CVE-2022-0543", false, false),
            env("log4j/CVE-2021-44228", true, true),
            env("tomcat/CVE-2017-12615", true, false),
            env("nginx/CVE-2013-4547", false, true),
            env("struts2/s2-045", false, false),
        ];

        let grouped = GroupedEnvironments::from_environments(catalog.clone());

        assert_eq!(grouped.total(), catalog.len());
        for environment in &catalog {
            let hits = [
                grouped.running.contains(environment),
                grouped.downloaded.contains(environment),
                grouped.available.contains(environment),
            ]
            .into_iter()
            .filter(|hit| *hit)
            .count();
            assert_eq!(hits, 1, "{} must land in exactly one group", environment.path);
        }
        assert_eq!(
            grouped.group_of("nginx/CVE-2013-4547"),
            Some(DisplayGroup::Running)
        );
        assert_eq!(
            grouped.group_of("tomcat/CVE-2017-12615"),
            Some(DisplayGroup::Downloaded)
        );
        assert_eq!(
            grouped.available.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
            vec!["redis/CVE-2022-0543", "struts2/s2-045"]
        );
    }

    #[test]
    fn filtered_grouping_applies_filter_and_search() {
        let catalog = vec![
            env("redis/CVE-2022-0543", false, false),
            env("log4j/CVE-2021-44228", true, true),
            env("tomcat/CVE-2017-12615", true, false),
        ];

        let downloaded =
            GroupedEnvironments::filtered(catalog.clone(), EnvironmentFilter::Downloaded, "");
        assert_eq!(downloaded.total(), 2);
        assert!(downloaded.available.is_empty());

        let searched = GroupedEnvironments::filtered(catalog, EnvironmentFilter::All, "cve-2021");
        assert_eq!(searched.total(), 1);
        assert_eq!(searched.running[0].path, "log4j/CVE-2021-44228");
    }

    #[test]
    fn status_running_requires_at_least_one_running_container() {
        let status = EnvironmentStatus::new(
            env("x", true, false),
            vec![container("running"), container("exited")],
            None,
        );
        assert!(status.is_running());

        let stopped = EnvironmentStatus::new(env("x", true, false), vec![container("exited")], None);
        assert!(!stopped.is_running());
    }

    #[test]
    fn status_deserialization_recomputes_running_from_containers() {
        let status: EnvironmentStatus = serde_json::from_value(serde_json::json!({
            "environment": {"path": "x", "name": "x", "app": "", "downloaded": true, "running": false},
            "containers": [
                {"id": "a", "name": "a", "image": "i", "status": "Up", "state": "running"},
                {"id": "b", "name": "b", "image": "i", "status": "Exited", "state": "exited"}
            ],
            "running": false
        }))
        .expect("status should deserialize");

        assert!(status.is_running());
        assert_eq!(status.environment.app, None);
        assert_eq!(status.containers.len(), 2);
    }

    #[test]
    fn action_reply_accepts_status_or_message() {
        let ack: ActionReply =
            serde_json::from_value(serde_json::json!({"message": "Environment stopped successfully"}))
                .expect("ack should deserialize");
        assert!(ack.status().is_none());

        let status: ActionReply = serde_json::from_value(serde_json::json!({
            "environment": {"path": "x", "name": "x", "app": "x"},
            "running": true
        }))
        .expect("status reply should deserialize");
        assert_eq!(status.status().map(EnvironmentStatus::path), Some("x"));
    }

    #[test]
    fn option_structs_omit_unset_flags() {
        let start = StartOptions {
            pull: Some(true),
            ..StartOptions::default()
        };
        assert_eq!(
            serde_json::to_value(start).expect("serialize"),
            serde_json::json!({"pull": true})
        );
        assert_eq!(
            serde_json::to_value(CleanOptions::keep_images()).expect("serialize"),
            serde_json::json!({"remove_volumes": true, "remove_files": true})
        );
    }

    #[test]
    fn sync_time_parses_backend_layout() {
        let status = SystemStatus {
            initialized: true,
            last_sync_time: Some("2026-03-01 12:30:00".to_string()),
            need_sync: false,
            version: "1.0.0".to_string(),
        };
        let parsed = status.last_synced_at().expect("sync time should parse");
        assert_eq!(parsed.to_string(), "2026-03-01 12:30:00");

        let never = SystemStatus::default();
        assert!(never.last_synced_at().is_none());
    }

    #[test]
    fn uptime_formats_hours_and_minutes() {
        let mut running = container("running");
        running.started_at = Some("2026-01-01T10:00:00Z".to_string());
        let now = Utc
            .with_ymd_and_hms(2026, 1, 1, 12, 5, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(running.uptime(now).as_deref(), Some("2h 5m"));

        let soon = Utc
            .with_ymd_and_hms(2026, 1, 1, 10, 12, 30)
            .single()
            .expect("valid timestamp");
        assert_eq!(running.uptime(soon).as_deref(), Some("12m"));
    }

    #[test]
    fn port_mapping_display_includes_host_ip_when_present() {
        let mut port = PortMapping {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: "6379".to_string(),
            container_port: "6379".to_string(),
            protocol: "tcp".to_string(),
        };
        assert_eq!(port.to_string(), "0.0.0.0:6379->6379/tcp");
        port.host_ip = None;
        assert_eq!(port.to_string(), "6379->6379/tcp");
    }
}

use std::fmt;

/// Structured identifier of one cached collection or entity.
///
/// Keys that differ in any component are distinct cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    SystemStatus,
    Environments,
    Downloaded,
    Running,
    Info(String),
    Status(String),
}

impl QueryKey {
    pub fn info(path: impl Into<String>) -> Self {
        Self::Info(path.into())
    }

    pub fn status(path: impl Into<String>) -> Self {
        Self::Status(path.into())
    }

    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::SystemStatus => vec!["system-status"],
            Self::Environments => vec!["environments"],
            Self::Downloaded => vec!["environments", "downloaded"],
            Self::Running => vec!["environments", "running"],
            Self::Info(path) => vec!["environments", "info", path],
            Self::Status(path) => vec!["environments", "status", path],
        }
    }

    /// The environment path a per-entity key refers to.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Info(path) | Self::Status(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.segments().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::QueryKey;

    #[test]
    fn keys_differing_in_any_component_are_distinct() {
        let keys: HashSet<QueryKey> = [
            QueryKey::Environments,
            QueryKey::Downloaded,
            QueryKey::Running,
            QueryKey::info("log4j/CVE-2021-44228"),
            QueryKey::status("log4j/CVE-2021-44228"),
            QueryKey::status("redis/CVE-2022-0543"),
        ]
        .into_iter()
        .collect();

        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn display_renders_tuple_form() {
        assert_eq!(QueryKey::SystemStatus.to_string(), "(system-status)");
        assert_eq!(
            QueryKey::status("log4j/CVE-2021-44228").to_string(),
            "(environments, status, log4j/CVE-2021-44228)"
        );
        assert_eq!(QueryKey::Running.target(), None);
        assert_eq!(QueryKey::info("x").target(), Some("x"));
    }
}

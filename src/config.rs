use std::path::PathBuf;

pub const LOG_ENV: &str = "CLASSROOMD_LOG";
pub const WORKSPACE_ENV: &str = "CLASSROOMD_WORKSPACE";
const DEFAULT_LOG_FILTER: &str = "info";

/// Process-level settings. Per-workspace settings live in the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            log_filter: non_blank(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            workspace: non_blank(WORKSPACE_ENV).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = DaemonConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.workspace, None);
    }

    #[test]
    fn reads_filter_and_workspace() {
        let cfg = DaemonConfig::from_lookup(lookup(&[
            (LOG_ENV, "classroomd=debug"),
            (WORKSPACE_ENV, "/tmp/ws"),
        ]));
        assert_eq!(cfg.log_filter, "classroomd=debug");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
    }

    #[test]
    fn blank_values_fall_back() {
        let cfg = DaemonConfig::from_lookup(lookup(&[(LOG_ENV, "  "), (WORKSPACE_ENV, "")]));
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.workspace, None);
    }
}

//! Runtime limits for graph traversal and hierarchy walks.

/// Bounds applied by traversal algorithms and ancestor walks.
///
/// Parsed from environment variables at construction time with fallback defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Largest `max_depth` accepted by connected-notes traversal (default 20).
    pub max_depth_ceiling: usize,
    /// Hop bound for shortest-path search (default 10).
    pub shortest_path_max_hops: usize,
    /// Parent chains longer than this are treated as corruption (default 1000).
    pub max_parent_chain: usize,
    /// Number of hub notes reported in graph statistics (default 5).
    pub hub_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth_ceiling: 20,
            shortest_path_max_hops: 10,
            max_parent_chain: 1000,
            hub_limit: 5,
        }
    }
}

impl GraphConfig {
    /// Parses configuration from environment variables.
    ///
    /// Falls back to defaults when env vars are not set or invalid.
    ///
    /// # Environment Variables
    ///
    /// - `NOTEGRAPH_MAX_DEPTH` (usize, default 20)
    /// - `NOTEGRAPH_PATH_HOPS` (usize, default 10)
    /// - `NOTEGRAPH_MAX_PARENT_CHAIN` (usize, default 1000)
    /// - `NOTEGRAPH_HUB_LIMIT` (usize, default 5)
    ///
    /// # Examples
    ///
    /// ```
    /// use notegraph::GraphConfig;
    ///
    /// let config = GraphConfig::from_env();
    /// assert!(config.max_depth_ceiling > 0);
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_depth_ceiling: env_or("NOTEGRAPH_MAX_DEPTH", defaults.max_depth_ceiling),
            shortest_path_max_hops: env_or("NOTEGRAPH_PATH_HOPS", defaults.shortest_path_max_hops),
            max_parent_chain: env_or("NOTEGRAPH_MAX_PARENT_CHAIN", defaults.max_parent_chain),
            hub_limit: env_or("NOTEGRAPH_HUB_LIMIT", defaults.hub_limit),
        }
    }
}

fn env_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "NOTEGRAPH_MAX_DEPTH",
            "NOTEGRAPH_PATH_HOPS",
            "NOTEGRAPH_MAX_PARENT_CHAIN",
            "NOTEGRAPH_HUB_LIMIT",
        ] {
            // SAFETY: tests touching the environment run serially.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn from_env_uses_defaults_when_unset() {
        clear_env();
        assert_eq!(GraphConfig::from_env(), GraphConfig::default());
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        clear_env();
        // SAFETY: tests touching the environment run serially.
        unsafe {
            std::env::set_var("NOTEGRAPH_MAX_DEPTH", "5");
            std::env::set_var("NOTEGRAPH_HUB_LIMIT", "3");
        }

        let config = GraphConfig::from_env();
        assert_eq!(config.max_depth_ceiling, 5);
        assert_eq!(config.hub_limit, 3);
        assert_eq!(config.shortest_path_max_hops, 10);
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_ignores_invalid_values() {
        clear_env();
        // SAFETY: tests touching the environment run serially.
        unsafe {
            std::env::set_var("NOTEGRAPH_PATH_HOPS", "many");
            std::env::set_var("NOTEGRAPH_MAX_PARENT_CHAIN", "0");
        }

        let config = GraphConfig::from_env();
        assert_eq!(config.shortest_path_max_hops, 10);
        assert_eq!(config.max_parent_chain, 1000);
        clear_env();
    }
}

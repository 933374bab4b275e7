//! Tunables for the import pipeline.

use std::time::Duration;

/// Default user agent for network sources.
pub const DEFAULT_USER_AGENT: &str = "placemark-import/0.1";

/// Default bound on queued placemarks between parser and writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

const DEFAULT_WORKERS: usize = 2;
const DEFAULT_PROGRESS_INTERVAL: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_LINK_DEPTH: usize = 3;

/// Configuration for [`crate::ImportFacade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Worker threads in the facade's runtime.
    pub workers: usize,
    /// Capacity of the queue between the parser and the store writer.
    pub queue_capacity: usize,
    /// Number of inserted placemarks between progress updates.
    pub progress_interval: usize,
    /// Connect and read timeout for network sources.
    pub http_timeout: Duration,
    /// User agent sent with network requests.
    pub user_agent: String,
    /// How many KML network links deep an import may follow.
    pub max_link_depth: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_link_depth: DEFAULT_MAX_LINK_DEPTH,
        }
    }
}

impl ImportConfig {
    /// Set the worker thread count; zero is raised to one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the queue capacity; zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the progress interval; zero is raised to one.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Set the network timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set how deep nested network links are followed.
    #[must_use]
    pub fn with_max_link_depth(mut self, depth: usize) -> Self {
        self.max_link_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_bound_the_queue() {
        let config = ImportConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[rstest]
    fn zero_sizes_are_clamped() {
        let config = ImportConfig::default()
            .with_workers(0)
            .with_queue_capacity(0)
            .with_progress_interval(0);
        assert_eq!(
            (config.workers, config.queue_capacity, config.progress_interval),
            (1, 1, 1)
        );
    }
}

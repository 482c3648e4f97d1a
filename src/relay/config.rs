//! Relay configuration

/// What to do when a second producer connects for a device that already has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerPolicy {
    /// Refuse the newcomer while the current producer is live
    #[default]
    Reject,
    /// Close the current producer and hand the feed to the newcomer
    Replace,
}

/// Configuration for the stream relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frames a viewer may have pending; further frames are dropped for it
    pub viewer_buffer: usize,

    /// Double-producer handling
    pub producer_policy: ProducerPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            viewer_buffer: 64,
            producer_policy: ProducerPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Set the per-viewer frame buffer (at least 1)
    pub fn viewer_buffer(mut self, capacity: usize) -> Self {
        self.viewer_buffer = capacity.max(1);
        self
    }

    /// Set the double-producer policy
    pub fn producer_policy(mut self, policy: ProducerPolicy) -> Self {
        self.producer_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.viewer_buffer, 64);
        assert_eq!(config.producer_policy, ProducerPolicy::Reject);
    }

    #[test]
    fn test_viewer_buffer_floor() {
        let config = RelayConfig::default().viewer_buffer(0);
        assert_eq!(config.viewer_buffer, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .viewer_buffer(8)
            .producer_policy(ProducerPolicy::Replace);

        assert_eq!(config.viewer_buffer, 8);
        assert_eq!(config.producer_policy, ProducerPolicy::Replace);
    }
}

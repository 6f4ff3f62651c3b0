//! Hub configuration

use std::time::Duration;

/// Dispatch hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each connection's inbound and outbound queue
    pub queue_capacity: usize,

    /// Capacity of the join request channel
    pub control_capacity: usize,

    /// Capacity of the merged event channel the hub loop reads from
    pub event_capacity: usize,

    /// How long a delivery may wait on a full inbound queue before the
    /// receiving connection is dropped (None = wait forever)
    pub delivery_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            control_capacity: 10,
            event_capacity: 256,
            delivery_timeout: None,
        }
    }
}

impl HubConfig {
    /// Set per-connection queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set join channel capacity
    pub fn control_capacity(mut self, capacity: usize) -> Self {
        self.control_capacity = capacity.max(1);
        self
    }

    /// Set merged event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Drop connections whose inbound queue stays full for `timeout`
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = Some(timeout);
        self
    }
}

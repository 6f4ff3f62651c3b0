//! Link configuration

/// Flight controller link options
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Bytes requested per read (one HID report by default)
    pub read_chunk_size: usize,

    /// Upper bound on the frame reassembly buffer
    pub max_buffer_size: usize,

    /// Announce every registry definition to the hub on start, making the
    /// link the owner for requests
    pub announce_definitions: bool,

    /// Subscribe to every registry object on start, so consumer updates are
    /// forwarded to the flight controller
    pub subscribe_all: bool,

    /// Answer `CmdWithAck` frames with an `Ack`
    pub acknowledge: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 64,
            max_buffer_size: 4096,
            announce_definitions: true,
            subscribe_all: true,
            acknowledge: true,
        }
    }
}

impl LinkConfig {
    /// Set the read size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the reassembly buffer limit
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Skip announcing definitions on start
    pub fn disable_announce(mut self) -> Self {
        self.announce_definitions = false;
        self
    }

    /// Skip subscribing to every object on start
    pub fn disable_subscribe_all(mut self) -> Self {
        self.subscribe_all = false;
        self
    }

    /// Never send `Ack` frames
    pub fn disable_acknowledge(mut self) -> Self {
        self.acknowledge = false;
        self
    }
}

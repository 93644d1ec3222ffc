//! Server configuration.

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Capacity of the realtime broadcast channel.
    pub realtime_capacity: usize,
    /// Whether the server starts with an active session.
    pub start_signed_in: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            realtime_capacity: 256,
            start_signed_in: true,
        }
    }

    /// Sets the realtime channel capacity.
    pub fn with_realtime_capacity(mut self, capacity: usize) -> Self {
        self.realtime_capacity = capacity.max(1);
        self
    }

    /// Sets whether a session is active from the start.
    pub fn with_signed_in(mut self, signed_in: bool) -> Self {
        self.start_signed_in = signed_in;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

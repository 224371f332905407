//! Configuration and limits for WebSocket connections.

use std::sync::Arc;

use crate::buffers::DEFAULT_INPUT_BUFFER_SIZE;
use crate::connection::Role;
use crate::logger::{Logger, TracingLogger};
use crate::output::DEFAULT_MAX_GROUPS_PER_WRITE;
use crate::protocol::MAX_HEADER_LEN;

/// Configuration limits for WebSocket connections.
///
/// These limits prevent resource exhaustion attacks and ensure
/// bounded memory usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame payload in bytes.
    ///
    /// The payload storage of an inbound frame is allocated up front from the
    /// length announced in its header, so this bounds per-frame memory.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max frame: 64 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }
}

/// WebSocket connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which side of the connection this endpoint plays.
    ///
    /// Default: `Role::Server`
    pub role: Role,

    /// Resource limits.
    pub limits: Limits,

    /// Accept unmasked frames from clients (server only).
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// violates RFC 6455 but may be useful for testing.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Capacity of the fixed buffer frame headers are read into.
    ///
    /// Never smaller than the largest possible frame header.
    ///
    /// Default: 18
    pub input_buffer_size: usize,

    /// Maximum number of buffer groups handed to a single vectored write.
    ///
    /// Default: 64
    pub max_groups_per_write: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Server,
            limits: Limits::default(),
            accept_unmasked_frames: false,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            max_groups_per_write: DEFAULT_MAX_GROUPS_PER_WRITE,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the header input buffer capacity.
    ///
    /// Values below the largest frame header size are raised to it.
    #[must_use]
    pub const fn with_input_buffer_size(mut self, size: usize) -> Self {
        self.input_buffer_size = if size < MAX_HEADER_LEN {
            MAX_HEADER_LEN
        } else {
            size
        };
        self
    }

    /// Set how many buffer groups one write may carry.
    #[must_use]
    pub const fn with_max_groups_per_write(mut self, count: usize) -> Self {
        self.max_groups_per_write = if count == 0 { 1 } else { count };
        self
    }

    /// Accept unmasked client frames (non-compliant, testing only).
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Configure for server role (no masking, reject unmasked client frames).
    #[must_use]
    pub fn server() -> Self {
        Self {
            role: Role::Server,
            accept_unmasked_frames: false,
            ..Default::default()
        }
    }

    /// Configure for client role (mask all frames).
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            accept_unmasked_frames: false,
            ..Default::default()
        }
    }
}

/// Settings shared by every connection of one server.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Per-connection configuration.
    pub config: Config,
    /// Logger used by all connections; must tolerate concurrent use.
    pub logger: Arc<dyn Logger>,
}

impl ConnectionSettings {
    /// Settings logging through `tracing`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    /// Settings with a custom logger.
    #[must_use]
    pub fn with_logger(config: Config, logger: Arc<dyn Logger>) -> Self {
        Self { config, logger }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

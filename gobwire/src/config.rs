//! Session configuration.
use {crate::registry::Registry, std::sync::Arc};

/// Default upper bound on a single message, 1 GiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1 << 30;

/// Tunables shared by [`Encoder`](crate::Encoder) and [`Decoder`](crate::Decoder).
///
/// ```
/// # use {gobwire::{Config, Registry}, std::sync::Arc};
/// let config = Config::default()
///     .max_message_size(1 << 20)
///     .registry(Arc::new(Registry::new()));
/// assert_eq!(config.max_message_size, 1 << 20);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Messages announcing a larger length are rejected before any allocation.
    pub max_message_size: usize,
    /// Type ids, encode engines and interface names.
    pub registry: Arc<Registry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            registry: Registry::global(),
        }
    }
}

impl Config {
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }
}

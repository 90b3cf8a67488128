use std::num::NonZeroU32;

/// Triple stamped on every loaded module unless overridden.
pub const DEFAULT_TARGET_TRIPLE: &str = "x86_64-pc-linux-gnu";

/// Default size, in bytes, of the symbolic buffer backing a pointer parameter.
pub const DEFAULT_BUFFER_SIZE: NonZeroU32 = match NonZeroU32::new(1024) {
    Some(size) => size,
    None => panic!("buffer size must be non-zero"),
};

/// Settings shared by the loader and the emitter for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Length of the `char` array declared for each pointer parameter.
    pub buffer_size: NonZeroU32,
    /// Target triple applied to every module after loading.
    pub target_triple: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            target_triple: DEFAULT_TARGET_TRIPLE.to_string(),
        }
    }
}

impl Config {
    pub fn with_buffer_size(mut self, buffer_size: NonZeroU32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_target_triple(mut self, target_triple: impl Into<String>) -> Self {
        self.target_triple = target_triple.into();
        self
    }
}

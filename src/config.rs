//! Heap tuning knobs.

use std::env;

use crate::{
  block::{DSIZE, WSIZE},
  error::ConfigError,
};

/// Default growth increment when no free block fits (bytes).
pub const CHUNKSIZE: usize = 1 << 12;
/// Default cap on the memory source (bytes).
pub const MAX_HEAP: usize = 20 * (1 << 20);

/// Bytes taken by the padding word, prologue and epilogue.
pub(crate) const INITIAL_LAYOUT: usize = 4 * WSIZE;

pub const CHUNK_SIZE_VAR: &str = "TAGHEAP_CHUNK_SIZE";
pub const MAX_HEAP_VAR: &str = "TAGHEAP_MAX_HEAP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the source on each extension.
  pub chunk_size: usize,
  /// Upper bound on the total heap size a source built from this config may reach.
  pub max_heap: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: CHUNKSIZE,
      max_heap: MAX_HEAP,
    }
  }
}

impl HeapConfig {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_max_heap(
    mut self,
    max_heap: usize,
  ) -> Self {
    self.max_heap = max_heap;
    self
  }

  /// Defaults overridden by `TAGHEAP_CHUNK_SIZE` and `TAGHEAP_MAX_HEAP`, when set.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(chunk_size) = read_var(CHUNK_SIZE_VAR)? {
      config.chunk_size = chunk_size;
    }
    if let Some(max_heap) = read_var(MAX_HEAP_VAR)? {
      config.max_heap = max_heap;
    }

    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.chunk_size == 0 || self.chunk_size % DSIZE != 0 {
      return Err(ConfigError::ChunkSize(self.chunk_size));
    }

    let required = INITIAL_LAYOUT + self.chunk_size;
    if self.max_heap < required {
      return Err(ConfigError::MaxHeapTooSmall {
        max_heap: self.max_heap,
        required,
      });
    }

    if self.max_heap > u32::MAX as usize {
      return Err(ConfigError::MaxHeapTooLarge(self.max_heap));
    }

    Ok(())
  }
}

fn read_var(var: &'static str) -> Result<Option<usize>, ConfigError> {
  match env::var(var) {
    Ok(value) => value
      .trim()
      .parse()
      .map(Some)
      .map_err(|_| ConfigError::Env { var, value }),
    Err(_) => Ok(None),
  }
}

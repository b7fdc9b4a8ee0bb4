use thiserror::Error;

/// Failures of the raw memory source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
  #[error("heap limit reached (break: {brk} bytes, requested: {incr} bytes, limit: {limit} bytes)")]
  Exhausted { brk: usize, incr: usize, limit: usize },

  #[error("failed to reserve {size} bytes of address space (errno {errno})")]
  Reserve { size: usize, errno: i32 },
}

/// Rejected heap configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("chunk size must be a non-zero multiple of 8 (got {0})")]
  ChunkSize(usize),

  #[error("max heap of {max_heap} bytes cannot hold the initial {required} bytes")]
  MaxHeapTooSmall { max_heap: usize, required: usize },

  #[error("max heap of {0} bytes does not fit a 32-bit boundary tag")]
  MaxHeapTooLarge(usize),

  #[error("invalid value {value:?} for {var}")]
  Env { var: &'static str, value: String },
}

/// Errors surfaced by heap operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
  #[error("invalid size (must be > 0)")]
  InvalidSize,

  #[error("out of memory (requested: {requested} bytes)")]
  OutOfMemory {
    requested: usize,
    #[source]
    source: SourceError,
  },

  #[error("request of {requested} bytes exceeds the largest block a boundary tag can describe")]
  TooLarge { requested: usize },

  /// The replacement block of a resize could not be obtained. The original
  /// block is still allocated and unchanged.
  #[error("resize failed")]
  ResizeFailed(#[source] Box<AllocError>),

  #[error("invalid heap configuration")]
  Config(#[from] ConfigError),
}

pub type Result<T> = core::result::Result<T, AllocError>;

//! Raw memory sources the heap grows into.
//!
//! A source behaves like `sbrk(2)`: it can only append bytes at the current
//! break. It never shrinks and never moves bytes the heap already owns
//! relative to the start of the region, so block offsets stay valid.

use std::{io, ptr, slice};

use log::debug;

use crate::error::SourceError;

pub trait MemorySource {
  /// Extends the region by `incr` bytes and returns the previous break.
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize, SourceError>;

  /// Bytes from the start of the region up to the current break.
  fn heap(&self) -> &[u8];

  fn heap_mut(&mut self) -> &mut [u8];

  fn brk(&self) -> usize {
    self.heap().len()
  }
}

/// Growable byte buffer capped at a fixed limit.
///
/// The buffer itself is only byte aligned. Payload offsets are multiples of
/// 8, but the memory behind a payload slice need not be, so do not cast
/// payload slices to wider types. Use [`MmapSource`] for aligned addresses.
#[derive(Debug, Default)]
pub struct ArenaSource {
  bytes: Vec<u8>,
  limit: usize,
}

impl ArenaSource {
  pub fn new(limit: usize) -> Self {
    Self {
      bytes: Vec::new(),
      limit,
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

impl MemorySource for ArenaSource {
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize, SourceError> {
    let old_brk = self.bytes.len();

    match old_brk.checked_add(incr) {
      Some(new_brk) if new_brk <= self.limit => {
        self.bytes.resize(new_brk, 0);
        Ok(old_brk)
      }
      _ => Err(SourceError::Exhausted {
        brk: old_brk,
        incr,
        limit: self.limit,
      }),
    }
  }

  fn heap(&self) -> &[u8] {
    &self.bytes
  }

  fn heap_mut(&mut self) -> &mut [u8] {
    &mut self.bytes
  }
}

/// Anonymous mapping reserved up front, with a break that moves inside it.
///
/// The base is page aligned, so payload offsets that are multiples of 8 are
/// also 8-aligned machine addresses.
pub struct MmapSource {
  base: *mut u8,
  brk: usize,
  limit: usize,
}

impl MmapSource {
  pub fn reserve(limit: usize) -> Result<Self, SourceError> {
    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        limit,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
      )
    };

    if base == libc::MAP_FAILED {
      return Err(SourceError::Reserve {
        size: limit,
        errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
      });
    }

    debug!("reserved {limit} bytes at {base:?}");

    Ok(Self {
      base: base.cast(),
      brk: 0,
      limit,
    })
  }

  /// Start of the mapping.
  pub fn base(&self) -> *const u8 {
    self.base
  }
}

impl MemorySource for MmapSource {
  fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize, SourceError> {
    let old_brk = self.brk;

    match old_brk.checked_add(incr) {
      Some(new_brk) if new_brk <= self.limit => {
        self.brk = new_brk;
        Ok(old_brk)
      }
      _ => Err(SourceError::Exhausted {
        brk: old_brk,
        incr,
        limit: self.limit,
      }),
    }
  }

  fn heap(&self) -> &[u8] {
    // `base..base + brk` lies inside the live mapping and is only reachable
    // through this source.
    unsafe { slice::from_raw_parts(self.base, self.brk) }
  }

  fn heap_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.base, self.brk) }
  }
}

impl Drop for MmapSource {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.cast(), self.limit);
    }
  }
}

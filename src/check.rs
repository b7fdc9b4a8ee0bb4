//! Heap consistency checker.
//!
//! Walks the implicit list from the prologue to the epilogue and reports
//! every structural problem it finds. It never repairs or aborts; the result
//! is a [`HeapReport`] meant for test harnesses.

use std::fmt;

use log::{error, info};

use crate::{
  block::{BlockPtr, DSIZE, MIN_BLOCK, OVERHEAD, Tag, get, header, header_of},
  heap::Heap,
  source::MemorySource,
};

/// One block as seen by a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub ptr: BlockPtr,
  pub header: Tag,
  pub footer: Tag,
}

impl fmt::Display for BlockInfo {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}: header: {} footer: {}", self.ptr, self.header, self.footer)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapFault {
  #[error("bad prologue header {header}")]
  BadPrologue { header: Tag },

  #[error("bad epilogue header {header} at {at}")]
  BadEpilogue { at: BlockPtr, header: Tag },

  #[error("{at} is not doubleword aligned")]
  Misaligned { at: BlockPtr },

  #[error("header {header} does not match footer {footer} at {at}")]
  TagMismatch { at: BlockPtr, header: Tag, footer: Tag },

  #[error("block at {at} is {size} bytes, below the minimum of {}", MIN_BLOCK)]
  Undersized { at: BlockPtr, size: usize },

  #[error("free blocks at {prev} and {at} were not coalesced")]
  Uncoalesced { prev: BlockPtr, at: BlockPtr },

  #[error("block at {at} of {size} bytes runs past the end of the heap ({heap_size} bytes)")]
  Overrun {
    at: BlockPtr,
    size: usize,
    heap_size: usize,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapReport {
  /// Every block between the sentinels, in address order, up to the first
  /// one the walk could not get past.
  pub blocks: Vec<BlockInfo>,
  pub faults: Vec<HeapFault>,
}

impl HeapReport {
  pub fn is_ok(&self) -> bool {
    self.faults.is_empty()
  }

  pub fn free_blocks(&self) -> impl Iterator<Item = &BlockInfo> {
    self.blocks.iter().filter(|block| !block.header.allocated)
  }

  /// Total payload bytes sitting in free blocks.
  pub fn free_bytes(&self) -> usize {
    self
      .free_blocks()
      .map(|block| block.header.size - OVERHEAD)
      .sum()
  }

  fn fault(
    &mut self,
    fault: HeapFault,
  ) {
    error!("{fault}");
    self.faults.push(fault);
  }
}

impl<S: MemorySource> Heap<S> {
  /// Checks the heap for consistency. With `verbose` set every block is
  /// logged at info level as the walk passes it.
  pub fn check_heap(
    &self,
    verbose: bool,
  ) -> HeapReport {
    let heap = self.source().heap();
    let prologue = self.prologue();
    let mut report = HeapReport::default();

    if verbose {
      info!("Heap ({prologue}):");
    }

    let tag = header(heap, prologue);
    // The prologue footer sits at its payload offset. Coalescing reads it as
    // the first real block's predecessor.
    let footer = Tag::decode(get(heap, prologue.offset()));

    if verbose {
      let block = BlockInfo {
        ptr: prologue,
        header: tag,
        footer,
      };
      info!("{block}");
    }

    if tag.size != DSIZE || !tag.allocated {
      report.fault(HeapFault::BadPrologue { header: tag });
    }
    if tag != footer {
      report.fault(HeapFault::TagMismatch {
        at: prologue,
        header: tag,
        footer,
      });
    }

    let mut bp = BlockPtr::new(prologue.offset() + tag.size.max(DSIZE));
    let mut prev_free: Option<BlockPtr> = None;

    loop {
      if bp.offset() > heap.len() {
        report.fault(HeapFault::Overrun {
          at: bp,
          size: 0,
          heap_size: heap.len(),
        });
        break;
      }

      let tag = Tag::decode(get(heap, header_of(bp)));

      if tag.size == 0 {
        if verbose {
          info!("{bp}: EOL");
        }
        if !tag.allocated || bp.offset() != heap.len() {
          report.fault(HeapFault::BadEpilogue { at: bp, header: tag });
        }
        break;
      }

      if bp.offset() + tag.size > heap.len() {
        report.fault(HeapFault::Overrun {
          at: bp,
          size: tag.size,
          heap_size: heap.len(),
        });
        report.fault(HeapFault::BadEpilogue { at: bp, header: tag });
        break;
      }

      let footer = Tag::decode(get(heap, bp.offset() + tag.size - DSIZE));
      let block = BlockInfo {
        ptr: bp,
        header: tag,
        footer,
      };

      if verbose {
        info!("{block}");
      }

      if bp.offset() % DSIZE != 0 {
        report.fault(HeapFault::Misaligned { at: bp });
      }
      if tag != footer {
        report.fault(HeapFault::TagMismatch {
          at: bp,
          header: tag,
          footer,
        });
      }
      if tag.size < MIN_BLOCK {
        report.fault(HeapFault::Undersized { at: bp, size: tag.size });
      }
      match prev_free {
        Some(prev) if !tag.allocated => report.fault(HeapFault::Uncoalesced { prev, at: bp }),
        _ => {}
      }

      prev_free = (!tag.allocated).then_some(bp);
      report.blocks.push(block);
      bp = BlockPtr::new(bp.offset() + tag.size);
    }

    report
  }
}

//! # tagheap - An Implicit Free List Heap Allocator
//!
//! This crate provides a **boundary-tag heap allocator**: one contiguous,
//! growable region carved into blocks, first-fit placement, and eager
//! coalescing of free neighbours.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              HEAP                                    │
//!   │                                                                      │
//!   │  ┌───┬──────────┬──────┬─────────┬──────┬──────────────────┬─────┐   │
//!   │  │pad│ prologue │  A1  │  free   │  A2  │      free        │ epi │   │
//!   │  └───┴──────────┴──────┴─────────┴──────┴──────────────────┴─────┘   │
//!   │      ▲                                                          ▲    │
//!   │      │                                                          │    │
//!   │   walks start here                                   break (sbrk)    │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   There is no separate free list: blocks are visited in address order,
//!   hopping from one to the next by their sizes.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagheap
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Boundary-tag encoding and neighbour arithmetic
//!   ├── check      - Heap consistency checker
//!   ├── config     - HeapConfig (chunk size, heap limit)
//!   ├── error      - AllocError, SourceError, ConfigError
//!   ├── heap       - Heap: allocate, free, resize, extension, coalescing
//!   └── source     - MemorySource trait, ArenaSource, MmapSource
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagheap::Heap;
//!
//! let mut heap = Heap::new()?;
//!
//! let bp = heap.allocate(100)?;
//! heap.payload_mut(bp)[..5].copy_from_slice(b"hello");
//!
//! let bp = heap.resize(bp, 400)?;
//! assert_eq!(&heap.payload(bp)[..5], b"hello");
//!
//! heap.free(bp);
//! assert!(heap.check_heap(false).is_ok());
//! # Ok::<(), tagheap::AllocError>(())
//! ```
//!
//! ## How It Works
//!
//! Every block carries its size and allocated bit twice, in a header word
//! before the payload and a footer word after it:
//!
//! ```text
//!   Single Block:
//!   ┌────────────┬────────────────────────────────┬────────────┐
//!   │   header   │            payload             │   footer   │
//!   │  size | a  │  (at least 8 bytes, 8-aligned) │  size | a  │
//!   └────────────┴────────────────────────────────┴────────────┘
//!                ▲
//!                └── BlockPtr returned to the caller
//! ```
//!
//! - **allocate** scans for the first free block that fits, splits it when
//!   the leftover can stand as a block, and extends the heap by at least one
//!   chunk when nothing fits.
//! - **free** clears the allocated bit and merges the block with free
//!   neighbours right away, so two free blocks are never adjacent.
//! - **resize** allocates, copies the common prefix, then frees the old block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the whole `Heap` in one mutex to share it
//! - **Never shrinks**: memory handed out by the source is kept for good
//! - **Linear search**: allocation walks every block in front of the fit
//!
//! ## Safety
//!
//! Blocks are offsets into memory owned by the heap's source, so the public
//! API is safe. Freeing an offset that is not a live allocation breaks the
//! block chain; `check_heap` reports the damage.

pub mod align;
pub mod block;
mod check;
mod config;
mod error;
mod heap;
mod source;

pub use block::BlockPtr;
pub use check::{BlockInfo, HeapFault, HeapReport};
pub use config::{CHUNKSIZE, HeapConfig, MAX_HEAP};
pub use error::{AllocError, ConfigError, Result, SourceError};
pub use heap::{Blocks, Heap, adjust_size};
pub use source::{ArenaSource, MemorySource, MmapSource};

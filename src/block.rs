//! Boundary-tag block layout.
//!
//! ```text
//!          header                                footer
//!   ┌──────────────┬──────────────────────────┬──────────────┐
//!   │ size | a/f   │        payload           │ size | a/f   │
//!   └──────────────┴──────────────────────────┴──────────────┘
//!   ▲              ▲
//!   bp - WSIZE     bp (payload offset, what callers hold)
//!
//!   word:  31 .................... 3   2   1   0
//!          s  s  s  s  ...  s  s  s   0   0  a/f
//! ```
//!
//! Blocks are addressed by the byte offset of their payload inside the heap
//! region. Neighbours are found from the sizes alone: the next block starts
//! `size` bytes later, the previous block's size is read from its footer,
//! which sits right below our header.

use std::fmt;

/// Word size in bytes. Headers and footers are one word each.
pub const WSIZE: usize = 4;
/// Doubleword size in bytes. Every block size and payload offset is a multiple of it.
pub const DSIZE: usize = 8;
/// Bytes of bookkeeping per block (header + footer).
pub const OVERHEAD: usize = 2 * WSIZE;
/// Smallest block that can exist on its own: one doubleword of payload plus tags.
pub const MIN_BLOCK: usize = DSIZE + OVERHEAD;

const SIZE_MASK: u32 = !0x7;
const ALLOC_BIT: u32 = 0x1;

/// Payload offset of a block inside the heap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(usize);

impl BlockPtr {
  pub const fn new(offset: usize) -> Self {
    Self(offset)
  }

  /// Byte offset of the payload from the start of the heap.
  pub const fn offset(self) -> usize {
    self.0
  }
}

impl fmt::Display for BlockPtr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#010x}", self.0)
  }
}

/// Decoded header or footer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  pub fn decode(word: u32) -> Self {
    Self {
      size: size_of(word),
      allocated: is_allocated(word),
    }
  }

  pub fn encode(self) -> u32 {
    pack(self.size, self.allocated)
  }
}

impl fmt::Display for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{}:{}]", self.size, if self.allocated { 'a' } else { 'f' })
  }
}

/// Packs a size and an allocated bit into one word.
///
/// Only the size's high bits survive, the low three bits are reserved for flags.
pub fn pack(
  size: usize,
  allocated: bool,
) -> u32 {
  debug_assert!(size <= u32::MAX as usize, "block size {size} does not fit a tag");
  (size as u32 & SIZE_MASK) | if allocated { ALLOC_BIT } else { 0 }
}

pub fn size_of(word: u32) -> usize {
  (word & SIZE_MASK) as usize
}

pub fn is_allocated(word: u32) -> bool {
  word & ALLOC_BIT != 0
}

/// Reads the word at byte offset `at`.
pub fn get(
  heap: &[u8],
  at: usize,
) -> u32 {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&heap[at..at + WSIZE]);
  u32::from_ne_bytes(word)
}

/// Writes `word` at byte offset `at`.
pub fn put(
  heap: &mut [u8],
  at: usize,
  word: u32,
) {
  heap[at..at + WSIZE].copy_from_slice(&word.to_ne_bytes());
}

pub fn header_of(bp: BlockPtr) -> usize {
  bp.0 - WSIZE
}

pub fn footer_of(
  heap: &[u8],
  bp: BlockPtr,
) -> usize {
  bp.0 + block_size(heap, bp) - DSIZE
}

/// Size of the block at `bp`, read from its header.
pub fn block_size(
  heap: &[u8],
  bp: BlockPtr,
) -> usize {
  size_of(get(heap, header_of(bp)))
}

pub fn header(
  heap: &[u8],
  bp: BlockPtr,
) -> Tag {
  Tag::decode(get(heap, header_of(bp)))
}

pub fn footer(
  heap: &[u8],
  bp: BlockPtr,
) -> Tag {
  Tag::decode(get(heap, footer_of(heap, bp)))
}

/// Writes matching header and footer tags for a block of `size` bytes at `bp`.
///
/// The header goes first so the footer position is computed from the new size.
pub fn set_tags(
  heap: &mut [u8],
  bp: BlockPtr,
  size: usize,
  allocated: bool,
) {
  let word = pack(size, allocated);
  put(heap, header_of(bp), word);
  let footer = footer_of(heap, bp);
  put(heap, footer, word);
}

pub fn next_block(
  heap: &[u8],
  bp: BlockPtr,
) -> BlockPtr {
  BlockPtr(bp.0 + block_size(heap, bp))
}

/// Requires the previous block's footer to be valid.
pub fn prev_block(
  heap: &[u8],
  bp: BlockPtr,
) -> BlockPtr {
  BlockPtr(bp.0 - size_of(get(heap, bp.0 - DSIZE)))
}

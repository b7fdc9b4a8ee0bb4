use log::{debug, trace, warn};

use crate::{
  align,
  block::{
    BlockPtr, DSIZE, MIN_BLOCK, OVERHEAD, Tag, WSIZE, block_size, footer, get, header, header_of, next_block, pack,
    prev_block, put, set_tags,
  },
  check::BlockInfo,
  config::{HeapConfig, INITIAL_LAYOUT},
  error::{AllocError, Result, SourceError},
  source::{ArenaSource, MemorySource},
};

/// Largest block size a 32-bit boundary tag can describe.
const MAX_BLOCK: usize = u32::MAX as usize & !(DSIZE - 1);

/// Implicit-list heap with boundary-tag coalescing and first-fit placement.
///
/// ```text
///   begin                                                      end
///   ┌─────┬──────────┬──────────┬───────────────────────┬──────────┐
///   │ pad │ hdr(8:a) │ ftr(8:a) │ zero or more blocks   │ hdr(0:a) │
///   └─────┴──────────┴──────────┴───────────────────────┴──────────┘
///         │      prologue       │                       │ epilogue │
/// ```
pub struct Heap<S: MemorySource = ArenaSource> {
  source: S,
  config: HeapConfig,
  /// Payload of the prologue block. Every walk starts here.
  heap_listp: BlockPtr,
}

impl Heap<ArenaSource> {
  /// Heap over a growable arena with the default configuration.
  pub fn new() -> Result<Self> {
    Self::with_config(HeapConfig::default())
  }

  /// Heap over a growable arena capped at `config.max_heap`.
  pub fn with_config(config: HeapConfig) -> Result<Self> {
    config.validate()?;
    Self::init(ArenaSource::new(config.max_heap), config)
  }
}

impl<S: MemorySource> Heap<S> {
  /// Lays down the prologue and epilogue, then extends the heap by one chunk.
  pub fn init(
    mut source: S,
    config: HeapConfig,
  ) -> Result<Self> {
    config.validate()?;

    let brk = source.brk();
    let padding = align!(brk) - brk;
    if padding != 0 {
      grow(&mut source, padding)?;
    }

    let start = grow(&mut source, INITIAL_LAYOUT)?;
    let heap = source.heap_mut();

    put(heap, start, 0);
    put(heap, start + WSIZE, pack(DSIZE, true));
    put(heap, start + DSIZE, pack(DSIZE, true));
    put(heap, start + WSIZE + DSIZE, pack(0, true));

    let mut heap = Self {
      source,
      config,
      heap_listp: BlockPtr::new(start + DSIZE),
    };

    debug!(
      "heap initialised: prologue = {}, chunk size = {}, max heap = {}",
      heap.heap_listp, config.chunk_size, config.max_heap
    );

    heap.extend_heap(config.chunk_size / WSIZE)?;

    Ok(heap)
  }

  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// The returned payload offset is doubleword aligned. Its contents are
  /// whatever the block held before.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr> {
    if size == 0 {
      return Err(AllocError::InvalidSize);
    }

    let asize = adjust_size(size).ok_or(AllocError::TooLarge { requested: size })?;

    if let Some(bp) = self.find_fit(asize) {
      self.place(bp, asize);
      trace!("allocate({size}) = {bp}, block size {asize}");
      return Ok(bp);
    }

    let extend_size = asize.max(self.config.chunk_size);
    let bp = self.extend_heap(extend_size / WSIZE)?;
    self.place(bp, asize);

    trace!("allocate({size}) = {bp}, block size {asize}, heap extended by {extend_size}");

    Ok(bp)
  }

  /// Returns a block to the heap and merges it with free neighbours.
  ///
  /// `bp` must be a live allocation of this heap. Anything else corrupts the
  /// block chain or panics on an out-of-bounds tag access.
  pub fn free(
    &mut self,
    bp: BlockPtr,
  ) {
    let heap = self.source.heap_mut();
    let size = block_size(heap, bp);

    set_tags(heap, bp, size, false);
    let merged = self.coalesce(bp);

    trace!("free({bp}) -> free block {merged}");
  }

  /// Moves a live allocation into a block of at least `size` bytes.
  ///
  /// The first `min(old payload, size)` bytes are carried over and the old
  /// block is freed. If the new block cannot be obtained nothing changes and
  /// `AllocError::ResizeFailed` is returned, the old block stays valid.
  pub fn resize(
    &mut self,
    bp: BlockPtr,
    size: usize,
  ) -> Result<BlockPtr> {
    let new_bp = self.allocate(size).map_err(|err| {
      warn!("resize({bp}, {size}) failed: {err}");
      AllocError::ResizeFailed(Box::new(err))
    })?;

    let copy_size = self.payload_size(bp).min(size);
    let from = bp.offset();
    self
      .source
      .heap_mut()
      .copy_within(from..from + copy_size, new_bp.offset());

    self.free(bp);

    trace!("resize({bp}, {size}) = {new_bp}, copied {copy_size} bytes");

    Ok(new_bp)
  }

  /// Usable payload bytes of the block at `bp`.
  pub fn payload_size(
    &self,
    bp: BlockPtr,
  ) -> usize {
    block_size(self.source.heap(), bp) - OVERHEAD
  }

  pub fn payload(
    &self,
    bp: BlockPtr,
  ) -> &[u8] {
    let len = self.payload_size(bp);
    &self.source.heap()[bp.offset()..bp.offset() + len]
  }

  pub fn payload_mut(
    &mut self,
    bp: BlockPtr,
  ) -> &mut [u8] {
    let len = self.payload_size(bp);
    &mut self.source.heap_mut()[bp.offset()..bp.offset() + len]
  }

  /// Current size of the heap region in bytes.
  pub fn heap_size(&self) -> usize {
    self.source.brk()
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  #[cfg(test)]
  pub(crate) fn source_mut(&mut self) -> &mut S {
    &mut self.source
  }

  pub(crate) fn prologue(&self) -> BlockPtr {
    self.heap_listp
  }

  /// Blocks between the prologue and the epilogue, in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    let heap = self.source.heap();

    Blocks {
      heap,
      next: next_block(heap, self.heap_listp),
    }
  }

  /// Grows the heap by `words` words (rounded up to an even count) and
  /// returns the new free block, merged with a trailing free block if any.
  fn extend_heap(
    &mut self,
    words: usize,
  ) -> Result<BlockPtr> {
    let words = if words % 2 == 1 { words + 1 } else { words };
    let size = words * WSIZE;

    // The old epilogue header becomes the new block's header.
    let bp = BlockPtr::new(grow(&mut self.source, size)?);
    let heap = self.source.heap_mut();

    set_tags(heap, bp, size, false);
    let epilogue = next_block(heap, bp);
    put(heap, header_of(epilogue), pack(0, true));

    debug!("heap extended by {size} bytes to {}", heap.len());

    Ok(self.coalesce(bp))
  }

  /// First-fit scan of the implicit list.
  fn find_fit(
    &self,
    asize: usize,
  ) -> Option<BlockPtr> {
    self
      .blocks()
      .find(|block| !block.header.allocated && asize <= block.header.size)
      .map(|block| block.ptr)
  }

  /// Marks `asize` bytes at the front of free block `bp` allocated, splitting
  /// off the rest when it can stand as a block of its own.
  fn place(
    &mut self,
    bp: BlockPtr,
    asize: usize,
  ) {
    let heap = self.source.heap_mut();
    let csize = block_size(heap, bp);

    if csize - asize >= MIN_BLOCK {
      set_tags(heap, bp, asize, true);
      let rest = next_block(heap, bp);
      set_tags(heap, rest, csize - asize, false);
    } else {
      set_tags(heap, bp, csize, true);
    }
  }

  /// Boundary-tag coalescing. The returned block replaces `bp`, which is no
  /// longer a block start when a free predecessor absorbed it.
  fn coalesce(
    &mut self,
    bp: BlockPtr,
  ) -> BlockPtr {
    let heap = self.source.heap_mut();

    let prev = prev_block(heap, bp);
    let next = next_block(heap, bp);
    let prev_alloc = footer(heap, prev).allocated;
    let next_alloc = header(heap, next).allocated;
    let size = block_size(heap, bp);

    match (prev_alloc, next_alloc) {
      (true, true) => bp,
      (true, false) => {
        set_tags(heap, bp, size + block_size(heap, next), false);
        bp
      }
      (false, true) => {
        set_tags(heap, prev, block_size(heap, prev) + size, false);
        prev
      }
      (false, false) => {
        let size = block_size(heap, prev) + size + block_size(heap, next);
        set_tags(heap, prev, size, false);
        prev
      }
    }
  }
}

/// Block size for a request of `size` payload bytes: tags added, rounded to
/// a doubleword, and never below the minimum block.
pub fn adjust_size(size: usize) -> Option<usize> {
  let asize = if size <= DSIZE {
    MIN_BLOCK
  } else {
    size.checked_add(OVERHEAD + DSIZE - 1)?;
    align!(size + OVERHEAD)
  };

  (asize <= MAX_BLOCK).then_some(asize)
}

/// Requests `incr` bytes from the source. The break never passes
/// `MAX_BLOCK`, so no block, however far it coalesces, outgrows its tags.
fn grow<S: MemorySource>(
  source: &mut S,
  incr: usize,
) -> Result<usize> {
  let brk = source.brk();
  if brk.checked_add(incr).is_none_or(|new_brk| new_brk > MAX_BLOCK) {
    warn!("growing the heap by {incr} bytes would pass the tag limit of {MAX_BLOCK} bytes");
    return Err(AllocError::OutOfMemory {
      requested: incr,
      source: SourceError::Exhausted {
        brk,
        incr,
        limit: MAX_BLOCK,
      },
    });
  }

  source.sbrk(incr).map_err(|err| {
    warn!("memory source refused {incr} bytes: {err}");
    AllocError::OutOfMemory {
      requested: incr,
      source: err,
    }
  })
}

/// Iterator over the blocks of a heap, see [`Heap::blocks`].
pub struct Blocks<'a> {
  heap: &'a [u8],
  next: BlockPtr,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let bp = self.next;
    let tag = Tag::decode(get(self.heap, header_of(bp)));

    if tag.size == 0 {
      return None;
    }

    self.next = next_block(self.heap, bp);

    Some(BlockInfo {
      ptr: bp,
      header: tag,
      footer: footer(self.heap, bp),
    })
  }
}

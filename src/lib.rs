//! # tagalloc - A Boundary-Tag Heap Allocator
//!
//! This crate provides a fixed-size heap allocator built on an **implicit free
//! list** with **boundary tags** and **immediate coalescing**.
//!
//! ## Overview
//!
//! The heap is one contiguous region obtained from the OS with `mmap`. Every
//! byte of it belongs to exactly one block, and blocks are found by walking
//! from the start and adding up lengths:
//!
//! ```text
//!   Heap Region (4096 bytes):
//!
//!   ┌──────────┬────────────────┬──────────┬─────────────────────┬─────┐
//!   │  alloc   │      free      │  alloc   │        free         │ EPI │
//!   └──────────┴────────────────┴──────────┴─────────────────────┴─────┘
//!   ▲          ▲                ▲          ▲                     ▲
//!   0      0 + len         ...                              4096 - 8
//!
//!   EPI = epilogue, an allocated 8 byte sentinel that is never freed.
//! ```
//!
//! ## Block Format
//!
//! ```text
//!   Allocated block:
//!   ┌────────┬──────────────────────────────┐
//!   │ header │      payload (+ padding)     │
//!   └────────┴──────────────────────────────┘
//!            ▲
//!            └── Payload returned to the caller
//!
//!   Free block:
//!   ┌────────┬──────────────────────┬────────┐
//!   │ header │   space (+ padding)  │ footer │
//!   └────────┴──────────────────────┴────────┘
//!     header == footer, both 2 bytes
//! ```
//!
//! A tag holds the block length, whether the previous block is allocated and
//! whether this block is allocated (see [`Tag`]). The footer lets a block find
//! the start of a free left neighbour, which is all coalescing needs.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── config     - Reference constants and HeapConfig
//!   ├── tag        - Boundary tag codec
//!   ├── region     - mmap-backed memory region (internal)
//!   ├── heap       - Heap lifecycle, block walking, dumps
//!   ├── allocate   - First-fit allocation with splitting
//!   ├── deallocate - Freeing with four-way coalescing
//!   ├── check      - Heap integrity checker
//!   ├── stats      - Running statistics
//!   └── error      - Error types
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::Heap;
//!
//! let mut heap = Heap::initialize().unwrap();
//!
//! let p = heap.allocate(8).unwrap();
//! heap.payload_mut(p).unwrap()[..8].copy_from_slice(&42u64.to_ne_bytes());
//! assert_eq!(heap.payload(p).unwrap()[..8], 42u64.to_ne_bytes());
//!
//! heap.deallocate(Some(p)).unwrap();
//! heap.check().unwrap();
//! heap.deinitialize().unwrap();
//! ```
//!
//! ## Limitations
//!
//! - **Fixed capacity**: the heap never grows
//! - **Single-threaded only**: no internal locking, wrap it in a mutex to share
//! - **Linear search**: allocation and deallocation walk the block list

#[macro_use]
pub mod align;
mod allocate;
mod check;
mod config;
mod deallocate;
mod error;
mod heap;
mod region;
mod stats;
mod tag;

pub use config::{
  HEAP_ALIGN, HEAP_SIZE, HeapConfig, MAX_BLOCK_LENGTH, MAX_HEAP_SIZE, MIN_BLOCK_SIZE, TAG_SIZE,
};
pub use deallocate::Coalesce;
pub use error::{Error, FreeError, Violation};
pub use heap::{Block, Blocks, Heap, HeapDump, Payload};
pub use stats::Stats;
pub use tag::{RawTag, Tag};

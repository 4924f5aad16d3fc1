//! The heap's backing memory. This is the only place that touches raw
//! pointers; everything above it works on byte slices and offsets.

use std::{mem::ManuallyDrop, ptr::NonNull, slice};

use snafu::ResultExt;

use crate::error::{Error, MapRegionSnafu, UnmapRegionSnafu};

/// One fixed-size, zero-initialized, read-write memory region obtained from
/// the host.
pub(crate) struct Region {
  base: NonNull<u8>,
  len: usize,
}

// SAFETY: the region is exclusively owned and never aliased, so moving it to
// another thread is fine. It is not `Sync`: callers needing shared access wrap
// the heap in a lock.
unsafe impl Send for Region {}

impl Region {
  pub fn acquire(len: usize) -> Result<Self, Error> {
    let base = unsafe { host::map(len) }.context(MapRegionSnafu { length: len })?;
    log::debug!("mapped {len} byte region at {base:p}");
    Ok(Self { base, len })
  }

  /// Returns the region to the host. On failure the mapping is leaked, the
  /// region is unusable either way.
  pub fn release(self) -> Result<(), Error> {
    let this = ManuallyDrop::new(self);
    unsafe { host::unmap(this.base, this.len) }.context(UnmapRegionSnafu { length: this.len })?;
    log::debug!("unmapped {} byte region at {:p}", this.len, this.base);
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn bytes(&self) -> &[u8] {
    // SAFETY: `base..base + len` is a live mapping owned by `self`.
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) }
  }

  pub fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as above, and `&mut self` guarantees exclusivity.
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    if let Err(err) = unsafe { host::unmap(self.base, self.len) } {
      log::error!("failed to unmap heap region at {:p}: {err}", self.base);
    }
  }
}

#[cfg(all(unix, not(miri)))]
mod host {
  use std::{io, ptr::NonNull};

  /// Maps `length` bytes of anonymous, private, read-write memory. The kernel
  /// hands anonymous pages out zero-filled.
  pub unsafe fn map(length: usize) -> io::Result<NonNull<u8>> {
    let protection = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    match unsafe { libc::mmap(std::ptr::null_mut(), length, protection, flags, -1, 0) } {
      libc::MAP_FAILED => Err(io::Error::last_os_error()),
      address => NonNull::new(address.cast()).ok_or_else(|| io::Error::other("mmap returned null")),
    }
  }

  pub unsafe fn unmap(
    address: NonNull<u8>,
    length: usize,
  ) -> io::Result<()> {
    if unsafe { libc::munmap(address.as_ptr().cast(), length) } != 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(())
  }
}

/// Without `mmap` (Miri has no FFI) the global allocator stands in for the
/// host.
#[cfg(any(miri, not(unix)))]
mod host {
  use std::{alloc, io, ptr::NonNull};

  use crate::HEAP_ALIGN;

  fn layout(length: usize) -> io::Result<alloc::Layout> {
    alloc::Layout::from_size_align(length, HEAP_ALIGN).map_err(io::Error::other)
  }

  pub unsafe fn map(length: usize) -> io::Result<NonNull<u8>> {
    let layout = layout(length)?;
    NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
      .ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
  }

  pub unsafe fn unmap(
    address: NonNull<u8>,
    length: usize,
  ) -> io::Result<()> {
    let layout = layout(length)?;
    unsafe { alloc::dealloc(address.as_ptr(), layout) };
    Ok(())
  }
}

use std::ptr::NonNull;

use crate::error::{RewriteError, RewriteResult};

fn page_size() -> usize {
    // SAFETY: `sysconf` with `_SC_PAGESIZE` has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

fn round_up_to_page(size: usize) -> usize {
    let page = page_size();
    (size + page - 1) / page * page
}

/// A page-aligned, read/write/execute memory region that emitted code is
/// bump-allocated into. Owns the raw mapping and unmaps it on `Drop`, so a
/// caller cannot leak pages by forgetting to call `destroy` — `destroy` is
/// kept as an explicit operation purely for symmetry with the arena
/// lifecycle as specified, not because it is the only way to release the
/// pages.
pub struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    used: usize,
}

// The arena hands out raw pointers into mapped memory; the memory itself
// has no thread affinity. Sharing an `Arena` across threads without
// synchronization would race on `used`, so we only assert `Send`.
unsafe impl Send for Arena {}

impl Arena {
    /// Maps at least `requested_size` bytes of R/W/X memory, rounded up to
    /// the host page size.
    pub fn create(requested_size: usize) -> RewriteResult<Arena> {
        let capacity = round_up_to_page(requested_size.max(1));
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RewriteError::OutOfMemory(std::io::Error::last_os_error()));
        }
        let base = NonNull::new(ptr as *mut u8).expect("mmap returned a null non-MAP_FAILED pointer");
        tracing::debug!(capacity, "mapped executable arena");
        Ok(Arena { base, capacity, used: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Returns the next writable address without advancing `used`.
    pub fn reserve(&self, size: usize) -> RewriteResult<*mut u8> {
        if self.used + size > self.capacity {
            return Err(RewriteError::ArenaExhausted {
                requested: size,
                available: self.capacity - self.used,
            });
        }
        // SAFETY: `used + size <= capacity`, checked above.
        Ok(unsafe { self.base.as_ptr().add(self.used) })
    }

    /// Same as `reserve`, but advances `used` by `size`.
    pub fn commit(&mut self, size: usize) -> RewriteResult<*mut u8> {
        let ptr = self.reserve(size)?;
        self.used += size;
        Ok(ptr)
    }

    /// Writes `bytes` at the next free offset and commits them, returning
    /// the address they were written at.
    pub fn write(&mut self, bytes: &[u8]) -> RewriteResult<*const u8> {
        let ptr = self.commit(bytes.len())?;
        // SAFETY: `commit` guaranteed `ptr..ptr+bytes.len()` lies within
        // the mapped, writable region.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        Ok(ptr as *const u8)
    }

    pub fn base_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Drops write permission, leaving the mapping read/execute only.
    /// A no-op on the default Linux target, which permits simultaneous
    /// W+X; provided so hosts that forbid it can flip this boundary
    /// between emission and execution.
    pub fn seal(&mut self) -> RewriteResult<()> {
        self.mprotect(libc::PROT_READ | libc::PROT_EXEC)
    }

    /// Restores write permission after a `seal`.
    pub fn unseal(&mut self) -> RewriteResult<()> {
        self.mprotect(libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC)
    }

    fn mprotect(&self, prot: libc::c_int) -> RewriteResult<()> {
        let result = unsafe { libc::mprotect(self.base.as_ptr() as *mut libc::c_void, self.capacity, prot) };
        if result != 0 {
            return Err(RewriteError::OutOfMemory(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Releases the underlying pages. Equivalent to dropping the arena;
    /// kept as an explicit method so callers can release memory before the
    /// end of scope without relying on `drop(arena)` reading as intentional.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.capacity) };
        if result != 0 {
            tracing::debug!(error = %std::io::Error::last_os_error(), "failed to unmap executable arena");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rounds_up_to_a_page() {
        let arena = Arena::create(1).unwrap();
        assert!(arena.capacity() >= page_size());
        assert_eq!(arena.capacity() % page_size(), 0);
    }

    #[test]
    fn reserve_does_not_advance_used() {
        let arena = Arena::create(64).unwrap();
        let before = arena.used();
        arena.reserve(16).unwrap();
        assert_eq!(arena.used(), before);
    }

    #[test]
    fn commit_advances_used_and_stays_in_bounds() {
        let mut arena = Arena::create(64).unwrap();
        let cap = arena.capacity();
        arena.commit(16).unwrap();
        assert_eq!(arena.used(), 16);
        assert!(arena.used() <= cap);
    }

    #[test]
    fn exhausting_the_arena_returns_arena_exhausted() {
        let mut arena = Arena::create(16).unwrap();
        let cap = arena.capacity();
        let err = arena.commit(cap + 1).unwrap_err();
        assert!(matches!(err, RewriteError::ArenaExhausted { .. }));
    }

    #[test]
    fn write_round_trips_bytes_into_the_mapping() {
        let mut arena = Arena::create(64).unwrap();
        let bytes = [0xC3u8, 0x90, 0x90];
        let ptr = arena.write(&bytes).unwrap();
        let read_back = unsafe { std::slice::from_raw_parts(ptr, bytes.len()) };
        assert_eq!(read_back, &bytes);
    }
}

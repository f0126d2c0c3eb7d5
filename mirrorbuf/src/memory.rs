//! Double-mapped storage backing the ring buffer.
//!
//! A single memfd of `size` bytes is mapped twice, back to back, inside a
//! reserved range of `2 * size` bytes. Byte `k` and byte `k + size` are the
//! same physical byte, so a run of up to `size` bytes starting anywhere in the
//! first half is contiguous even when it crosses the end of the buffer.

use crate::error::{Half, MirrorBufError};
use core::ptr::NonNull;
use nix::errno::Errno;
use nix::sys::memfd::{memfd_create, MFdFlags};
use nix::sys::mman::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
use nix::unistd::ftruncate;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use tracing::{debug, error};

pub struct Memory {
    ptr: NonNull<u8>,
    size: usize,
    page_size: usize,
}

impl Memory {
    /// Maps `size` bytes twice. `size` must be a power of two and at least
    /// one page.
    pub fn new(size: usize) -> Result<Self, MirrorBufError> {
        let page_size = page_size();
        let invalid = MirrorBufError::InvalidCapacity {
            capacity: size,
            element_size: 1,
            page_size,
        };
        let len = NonZeroUsize::new(size)
            .filter(|len| len.get() >= page_size && len.is_power_of_two())
            .ok_or(invalid)?;
        let total = size
            .checked_mul(2)
            .and_then(NonZeroUsize::new)
            .ok_or(invalid)?;

        let fd = memfd_create(c"mirrorbuf", MFdFlags::MFD_CLOEXEC)
            .map_err(|errno| MirrorBufError::ObjectCreation { errno })?;
        ftruncate(&fd, size as libc::off_t)
            .map_err(|errno| MirrorBufError::ObjectCreation { errno })?;

        let base = unsafe {
            mmap_anonymous(
                None,
                total,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
            )
            .map_err(|errno| MirrorBufError::Reserve { errno })?
        };

        // From here on dropping `memory` releases the whole reservation.
        let memory = Memory {
            ptr: base.cast(),
            size,
            page_size,
        };

        memory.map_half(&fd, len, Half::First)?;
        memory.map_half(&fd, len, Half::Second)?;

        unsafe {
            memory.ptr.as_ptr().write_bytes(0, size);
        }

        debug!(
            base = ?memory.ptr,
            size = size,
            page_size = page_size,
            "mapped mirrored memory"
        );

        Ok(memory)
    }

    fn map_half(&self, fd: &OwnedFd, len: NonZeroUsize, half: Half) -> Result<(), MirrorBufError> {
        let offset = match half {
            Half::First => 0,
            Half::Second => self.size,
        };
        let addr = unsafe { self.ptr.as_ptr().add(offset) };

        let mapped = unsafe {
            mmap(
                NonZeroUsize::new(addr as usize),
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
                fd,
                0,
            )
            .map_err(|errno| MirrorBufError::Map { half, errno })?
        };

        if mapped.as_ptr() as usize != addr as usize {
            return Err(MirrorBufError::Map {
                half,
                errno: Errno::EFAULT,
            });
        }

        Ok(())
    }

    /// Start of the first half.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of one half in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        let res = unsafe { munmap(self.ptr.cast(), self.size * 2) };
        if let Err(errno) = res {
            error!(
                base = ?self.ptr,
                size = self.size,
                errno = %errno,
                "failed to unmap mirrored memory"
            );
        }
    }
}

unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}

pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Result;
    use rstest::*;

    #[test]
    fn test_continuous_mapping() -> Result<()> {
        let size = page_size() * 2;
        let memory = Memory::new(size)?;

        let ptr = memory.as_ptr().as_ptr();

        unsafe {
            for i in 0..size {
                ptr.add(i).write((i % 251) as u8);
            }

            for i in 0..size {
                let expected = (i % 251) as u8;
                assert_eq!(ptr.add(i).read(), expected, "mismatch at position {}", i);
                assert_eq!(
                    ptr.add(i + size).read(),
                    expected,
                    "mismatch at mirrored position {}",
                    i + size
                );
            }
        }

        Ok(())
    }

    #[rstest]
    #[case::one_byte(1, 1)]
    #[case::straddle_small(8, 8)]
    #[case::straddle_uneven(3, 100)]
    #[case::second_half_only(0, 64)]
    #[case::whole_buffer(1, 4095)]
    fn test_wrap_around_write(#[case] before: usize, #[case] after: usize) -> Result<()> {
        let size = page_size();
        let memory = Memory::new(size)?;
        let ptr = memory.as_ptr().as_ptr();

        let len = before + after;
        let start = size - before;

        unsafe {
            for i in 0..len {
                ptr.add(start + i).write((i % 253) as u8 ^ 0x5a);
            }

            let span = std::slice::from_raw_parts(ptr.add(start), len);
            for (i, &byte) in span.iter().enumerate() {
                assert_eq!(byte, (i % 253) as u8 ^ 0x5a, "mismatch at offset {}", i);
            }

            // Bytes written past the end of the first half land at its start.
            for i in before..len {
                let wrapped = (start + i) % size;
                assert_eq!(ptr.add(wrapped).read(), (i % 253) as u8 ^ 0x5a);
            }
        }

        Ok(())
    }

    #[test]
    fn test_zero_filled() -> Result<()> {
        let size = page_size() * 4;
        let memory = Memory::new(size)?;
        let bytes = unsafe { std::slice::from_raw_parts(memory.as_ptr().as_ptr(), size * 2) };
        assert!(bytes.iter().all(|&b| b == 0));
        Ok(())
    }

    #[rstest]
    #[case::zero(0)]
    #[case::below_page(page_size() / 2)]
    #[case::not_power_of_two(page_size() * 3)]
    fn test_invalid_size(#[case] size: usize) {
        let err = Memory::new(size).err();
        assert!(
            matches!(err, Some(MirrorBufError::InvalidCapacity { capacity, .. }) if capacity == size),
            "unexpected result {:?}",
            err
        );
    }

    #[test]
    fn test_accessors() -> Result<()> {
        let size = page_size() * 8;
        let memory = Memory::new(size)?;
        assert_eq!(memory.size(), size);
        assert_eq!(memory.page_size(), page_size());
        assert_eq!(memory.as_ptr().as_ptr() as usize % page_size(), 0);
        Ok(())
    }
}

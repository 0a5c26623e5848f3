//! Named POSIX shared memory segments for the credential handoff.
//!
//! A segment is created by the producer, written once, read at most once by
//! the automation process and then zero-filled and unlinked by whichever side
//! finishes last. Dropping a [`SharedMemorySegment`] does not unlink it: the
//! producer may exit long before the consumer reads.

use crate::errors::CredentialError;

/// Handle to a published segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMemorySegment {
    name: String,
    size_bytes: usize,
}

impl SharedMemorySegment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

/// POSIX object names need a single leading slash
pub fn segment_path(name: &str) -> String {
    format!("/{}", name.trim_start_matches('/'))
}

/// Zero-fill, close and unlink a segment
pub fn erase(segment: SharedMemorySegment) -> Result<(), CredentialError> {
    erase_by_name(&segment.name)
}

#[cfg(unix)]
pub use self::unix::{erase_by_name, exists, publish, retrieve, retrieve_all};

#[cfg(not(unix))]
pub use self::unsupported::{erase_by_name, exists, publish, retrieve, retrieve_all};

#[cfg(unix)]
mod unix {
    use super::{segment_path, SharedMemorySegment};
    use crate::errors::CredentialError;
    use nix::errno::Errno;
    use nix::fcntl::OFlag;
    use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
    use nix::sys::stat::Mode;
    use std::ffi::c_void;
    use std::fs::File;
    use std::num::NonZeroUsize;
    use std::ptr::NonNull;
    use tracing::{debug, info, warn};
    use zeroize::{Zeroize, Zeroizing};

    /// A live `mmap` of a segment, unmapped on drop
    struct Mapping {
        ptr: NonNull<c_void>,
        len: usize,
    }

    impl Mapping {
        fn new(
            file: &File,
            len: usize,
            writable: bool,
            name: &str,
        ) -> Result<Self, CredentialError> {
            let length = NonZeroUsize::new(len).ok_or_else(|| {
                CredentialError::InvalidPayload(format!("cannot map empty segment {name}"))
            })?;
            let prot = if writable {
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE
            } else {
                ProtFlags::PROT_READ
            };
            // SAFETY: the descriptor refers to a shared memory object at least
            // `len` bytes long, and the mapping is released in `Drop` before
            // any slice derived from it can outlive it.
            let ptr = unsafe { mmap(None, length, prot, MapFlags::MAP_SHARED, file, 0) }
                .map_err(|e| os_error(name, "mmap", e))?;
            Ok(Self { ptr, len })
        }

        fn as_slice(&self) -> &[u8] {
            // SAFETY: `ptr` maps `len` readable bytes for the lifetime of `self`.
            unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len) }
        }

        fn as_mut_slice(&mut self) -> &mut [u8] {
            // SAFETY: only writable mappings are mutated, and `&mut self`
            // guarantees no other slice into the mapping is alive.
            unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<u8>(), self.len) }
        }
    }

    impl Drop for Mapping {
        fn drop(&mut self) {
            // SAFETY: `ptr`/`len` come from a successful `mmap` and are unmapped once.
            if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
                warn!(error = %e, "munmap failed");
            }
        }
    }

    fn os_error(name: &str, operation: &'static str, errno: Errno) -> CredentialError {
        CredentialError::Os {
            name: name.to_string(),
            operation,
            message: errno.desc().to_string(),
        }
    }

    fn io_error(name: &str, operation: &'static str, error: std::io::Error) -> CredentialError {
        CredentialError::Os {
            name: name.to_string(),
            operation,
            message: error.to_string(),
        }
    }

    fn open(name: &str, flags: OFlag) -> Result<File, Errno> {
        shm_open(name, flags, Mode::S_IRUSR | Mode::S_IWUSR).map(File::from)
    }

    fn open_existing(name: &str, flags: OFlag) -> Result<File, CredentialError> {
        open(name, flags).map_err(|errno| match errno {
            Errno::ENOENT => CredentialError::SegmentNotFound(name.to_string()),
            other => os_error(name, "shm_open", other),
        })
    }

    fn segment_len(file: &File, name: &str) -> Result<usize, CredentialError> {
        let len = file.metadata().map_err(|e| io_error(name, "fstat", e))?.len();
        usize::try_from(len).map_err(|_| CredentialError::Os {
            name: name.to_string(),
            operation: "fstat",
            message: format!("segment length {len} does not fit in memory"),
        })
    }

    fn zero_fill(file: &File, name: &str) -> Result<usize, CredentialError> {
        let len = segment_len(file, name)?;
        if len > 0 {
            let mut mapping = Mapping::new(file, len, true, name)?;
            mapping.as_mut_slice().zeroize();
        }
        Ok(len)
    }

    /// Zero-fill a leftover segment and hand it back for reuse
    fn reuse_in_place(name: &str) -> Result<File, CredentialError> {
        let file = open_existing(name, OFlag::O_RDWR)?;
        zero_fill(&file, name)?;
        Ok(file)
    }

    pub fn publish(name: &str, bytes: &[u8]) -> Result<SharedMemorySegment, CredentialError> {
        let name = segment_path(name);
        if bytes.is_empty() {
            return Err(CredentialError::InvalidPayload(format!(
                "refusing to publish an empty payload to {name}"
            )));
        }

        let create = OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR;
        let file = match open(&name, create) {
            Ok(file) => file,
            Err(Errno::EEXIST) => {
                warn!(segment = %name, "Leftover segment found; erasing it before re-creating");
                if let Err(e) = erase_by_name(&name) {
                    warn!(segment = %name, error = %e, "Could not erase leftover segment");
                }
                match open(&name, create) {
                    Ok(file) => file,
                    Err(errno) => {
                        warn!(
                            segment = %name,
                            error = %errno.desc(),
                            "Re-creation refused; reusing the existing segment in place"
                        );
                        reuse_in_place(&name)?
                    }
                }
            }
            Err(errno) => return Err(os_error(&name, "shm_open", errno)),
        };

        file.set_len(bytes.len() as u64)
            .map_err(|e| io_error(&name, "ftruncate", e))?;
        let mut mapping = Mapping::new(&file, bytes.len(), true, &name)?;
        mapping.as_mut_slice().copy_from_slice(bytes);

        info!(segment = %name, size = bytes.len(), "Published shared memory segment");
        Ok(SharedMemorySegment {
            name,
            size_bytes: bytes.len(),
        })
    }

    pub fn retrieve(
        name: &str,
        expected_size: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        let name = segment_path(name);
        let file = open_existing(&name, OFlag::O_RDONLY)?;
        let actual = segment_len(&file, &name)?;
        if actual < expected_size {
            return Err(CredentialError::SegmentTooSmall {
                name,
                expected: expected_size,
                actual,
            });
        }
        if expected_size == 0 {
            return Ok(Zeroizing::new(Vec::new()));
        }
        let mapping = Mapping::new(&file, expected_size, false, &name)?;
        debug!(segment = %name, size = expected_size, "Read shared memory segment");
        Ok(Zeroizing::new(mapping.as_slice().to_vec()))
    }

    pub fn retrieve_all(name: &str) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        let path = segment_path(name);
        let file = open_existing(&path, OFlag::O_RDONLY)?;
        let len = segment_len(&file, &path)?;
        drop(file);
        retrieve(&path, len)
    }

    pub fn exists(name: &str) -> bool {
        open(&segment_path(name), OFlag::O_RDONLY).is_ok()
    }

    pub fn erase_by_name(name: &str) -> Result<(), CredentialError> {
        let name = segment_path(name);
        let file = open_existing(&name, OFlag::O_RDWR)?;
        let zeroed = zero_fill(&file, &name);
        drop(file);
        let unlinked = shm_unlink(name.as_str()).map_err(|e| os_error(&name, "shm_unlink", e));
        let len = zeroed?;
        unlinked?;
        debug!(segment = %name, size = len, "Erased shared memory segment");
        Ok(())
    }
}

#[cfg(not(unix))]
mod unsupported {
    use super::SharedMemorySegment;
    use crate::errors::CredentialError;
    use zeroize::Zeroizing;

    fn unsupported(name: &str) -> CredentialError {
        CredentialError::Unsupported(format!("cannot handle segment {name}"))
    }

    pub fn publish(name: &str, _bytes: &[u8]) -> Result<SharedMemorySegment, CredentialError> {
        Err(unsupported(name))
    }

    pub fn retrieve(
        name: &str,
        _expected_size: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        Err(unsupported(name))
    }

    pub fn retrieve_all(name: &str) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        Err(unsupported(name))
    }

    pub fn exists(_name: &str) -> bool {
        false
    }

    pub fn erase_by_name(name: &str) -> Result<(), CredentialError> {
        Err(unsupported(name))
    }
}

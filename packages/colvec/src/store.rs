//! Backing stores for swapped-out segments.
//!
//! A store keeps the encoded swap image of a segment under its handle and
//! returns it bit-for-bit on load. Two implementations:
//!
//! - [`MemoryBackingStore`]: images held in a map (ephemeral, no disk I/O).
//! - [`FileBackingStore`]: one `seg_NNNNNN.swp` file per segment, read back
//!   through a memory map.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::error::{Result, VectorError};
use crate::memory::SegmentHandle;

/// Bytes of a loaded swap image.
pub enum SwapImage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for SwapImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SwapImage::Owned(bytes) => bytes.as_slice(),
            SwapImage::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Durable home for swapped-out segment images.
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Save the image for `handle`, replacing any previous one.
    fn save(&self, handle: SegmentHandle, image: &[u8]) -> Result<()>;

    /// Load the image saved for `handle`.
    fn load(&self, handle: SegmentHandle) -> Result<SwapImage>;

    /// Remove the image for `handle`. Missing images are not an error.
    fn remove(&self, handle: SegmentHandle) -> Result<()>;

    fn contains(&self, handle: SegmentHandle) -> bool;
}

// ── MemoryBackingStore ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryBackingStore {
    images: Mutex<HashMap<SegmentHandle, Vec<u8>>>,
}

impl MemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images.
    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BackingStore for MemoryBackingStore {
    fn save(&self, handle: SegmentHandle, image: &[u8]) -> Result<()> {
        self.images.lock().insert(handle, image.to_vec());
        Ok(())
    }

    fn load(&self, handle: SegmentHandle) -> Result<SwapImage> {
        self.images
            .lock()
            .get(&handle)
            .map(|bytes| SwapImage::Owned(bytes.clone()))
            .ok_or(VectorError::SegmentNotFound(handle.0))
    }

    fn remove(&self, handle: SegmentHandle) -> Result<()> {
        self.images.lock().remove(&handle);
        Ok(())
    }

    fn contains(&self, handle: SegmentHandle) -> bool {
        self.images.lock().contains_key(&handle)
    }
}

// ── FileBackingStore ───────────────────────────────────────────────

#[derive(Debug)]
pub struct FileBackingStore {
    dir: PathBuf,
}

impl FileBackingStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the image file for `handle`.
    pub fn image_path(&self, handle: SegmentHandle) -> PathBuf {
        self.dir.join(format!("seg_{:06}.swp", handle.0))
    }
}

impl BackingStore for FileBackingStore {
    fn save(&self, handle: SegmentHandle, image: &[u8]) -> Result<()> {
        let path = self.image_path(handle);
        let mut file = File::create(&path)?;
        file.write_all(image)?;
        file.sync_all()?;
        Ok(())
    }

    fn load(&self, handle: SegmentHandle) -> Result<SwapImage> {
        let path = self.image_path(handle);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorError::SegmentNotFound(handle.0));
            }
            Err(e) => return Err(VectorError::Io(e)),
        };
        if file.metadata()?.len() == 0 {
            // Zero-length files cannot be mapped on every platform.
            return Ok(SwapImage::Owned(Vec::new()));
        }
        // Images are written once and never modified while mapped.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(SwapImage::Mapped(mmap))
    }

    fn remove(&self, handle: SegmentHandle) -> Result<()> {
        match std::fs::remove_file(self.image_path(handle)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VectorError::Io(e)),
        }
    }

    fn contains(&self, handle: SegmentHandle) -> bool {
        self.image_path(handle).exists()
    }
}

// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Memory-mapped sample files.
//!
//! The `MmapArena` owns the memory-mapped data file of a stream and hands
//! out bounds-checked slices. Sources keep the arena for their whole
//! lifetime, so every trace read borrows from a mapping that outlives it.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ephysio::io::arena::MmapArena;
//!
//! let arena = MmapArena::open("continuous.dat")?;
//! let traces = arena.read_interleaved_i16(0, 384, 0, 100, None)?;
//! assert_eq!(traces.num_channels, 384);
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::io::metadata::Traces;
use crate::io::traits::check_read_range;
use crate::EphysError;

/// A memory-mapped file arena that owns all file data.
///
/// # Safety
///
/// This type is a thin wrapper around `memmap2::Mmap`. The mapping is
/// read-only and owned by the arena; every slice borrowed from it is tied
/// to the arena's lifetime.
pub struct MmapArena {
    /// The memory-mapped file (owned)
    mmap: memmap2::Mmap,
    /// File path for diagnostics
    path: String,
}

impl MmapArena {
    /// Open a file and create a memory-mapped arena.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EphysError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let file = File::open(path_ref).map_err(|e| EphysError::io(&path_str, e))?;

        // The arena owns the mapping and only lends slices tied to its lifetime.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| EphysError::io(&path_str, format!("failed to mmap: {e}")))?;

        Ok(Self {
            mmap,
            path: path_str,
        })
    }

    /// Get the file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a reference to the memory-mapped data.
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Get the length of the data.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Check if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Create a reference to a slice of the data with bounds checking.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], EphysError> {
        let end = offset.checked_add(len).ok_or_else(|| {
            EphysError::out_of_range("byte offset", offset as u64, self.mmap.len() as u64)
        })?;

        if end > self.mmap.len() {
            return Err(EphysError::out_of_range(
                "byte range end",
                end as u64,
                self.mmap.len() as u64,
            ));
        }

        Ok(&self.mmap[offset..end])
    }

    /// Number of complete frames of `total_channels` little-endian i16
    /// samples stored after `header_len` bytes.
    pub fn interleaved_frames(&self, header_len: usize, total_channels: usize) -> u64 {
        if total_channels == 0 || self.mmap.len() < header_len {
            return 0;
        }
        ((self.mmap.len() - header_len) / (total_channels * 2)) as u64
    }

    /// Read frames `[start, end)` from an interleaved little-endian i16 file.
    ///
    /// `total_channels` is the number of channels stored per frame;
    /// `channels` selects which of them are returned (all if `None`).
    pub fn read_interleaved_i16(
        &self,
        header_len: usize,
        total_channels: usize,
        start: u64,
        end: u64,
        channels: Option<&[usize]>,
    ) -> Result<Traces, EphysError> {
        let frames = self.interleaved_frames(header_len, total_channels);
        let selected = check_read_range(start, end, frames, total_channels, channels)?;

        let frame_bytes = total_channels * 2;
        let num_frames = (end - start) as usize;
        let block = self.slice(header_len + start as usize * frame_bytes, num_frames * frame_bytes)?;

        let mut traces = Traces::new(num_frames, selected.len());
        for frame in block.chunks_exact(frame_bytes) {
            for &ch in &selected {
                traces.data.push(LittleEndian::read_i16(&frame[ch * 2..ch * 2 + 2]));
            }
        }
        Ok(traces)
    }
}

impl Deref for MmapArena {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.mmap
    }
}

impl std::fmt::Debug for MmapArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapArena")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn create_temp_file(name: &str, data: &[u8]) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "ephysio_test_arena_{}_{}.tmp",
            std::process::id(),
            name
        ));
        {
            let mut temp_file = File::create(&path).unwrap();
            temp_file.write_all(data).unwrap();
            temp_file.flush().unwrap();
        }
        path.to_str().unwrap().to_string()
    }

    fn interleaved(frames: &[[i16; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for frame in frames {
            for v in frame {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn test_arena_slice() {
        let path = create_temp_file("slice", b"hello world");

        let arena = MmapArena::open(&path).unwrap();
        assert_eq!(arena.len(), 11);
        assert_eq!(arena.slice(6, 5).unwrap(), b"world");
        assert!(arena.slice(0, 100).is_err());
        assert!(arena.slice(10, 2).is_err());
        assert_eq!(arena.first(), Some(&b'h'));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_interleaved() {
        let data = interleaved(&[[1, 2, 3], [4, 5, 6], [7, 8, 9], [-1, -2, -3]]);
        let path = create_temp_file("interleaved", &data);

        let arena = MmapArena::open(&path).unwrap();
        assert_eq!(arena.interleaved_frames(0, 3), 4);

        let all = arena.read_interleaved_i16(0, 3, 1, 3, None).unwrap();
        assert_eq!(all.num_frames, 2);
        assert_eq!(all.data, vec![4, 5, 6, 7, 8, 9]);

        let some = arena.read_interleaved_i16(0, 3, 0, 4, Some(&[2, 0])).unwrap();
        assert_eq!(some.channel(0), vec![3, 6, 9, -3]);
        assert_eq!(some.channel(1), vec![1, 4, 7, -1]);

        assert!(arena.read_interleaved_i16(0, 3, 0, 5, None).is_err());
        assert!(arena.read_interleaved_i16(0, 3, 0, 1, Some(&[3])).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_interleaved_with_header() {
        let mut data = vec![0xAA; 4];
        data.extend(interleaved(&[[10, 20, 30], [40, 50, 60]]));
        let path = create_temp_file("header", &data);

        let arena = MmapArena::open(&path).unwrap();
        assert_eq!(arena.interleaved_frames(4, 3), 2);
        let t = arena.read_interleaved_i16(4, 3, 1, 2, Some(&[1])).unwrap();
        assert_eq!(t.data, vec![50]);

        let _ = std::fs::remove_file(&path);
    }
}

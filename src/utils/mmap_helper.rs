/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::{Context, Result};
use mmap_rs::{Mmap, MmapFlags};
use std::path::Path;

/// A read-only memory mapping of a whole file, exposed as a byte slice.
///
/// Kernel objects can be large, so both the ELF and the DWARF readers work
/// directly on the mapping instead of loading the file into memory.
pub struct MmapHelper {
    mmap: Mmap,
    len: usize,
}

impl MmapHelper {
    /// Memory maps the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let len = path
            .metadata()
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len() as usize;
        let file = std::fs::File::open(path)
            .with_context(|| format!("Cannot open {}", path.display()))?;
        let mmap = unsafe {
            mmap_rs::MmapOptions::new(len.max(1))
                .with_context(|| format!("Cannot initialize mmap of size {}", len.max(1)))?
                .with_flags(MmapFlags::empty())
                .with_file(&file, 0)
                .map()
                .with_context(|| format!("Cannot mmap {} (size {})", path.display(), len))?
        };
        Ok(Self { mmap, len })
    }
}

impl AsRef<[u8]> for MmapHelper {
    fn as_ref(&self) -> &[u8] {
        &self.mmap.as_ref()[..self.len]
    }
}

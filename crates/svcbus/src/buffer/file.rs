// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-backed stream.

use super::cursor::{resolve_offset, CursorPosition, SeekOrigin, INVALID_CURSOR_POSITION};
use crate::error::Result;
use crate::ser::{InStream, OutStream};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Stream over a file. The cursor may move past the end; writing there
/// extends the file.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    path: PathBuf,
}

impl FileStream {
    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self { file, path })
    }

    /// Create (or truncate) a file for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length.
    pub fn len(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

impl CursorPosition for FileStream {
    fn position(&self) -> u64 {
        (&self.file)
            .stream_position()
            .unwrap_or(INVALID_CURSOR_POSITION)
    }

    fn set_position(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let anchor = match origin {
            SeekOrigin::Begin => 0,
            SeekOrigin::Current => self.position(),
            SeekOrigin::End => self.len(),
        };
        if anchor == INVALID_CURSOR_POSITION {
            return INVALID_CURSOR_POSITION;
        }
        let Some(target) = resolve_offset(anchor, offset) else {
            return INVALID_CURSOR_POSITION;
        };
        match self.file.seek(SeekFrom::Start(target)) {
            Ok(pos) => pos,
            Err(e) => {
                log::debug!("[FileStream] seek in {} failed: {}", self.path.display(), e);
                INVALID_CURSOR_POSITION
            }
        }
    }
}

impl OutStream for FileStream {
    fn write_bytes(&mut self, data: &[u8]) -> usize {
        match self.file.write_all(data) {
            Ok(()) => data.len(),
            Err(e) => {
                log::warn!("[FileStream] write to {} failed: {}", self.path.display(), e);
                0
            }
        }
    }
}

impl InStream for FileStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("[FileStream] read from {} failed: {}", self.path.display(), e);
                    break;
                }
            }
        }
        total
    }

    fn bytes_available(&self) -> usize {
        let position = self.position();
        if position == INVALID_CURSOR_POSITION {
            return 0;
        }
        usize::try_from(self.len().saturating_sub(position)).unwrap_or(usize::MAX)
    }
}

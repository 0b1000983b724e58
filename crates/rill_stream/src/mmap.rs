// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use rill_base::{Object, ObjectState, Position, Status};
use rill_chain::{Block, Chain};

use crate::reader::clamp_to_usize;
use crate::Reader;

/// A reader over a memory-mapped file.
///
/// The whole mapping is the window, so pulls never copy and random access is
/// free. [`read_to_chain()`][Reader::read_to_chain] yields external blocks
/// referencing the mapping, and [`new_reader()`][Reader::new_reader] shares
/// it, so independent readers over the same file are safe from any thread.
#[derive(Debug)]
pub struct MmapReader {
    state: ObjectState,
    map: Arc<Mmap>,
    cursor: usize,
}

// An external chain block referencing a range of the shared mapping.
#[derive(Debug)]
struct MappedRange {
    map: Arc<Mmap>,
    start: usize,
    end: usize,
}

impl AsRef<[u8]> for MappedRange {
    fn as_ref(&self) -> &[u8] {
        &self.map[self.start..self.end]
    }
}

impl MmapReader {
    /// Maps `path` and creates a reader positioned at 0.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|error| Status::io(&error).annotate(format!("opening {}", path.display())))?;
        // SAFETY: The mapping is read-only and stays alive for as long as any
        // reader or chain block references it through the Arc. Truncation of
        // the underlying file by another process invalidates the mapping;
        // that is the documented hazard of every file mapping and is accepted
        // by callers choosing the mmap backend.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|error| Status::io(&error).annotate(format!("mapping {}", path.display())))?;
        tracing::debug!(path = %path.display(), len = map.len(), "mapped file");
        Ok(Self {
            state: ObjectState::new(),
            map: Arc::new(map),
            cursor: 0,
        })
    }

    fn shared(map: Arc<Mmap>, pos: usize) -> Self {
        let cursor = pos.min(map.len());
        Self {
            state: ObjectState::new(),
            map,
            cursor,
        }
    }
}

impl Object for MmapReader {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at byte {}", self.cursor))
    }
}

impl Reader for MmapReader {
    fn window(&self) -> &[u8] {
        &self.map
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.map.len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        self.map.len() as Position
    }

    fn pull_slow(&mut self, _min: usize, _recommended: usize) -> bool {
        // The whole mapping is always visible; an unsatisfied pull is the end.
        false
    }

    fn supports_rewind(&self) -> bool {
        true
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn supports_size(&self) -> bool {
        true
    }

    fn supports_new_reader(&self) -> bool {
        true
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        debug_assert!(new_pos > self.limit_pos());
        self.cursor = self.map.len();
        false
    }

    fn size(&mut self) -> Option<Position> {
        Some(self.map.len() as Position)
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        let pos = clamp_to_usize(initial_pos);
        Some(Box::new(Self::shared(Arc::clone(&self.map), pos)))
    }

    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        if !self.ok() {
            return 0;
        }
        // Yields a block referencing the mapping instead of copying.
        let take = len.min(self.map.len() - self.cursor);
        if take > 0 {
            dst.append_block(Block::external(MappedRange {
                map: Arc::clone(&self.map),
                start: self.cursor,
                end: self.cursor + take,
            }));
            self.cursor += take;
        }
        take
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn temp_file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn maps_and_reads() {
        let file = temp_file_with(b"mapped contents");
        let mut reader = MmapReader::open(file.path()).unwrap();
        let mut out = Vec::new();
        assert_eq!(reader.read_to_vec(15, &mut out), 15);
        assert_eq!(out, b"mapped contents");
        assert!(reader.verify_end());
    }

    #[test]
    fn chain_read_references_the_mapping() {
        let file = temp_file_with(&vec![b'm'; 100_000]);
        let mut reader = MmapReader::open(file.path()).unwrap();
        let mut chain = Chain::new();
        assert_eq!(reader.read_to_chain(100_000, &mut chain), 100_000);
        // One external block, not a schedule of copied ones.
        assert_eq!(chain.block_count(), 1);
        assert_eq!(chain.len(), 100_000);
    }

    #[test]
    fn independent_readers_share_the_mapping() {
        let file = temp_file_with(b"0123456789");
        let reader = MmapReader::open(file.path()).unwrap();
        let mut sub = reader.new_reader(4).unwrap();
        let mut out = Vec::new();
        assert_eq!(sub.read_to_vec(3, &mut out), 3);
        assert_eq!(out, b"456");
    }
}

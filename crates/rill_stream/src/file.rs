// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rill_base::{Position, Status};

use crate::{BufferOptions, BufferedReader, BufferedWriter, FlushType, Sink, Source};

#[cfg(unix)]
fn read_at(file: &File, pos: u64, dst: &mut [u8]) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(dst, pos)
}

#[cfg(windows)]
fn read_at(file: &File, pos: u64, dst: &mut [u8]) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(dst, pos)
}

#[cfg(unix)]
fn write_at(file: &File, pos: u64, src: &[u8]) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(src, pos)
}

#[cfg(windows)]
fn write_at(file: &File, pos: u64, src: &[u8]) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(src, pos)
}

/// A [`Source`] over a file, reading at explicit offsets.
///
/// Positional reads leave the OS file cursor alone, so independent sources
/// over the same handle ([`new_source()`][Source::new_source]) are safe to
/// drive from separate threads.
#[derive(Debug)]
pub struct FileSource {
    file: Arc<File>,
    path: PathBuf,
    pos: Position,
}

impl FileSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|error| Status::io(&error).annotate(format!("opening {}", path.display())))?;
        tracing::debug!(path = %path.display(), "opened file source");
        Ok(Self {
            file: Arc::new(file),
            path: path.to_owned(),
            pos: 0,
        })
    }

    /// The path the source reads from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_failed(&self, error: &std::io::Error) -> Status {
        Status::io(error).annotate(format!("reading {}", self.path.display()))
    }
}

impl Source for FileSource {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
        let n = read_at(&self.file, self.pos, dst).map_err(|error| self.io_failed(&error))?;
        self.pos += n as Position;
        Ok(n)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        self.pos = pos;
        Ok(())
    }

    fn supports_size(&self) -> bool {
        true
    }

    fn size(&self) -> Result<Position, Status> {
        self.file
            .metadata()
            .map(|metadata| metadata.len())
            .map_err(|error| self.io_failed(&error))
    }

    fn supports_new_source(&self) -> bool {
        true
    }

    fn new_source(&self, pos: Position) -> Result<Box<dyn Source>, Status> {
        Ok(Box::new(Self {
            file: Arc::clone(&self.file),
            path: self.path.clone(),
            pos,
        }))
    }

    fn supports_read_at(&self) -> bool {
        true
    }

    fn read_at(&mut self, pos: Position, dst: &mut [u8]) -> Result<usize, Status> {
        read_at(&self.file, pos, dst).map_err(|error| self.io_failed(&error))
    }
}

/// A reader over a file: [`BufferedReader`] applied to [`FileSource`].
pub type FileReader = BufferedReader<FileSource>;

impl FileReader {
    /// Opens `path` for buffered reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Status> {
        Ok(Self::new(FileSource::open(path)?))
    }

    /// Opens `path` for buffered reading with explicit buffer sizing.
    pub fn open_with_options(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self, Status> {
        Ok(Self::with_options(FileSource::open(path)?, options))
    }
}

/// A [`Sink`] over a file, writing at explicit offsets.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    pos: Position,
}

impl FileSink {
    /// Creates or truncates `path` for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|error| Status::io(&error).annotate(format!("creating {}", path.display())))?;
        tracing::debug!(path = %path.display(), "created file sink");
        Ok(Self {
            file,
            path: path.to_owned(),
            pos: 0,
        })
    }

    /// The path the sink writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_failed(&self, error: &std::io::Error) -> Status {
        Status::io(error).annotate(format!("writing {}", self.path.display()))
    }
}

impl Sink for FileSink {
    fn write(&mut self, src: &[u8]) -> Result<usize, Status> {
        let n = write_at(&self.file, self.pos, src).map_err(|error| self.io_failed(&error))?;
        self.pos += n as Position;
        Ok(n)
    }

    fn flush(&mut self, flush_type: FlushType) -> Result<(), Status> {
        // Writes go straight to the OS; only durability needs a syscall.
        if flush_type == FlushType::FromMachine {
            self.file.sync_data().map_err(|error| self.io_failed(&error))?;
        }
        Ok(())
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        self.pos = pos;
        Ok(())
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn truncate(&mut self, len: Position) -> Result<(), Status> {
        self.file.set_len(len).map_err(|error| self.io_failed(&error))?;
        self.pos = self.pos.min(len);
        Ok(())
    }

    fn supports_size(&self) -> bool {
        true
    }

    fn size(&self) -> Result<Position, Status> {
        self.file
            .metadata()
            .map(|metadata| metadata.len())
            .map_err(|error| self.io_failed(&error))
    }
}

/// A writer over a file: [`BufferedWriter`] applied to [`FileSink`].
pub type FileWriter = BufferedWriter<FileSink>;

impl FileWriter {
    /// Creates or truncates `path` for buffered writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Status> {
        Ok(Self::new(FileSink::create(path)?))
    }

    /// Creates or truncates `path` for buffered writing with explicit buffer
    /// sizing.
    pub fn create_with_options(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self, Status> {
        Ok(Self::with_options(FileSink::create(path)?, options))
    }
}

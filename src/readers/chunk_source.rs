use crossbeam::channel::{bounded, Receiver, Sender};
use memchr::memrchr;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{ProcessingError, Result};
use crate::utils::constants::LINE_TERMINATOR;

/// A line-aligned slice of the input, backed by a pooled buffer.
///
/// The buffer goes back to its pool when the chunk is dropped, so a worker
/// that bails out early cannot leak pool capacity.
pub struct Chunk {
    buffer: Vec<u8>,
    len: usize,
    offset: u64,
    sequence: u64,
    pool: Sender<Vec<u8>>,
}

impl Chunk {
    /// Valid bytes; always ends with `\n` unless this is the tail of the file.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File offset of the first byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Position of this chunk in file order, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        // The source owns a receiver for as long as any chunk can exist
        let _ = self.pool.send(buffer);
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("sequence", &self.sequence)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// File cursor state; only touched under the source's mutex.
struct ReadState {
    file: File,
    carry: Vec<u8>,
    position: u64,
    sequence: u64,
    eof: bool,
}

impl ReadState {
    /// Fill `buffer` with the carry-over plus fresh file bytes and cut it at
    /// the last line terminator. Returns `(len, offset, sequence)` or `None`
    /// once the file is exhausted.
    fn fill(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, u64, u64)>> {
        if self.eof && self.carry.is_empty() {
            return Ok(None);
        }

        let capacity = buffer.len();
        let mut filled = self.carry.len();
        buffer[..filled].copy_from_slice(&self.carry);
        self.carry.clear();

        while filled < capacity && !self.eof {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let offset = self.position;
        let len = if self.eof {
            filled
        } else {
            match memrchr(LINE_TERMINATOR, &buffer[..filled]) {
                Some(pos) => pos + 1,
                None => {
                    return Err(ProcessingError::ChunkBoundary {
                        offset,
                        buffer_size: capacity,
                    })
                }
            }
        };

        if len == 0 {
            return Ok(None);
        }

        self.carry.extend_from_slice(&buffer[len..filled]);
        self.position += len as u64;

        let sequence = self.sequence;
        self.sequence += 1;
        Ok(Some((len, offset, sequence)))
    }
}

/// Hands out line-aligned chunks of one file to many workers from a fixed
/// pool of buffers.
///
/// `next_chunk` blocks while every buffer is out, which bounds memory to
/// `buffer_count * buffer_size` no matter how far readers get ahead of the
/// workers. File reads are serialized, so chunks are cut in file order.
pub struct ChunkSource {
    path: PathBuf,
    state: Mutex<ReadState>,
    free_tx: Sender<Vec<u8>>,
    free_rx: Receiver<Vec<u8>>,
    buffer_size: usize,
    buffer_count: usize,
    file_len: u64,
    aborted: AtomicBool,
    chunks_issued: AtomicU64,
    bytes_issued: AtomicU64,
}

impl ChunkSource {
    pub fn open(path: &Path, buffer_count: usize, buffer_size: usize) -> Result<Self> {
        if buffer_count == 0 || buffer_size == 0 {
            return Err(ProcessingError::Config(
                "chunk source needs at least one non-empty buffer".to_string(),
            ));
        }

        let open_error = |source| ProcessingError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_error)?;
        let metadata = file.metadata().map_err(open_error)?;
        if metadata.is_dir() {
            return Err(open_error(std::io::Error::new(
                ErrorKind::InvalidInput,
                "path is a directory",
            )));
        }

        let (free_tx, free_rx) = bounded(buffer_count);
        for _ in 0..buffer_count {
            free_tx
                .send(vec![0u8; buffer_size])
                .map_err(|_| ProcessingError::Config("buffer pool closed".to_string()))?;
        }

        debug!(
            "Opened {} ({} bytes) with {} x {} byte buffers",
            path.display(),
            metadata.len(),
            buffer_count,
            buffer_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(ReadState {
                file,
                carry: Vec::with_capacity(buffer_size),
                position: 0,
                sequence: 0,
                eof: false,
            }),
            free_tx,
            free_rx,
            buffer_size,
            buffer_count,
            file_len: metadata.len(),
            aborted: AtomicBool::new(false),
            chunks_issued: AtomicU64::new(0),
            bytes_issued: AtomicU64::new(0),
        })
    }

    /// Next unread chunk, or `None` once the file is exhausted or the source
    /// was aborted. Blocks until a buffer is free.
    pub fn next_chunk(&self) -> Result<Option<Chunk>> {
        if self.is_aborted() {
            return Ok(None);
        }

        let mut buffer = self
            .free_rx
            .recv()
            .map_err(|_| ProcessingError::Config("buffer pool closed".to_string()))?;

        if self.is_aborted() {
            self.recycle(buffer);
            return Ok(None);
        }

        let filled = match self.lock_state() {
            Ok(mut state) => state.fill(&mut buffer),
            Err(e) => Err(e),
        };

        match filled {
            Ok(Some((len, offset, sequence))) => {
                self.chunks_issued.fetch_add(1, Ordering::Relaxed);
                self.bytes_issued.fetch_add(len as u64, Ordering::Relaxed);
                Ok(Some(Chunk {
                    buffer,
                    len,
                    offset,
                    sequence,
                    pool: self.free_tx.clone(),
                }))
            }
            Ok(None) => {
                self.recycle(buffer);
                Ok(None)
            }
            Err(e) => {
                self.recycle(buffer);
                Err(e)
            }
        }
    }

    /// Give a chunk's buffer back to the pool, waking one blocked caller.
    pub fn return_chunk(&self, chunk: Chunk) {
        drop(chunk);
    }

    /// Make every later `next_chunk` report exhaustion.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            warn!("Aborting reads from {}", self.path.display());
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// Buffers currently sitting in the pool.
    pub fn free_buffers(&self) -> usize {
        self.free_rx.len()
    }

    pub fn chunks_issued(&self) -> u64 {
        self.chunks_issued.load(Ordering::Relaxed)
    }

    pub fn bytes_issued(&self) -> u64 {
        self.bytes_issued.load(Ordering::Relaxed)
    }

    fn recycle(&self, buffer: Vec<u8>) {
        let _ = self.free_tx.send(buffer);
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ReadState>> {
        self.state.lock().map_err(|_| {
            ProcessingError::Io(std::io::Error::new(
                ErrorKind::Other,
                "chunk source lock poisoned by a panicked worker",
            ))
        })
    }
}

impl std::fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSource")
            .field("path", &self.path)
            .field("file_len", &self.file_len)
            .field("buffer_count", &self.buffer_count)
            .field("buffer_size", &self.buffer_size)
            .field("chunks_issued", &self.chunks_issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_input(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn random_lines(seed: u64, lines: usize) -> Vec<u8> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut out = Vec::new();
        for _ in 0..lines {
            let name_len = rng.usize(1..=30);
            for _ in 0..name_len {
                out.push(rng.u8(b'a'..=b'z'));
            }
            out.extend_from_slice(format!(";{}.{}\n", rng.i32(-99..=99), rng.u8(0..=9)).as_bytes());
        }
        out
    }

    fn drain(source: &ChunkSource) -> Result<Vec<(u64, Vec<u8>)>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = source.next_chunk()? {
            chunks.push((chunk.offset(), chunk.data().to_vec()));
            source.return_chunk(chunk);
        }
        Ok(chunks)
    }

    #[test]
    fn test_chunks_cover_file_exactly_once() -> Result<()> {
        let content = random_lines(11, 500);
        let file = write_input(&content);

        for buffer_size in [64, 100, 257, 4096] {
            let source = ChunkSource::open(file.path(), 2, buffer_size)?;
            let chunks = drain(&source)?;

            let joined: Vec<u8> = chunks.iter().flat_map(|(_, data)| data.clone()).collect();
            assert_eq!(joined, content, "buffer size {buffer_size}");
            assert_eq!(source.bytes_issued(), content.len() as u64);
            assert_eq!(source.chunks_issued(), chunks.len() as u64);
        }
        Ok(())
    }

    #[test]
    fn test_chunks_end_on_line_boundaries() -> Result<()> {
        let content = random_lines(29, 300);
        let file = write_input(&content);
        let source = ChunkSource::open(file.path(), 3, 128)?;

        let mut expected_offset = 0u64;
        for (offset, data) in drain(&source)? {
            assert_eq!(offset, expected_offset);
            if offset > 0 {
                assert_eq!(content[offset as usize - 1], b'\n');
            }
            assert_eq!(data.last(), Some(&b'\n'));
            expected_offset += data.len() as u64;
        }
        assert_eq!(expected_offset, content.len() as u64);
        Ok(())
    }

    #[test]
    fn test_unterminated_final_line() -> Result<()> {
        let file = write_input(b"Oslo;1.0\nParis;2.0\nRome;3.0");
        let source = ChunkSource::open(file.path(), 1, 16)?;

        let chunks: Vec<Vec<u8>> = drain(&source)?.into_iter().map(|(_, d)| d).collect();
        assert_eq!(chunks.last().map(|c| c.as_slice()), Some(&b"Rome;3.0"[..]));
        assert_eq!(chunks.concat(), b"Oslo;1.0\nParis;2.0\nRome;3.0".to_vec());
        Ok(())
    }

    #[test]
    fn test_empty_file_is_exhausted() -> Result<()> {
        let file = write_input(b"");
        let source = ChunkSource::open(file.path(), 1, 64)?;
        assert!(source.next_chunk()?.is_none());
        assert!(source.next_chunk()?.is_none());
        assert_eq!(source.free_buffers(), 1);
        Ok(())
    }

    #[test]
    fn test_line_longer_than_buffer() -> Result<()> {
        let mut content = b"Oslo;1.0\n".to_vec();
        content.extend(std::iter::repeat(b'x').take(200));
        content.extend_from_slice(b";1.0\n");
        let file = write_input(&content);
        let source = ChunkSource::open(file.path(), 1, 64)?;

        let first = source.next_chunk()?.unwrap();
        assert_eq!(first.data(), b"Oslo;1.0\n");
        source.return_chunk(first);

        let err = source.next_chunk().unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::ChunkBoundary {
                offset: 9,
                buffer_size: 64
            }
        ));
        // the failed read's buffer went back to the pool
        assert_eq!(source.free_buffers(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = ChunkSource::open(Path::new("/definitely/not/here.txt"), 1, 64).unwrap_err();
        assert!(matches!(err, ProcessingError::Open { .. }));
    }

    #[test]
    fn test_blocks_until_buffer_returned() -> Result<()> {
        let content = random_lines(3, 100);
        let file = write_input(&content);
        let source = ChunkSource::open(file.path(), 1, 256)?;

        let held = source.next_chunk()?.unwrap();
        let got_second = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let chunk = source.next_chunk();
                got_second.store(true, Ordering::SeqCst);
                chunk.map(|c| c.map(|c| c.sequence()))
            });

            std::thread::sleep(Duration::from_millis(50));
            assert!(!got_second.load(Ordering::SeqCst));

            source.return_chunk(held);
            let sequence = waiter.join().unwrap().unwrap();
            assert_eq!(sequence, Some(1));
        });
        Ok(())
    }

    #[test]
    fn test_abort_stops_issuing() -> Result<()> {
        let content = random_lines(5, 100);
        let file = write_input(&content);
        let source = ChunkSource::open(file.path(), 2, 128)?;

        assert!(source.next_chunk()?.is_some());
        source.abort();
        assert!(source.is_aborted());
        assert!(source.next_chunk()?.is_none());
        Ok(())
    }
}

//! Lazy, chunked reader over a list of gzip-compressed edge-list files. A
//! background thread keeps the next chunk decompressed and ready while the
//! ingest thread consumes the current one — a single-slot double-buffer
//! handoff, just with one producer and one consumer.
//!
//! Parsing the decompressed text into `(dst, src)` pairs is the caller's
//! responsibility; `DiskMatrix`'s Stage A sharder is the only consumer in
//! this crate.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use flate2::read::GzDecoder;

use crate::error::{GraphError, IoResultExt};

enum Slot {
    /// Producer is working on the next chunk; consumer must wait.
    Empty,
    /// A chunk is ready for the consumer to take.
    Ready(Vec<u8>),
    /// All files are fully consumed; no more chunks will ever arrive.
    Done,
    /// The producer hit an unrecoverable error; no more chunks will arrive.
    Failed(GraphError),
}

struct Shared {
    slot: Mutex<Slot>,
    cv: Condvar,
}

/// Reads decompressed bytes across a list of gzip files, advancing from one
/// file to the next transparently on EOF.
pub struct EdgeSource {
    shared: Arc<Shared>,
    producer: Option<thread::JoinHandle<Result<(), GraphError>>>,
}

impl EdgeSource {
    /// Spawns the background decompression thread over `paths`, each read in
    /// chunks of `chunk_size` bytes.
    pub fn new(paths: Vec<PathBuf>, chunk_size: usize) -> Self {
        let shared = Arc::new(Shared { slot: Mutex::new(Slot::Empty), cv: Condvar::new() });
        let producer_shared = Arc::clone(&shared);
        let producer = thread::spawn(move || Self::produce(paths, chunk_size, producer_shared));
        EdgeSource { shared, producer: Some(producer) }
    }

    /// Runs until every file is consumed or an error occurs. Either outcome
    /// is published to `shared` so `read()` never waits on a slot the
    /// producer has stopped feeding; the `Result` this returns is only for
    /// `Drop`'s join, which discards it.
    fn produce(paths: Vec<PathBuf>, chunk_size: usize, shared: Arc<Shared>) -> Result<(), GraphError> {
        let mut files = paths.into_iter();
        let mut current: Option<GzDecoder<File>> = None;
        let mut buf = vec![0u8; chunk_size];

        loop {
            if current.is_none() {
                match files.next() {
                    Some(path) => match File::open(&path).with_path(&path) {
                        Ok(f) => current = Some(GzDecoder::new(f)),
                        Err(e) => {
                            Self::publish_failed(&shared, e);
                            return Ok(());
                        }
                    },
                    None => {
                        Self::publish(&shared, None);
                        return Ok(());
                    }
                }
            }

            let n = match current.as_mut().unwrap().read(&mut buf).map_err(GraphError::from) {
                Ok(n) => n,
                Err(e) => {
                    Self::publish_failed(&shared, e);
                    return Ok(());
                }
            };
            if n == 0 {
                current = None;
                continue;
            }

            Self::publish(&shared, Some(buf[..n].to_vec()));
        }
    }

    fn publish(shared: &Arc<Shared>, chunk: Option<Vec<u8>>) {
        let mut guard = shared.slot.lock().expect("edge source mutex poisoned");
        while !matches!(*guard, Slot::Empty) {
            guard = shared.cv.wait(guard).expect("edge source mutex poisoned");
        }
        *guard = match chunk {
            Some(data) => Slot::Ready(data),
            None => Slot::Done,
        };
        shared.cv.notify_all();
    }

    fn publish_failed(shared: &Arc<Shared>, err: GraphError) {
        let mut guard = shared.slot.lock().expect("edge source mutex poisoned");
        while !matches!(*guard, Slot::Empty) {
            guard = shared.cv.wait(guard).expect("edge source mutex poisoned");
        }
        *guard = Slot::Failed(err);
        shared.cv.notify_all();
    }

    /// Fills `buffer` with up to `chunk_size` bytes of decompressed text from
    /// the current file, transparently advancing to the next file on EOF.
    /// Returns `Ok(false)` once every file has been fully consumed, clearing
    /// `buffer`. Returns `Err` if the producer hit an I/O error instead of
    /// hanging on a slot that will never become `Ready`/`Done`.
    pub fn read(&mut self, buffer: &mut Vec<u8>) -> Result<bool, GraphError> {
        let mut guard = self.shared.slot.lock().expect("edge source mutex poisoned");
        loop {
            match &*guard {
                Slot::Ready(_) => break,
                Slot::Done => {
                    buffer.clear();
                    return Ok(false);
                }
                Slot::Failed(_) => {
                    buffer.clear();
                    let Slot::Failed(err) = std::mem::replace(&mut *guard, Slot::Done) else {
                        unreachable!()
                    };
                    return Err(err);
                }
                Slot::Empty => {
                    guard = self.shared.cv.wait(guard).expect("edge source mutex poisoned");
                }
            }
        }
        if let Slot::Ready(data) = std::mem::replace(&mut *guard, Slot::Empty) {
            buffer.clear();
            buffer.extend_from_slice(&data);
        }
        self.shared.cv.notify_all();
        Ok(true)
    }
}

impl Drop for EdgeSource {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_gz(path: &std::path::Path, text: &str) {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let f = File::create(path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn reads_across_multiple_files() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("a.gz");
        let p2 = dir.path().join("b.gz");
        write_gz(&p1, "1 0\n2 0\n");
        write_gz(&p2, "3 0\n4 0\n");

        let mut src = EdgeSource::new(vec![p1, p2], 4096);
        let mut collected = Vec::new();
        let mut buf = Vec::new();
        while src.read(&mut buf).unwrap() {
            collected.extend_from_slice(&buf);
        }
        let text = String::from_utf8(collected).unwrap();
        assert_eq!(text, "1 0\n2 0\n3 0\n4 0\n");
    }

    #[test]
    fn empty_file_list_returns_false_immediately() {
        let mut src = EdgeSource::new(Vec::new(), 4096);
        let mut buf = Vec::new();
        assert!(!src.read(&mut buf).unwrap());
        assert!(buf.is_empty());
    }

    #[test]
    fn missing_file_surfaces_error_instead_of_hanging() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does_not_exist.gz");

        let mut src = EdgeSource::new(vec![missing], 4096);
        let mut buf = Vec::new();
        match src.read(&mut buf) {
            Err(GraphError::Io { .. }) => {}
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}

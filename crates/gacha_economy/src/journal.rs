//! # Ownership Journal
//!
//! **Append-only, crash-safe ownership store**
//!
//! Every `insert_batch` appends one frame and syncs it before returning, so a
//! batch acknowledged to the orchestrator survives a crash. On open the
//! journal is replayed to rebuild the per-user index.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "GOWN"]
//! [4 bytes: version]
//!
//! Frame (one per batch):
//! [8 bytes: LSN]
//! [4 bytes: payload length]
//! [N bytes: payload]
//! [4 bytes: CRC32 of LSN + length + payload]
//!
//! Payload:
//! [4 bytes: record count]
//! per record:
//!   [16 bytes: ownership id]
//!   [2 bytes: user id length] [user id]
//!   [2 bytes: entry id length] [entry id]
//! ```
//!
//! All integers are little-endian. A frame cut short by the end of the file,
//! or a damaged final frame, is a torn write and is truncated. A damaged frame
//! with data after it is corruption: the journal refuses to open and the file
//! is left untouched.

use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ownership::{OwnershipIndex, OwnershipRecord, OwnershipStore, StoreStats};

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"GOWN";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

const HEADER_LEN: u64 = 8;

/// Frame overhead: LSN + length + CRC.
const FRAME_OVERHEAD: usize = 8 + 4 + 4;

/// File operations the writer needs.
trait JournalFile: Write + Seek {
    fn sync_data(&mut self) -> io::Result<()>;
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl JournalFile for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

struct Writer<F = File> {
    file: F,
    /// Offset just past the last complete frame.
    end: u64,
    next_lsn: u64,
    /// Set when a failed append could not be rolled back. The file may then
    /// hold a partial frame, and anything appended after it would be lost on
    /// replay.
    poisoned: bool,
}

impl<F: JournalFile> Writer<F> {
    fn new(file: F, end: u64, next_lsn: u64) -> Self {
        Self {
            file,
            end,
            next_lsn,
            poisoned: false,
        }
    }

    fn append(&mut self, frame: &[u8]) -> Result<(), StoreError> {
        if self.poisoned {
            return Err(StoreError::Unavailable(format!(
                "journal is poisoned after a failed rollback at offset {}",
                self.end
            )));
        }

        let written = self.file.write_all(frame);
        if let Err(e) = written.and_then(|()| self.file.sync_data()) {
            // Drop the partial frame so later appends stay readable.
            if let Err(rollback) = self.rollback() {
                tracing::error!(
                    "Journal rollback to offset {} failed, refusing further writes: {}",
                    self.end,
                    rollback
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }
        self.end += frame.len() as u64;
        self.next_lsn += 1;
        Ok(())
    }

    fn rollback(&mut self) -> io::Result<()> {
        self.file.set_len(self.end)?;
        self.file.seek(SeekFrom::Start(self.end))?;
        Ok(())
    }
}

/// Ownership store backed by an append-only journal file.
pub struct JournalOwnershipStore {
    path: PathBuf,
    writer: Mutex<Writer>,
    index: RwLock<OwnershipIndex>,
}

impl JournalOwnershipStore {
    /// Opens or creates a journal and replays it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened and
    /// [`StoreError::Corrupt`] if the header is not a journal header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(JOURNAL_MAGIC)?;
            file.write_all(&JOURNAL_VERSION.to_le_bytes())?;
            file.sync_all()?;
        }

        let mut index = OwnershipIndex::default();
        let (end, next_lsn) = Self::replay(&mut file, &mut index)?;

        let len = file.metadata()?.len();
        if len > end {
            tracing::warn!(
                "Journal {}: truncating {} bytes of torn tail",
                path.display(),
                len - end
            );
            file.set_len(end)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(end))?;

        let stats = index.stats();
        tracing::info!(
            "Journal {} replayed: {} batches, {} records",
            path.display(),
            stats.batches,
            stats.records
        );

        Ok(Self {
            path,
            writer: Mutex::new(Writer::new(file, end, next_lsn)),
            index: RwLock::new(index),
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert counters, including replayed batches.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.index.read().stats()
    }

    /// Reads frames until the end of the file or a torn final frame.
    ///
    /// Returns the offset after the last good frame and the next LSN. A
    /// damaged frame followed by more data is reported as
    /// [`StoreError::Corrupt`].
    fn replay(file: &mut File, index: &mut OwnershipIndex) -> Result<(u64, u64), StoreError> {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&*file);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| StoreError::Corrupt("journal header is truncated".to_string()))?;
        if &magic != JOURNAL_MAGIC {
            return Err(StoreError::Corrupt("invalid journal magic".to_string()));
        }

        let mut version = [0u8; 4];
        reader
            .read_exact(&mut version)
            .map_err(|_| StoreError::Corrupt("journal header is truncated".to_string()))?;
        let version = u32::from_le_bytes(version);
        if version != JOURNAL_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported journal version {version}"
            )));
        }

        let mut end = HEADER_LEN;
        let mut next_lsn = 0u64;
        while end < file_len {
            let (frame_len, damage) = match read_frame(&mut reader, file_len - end)? {
                Frame::Torn => break,
                Frame::Damaged { frame_len } => (frame_len, "fails its CRC"),
                Frame::Complete { lsn, payload } => {
                    let frame_len = (FRAME_OVERHEAD + payload.len()) as u64;
                    match decode_records(&payload) {
                        Some(records) => {
                            index.apply(&records);
                            end += frame_len;
                            next_lsn = lsn + 1;
                            continue;
                        }
                        None => (frame_len, "has a valid CRC but a bad payload"),
                    }
                }
            };

            let after = file_len - end - frame_len;
            if after == 0 {
                tracing::warn!("Journal frame at offset {} {}; treating it as torn", end, damage);
                break;
            }
            return Err(StoreError::Corrupt(format!(
                "frame at offset {end} {damage} and is followed by {after} bytes"
            )));
        }

        Ok((end, next_lsn))
    }
}

impl OwnershipStore for JournalOwnershipStore {
    fn insert_batch(&self, records: &[OwnershipRecord]) -> Result<(), StoreError> {
        let payload = encode_records(records)?;

        let mut writer = self.writer.lock();
        let lsn = writer.next_lsn;
        let frame = encode_frame(lsn, &payload)?;

        writer.append(&frame)?;
        // Index update happens under the writer lock to keep replay order.
        self.index.write().apply(records);
        drop(writer);

        tracing::debug!("Journal frame {} written ({} records)", lsn, records.len());
        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<OwnershipRecord>, StoreError> {
        Ok(self.index.read().list(user_id))
    }
}

impl std::fmt::Debug for JournalOwnershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalOwnershipStore")
            .field("path", &self.path)
            .field("stats", &self.stats())
            .finish()
    }
}

fn encode_frame(lsn: u64, payload: &[u8]) -> Result<Vec<u8>, StoreError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Io(format!("batch payload too large: {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    frame.extend_from_slice(&lsn.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

enum Frame {
    /// Checksum verified.
    Complete { lsn: u64, payload: Vec<u8> },
    /// Runs past the end of the file.
    Torn,
    /// Fits in the file but fails its checksum.
    Damaged { frame_len: u64 },
}

/// Reads one frame with `remaining` bytes left in the file.
fn read_frame<R: Read>(reader: &mut R, remaining: u64) -> Result<Frame, StoreError> {
    if remaining < FRAME_OVERHEAD as u64 {
        return Ok(Frame::Torn);
    }

    let mut head = [0u8; 12];
    reader.read_exact(&mut head)?;
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&head[0..8]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&head[8..12]);
    let len = u32::from_le_bytes(len);

    let frame_len = FRAME_OVERHEAD as u64 + u64::from(len);
    if frame_len > remaining {
        return Ok(Frame::Torn);
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    let mut crc = [0u8; 4];
    reader.read_exact(&mut crc)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&head);
    hasher.update(&payload);
    if hasher.finalize() != u32::from_le_bytes(crc) {
        return Ok(Frame::Damaged { frame_len });
    }

    Ok(Frame::Complete {
        lsn: u64::from_le_bytes(lsn),
        payload,
    })
}

fn encode_records(records: &[OwnershipRecord]) -> Result<Vec<u8>, StoreError> {
    let count = u32::try_from(records.len())
        .map_err(|_| StoreError::Io(format!("batch too large: {} records", records.len())))?;

    let mut buf = Vec::with_capacity(4 + records.len() * 64);
    buf.extend_from_slice(&count.to_le_bytes());
    for record in records {
        buf.extend_from_slice(record.ownership_id.as_bytes());
        put_str(&mut buf, &record.user_id)?;
        put_str(&mut buf, &record.entry_id)?;
    }
    Ok(buf)
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<(), StoreError> {
    let len = u16::try_from(s.len())
        .map_err(|_| StoreError::Io(format!("identifier too long: {} bytes", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn decode_records(data: &[u8]) -> Option<Vec<OwnershipRecord>> {
    let mut cursor = Cursor { data };
    let count = u32::from_le_bytes(cursor.take(4)?.try_into().ok()?);

    let mut records = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        let ownership_id = Uuid::from_slice(cursor.take(16)?).ok()?;
        let user_id = cursor.take_str()?;
        let entry_id = cursor.take_str()?;
        records.push(OwnershipRecord {
            ownership_id,
            user_id,
            entry_id,
        });
    }

    cursor.data.is_empty().then_some(records)
}

struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.data.len() < n {
            return None;
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Some(head)
    }

    fn take_str(&mut self) -> Option<String> {
        let len = u16::from_le_bytes(self.take(2)?.try_into().ok()?) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn batch(user: &str, entries: &[&str]) -> Vec<OwnershipRecord> {
        entries.iter().map(|e| OwnershipRecord::new(user, *e)).collect()
    }

    #[test]
    fn test_reopen_replays_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned.journal");

        let first = batch("alice", &["a", "b"]);
        let second = batch("bob", &["c"]);
        {
            let store = JournalOwnershipStore::open(&path).unwrap();
            store.insert_batch(&first).unwrap();
            store.insert_batch(&second).unwrap();
        }

        let store = JournalOwnershipStore::open(&path).unwrap();
        assert_eq!(store.list_by_user("alice").unwrap(), first);
        assert_eq!(store.list_by_user("bob").unwrap(), second);
        assert_eq!(store.stats(), StoreStats { batches: 2, records: 3 });
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned.journal");

        let kept = batch("alice", &["a"]);
        {
            let store = JournalOwnershipStore::open(&path).unwrap();
            store.insert_batch(&kept).unwrap();
            store.insert_batch(&batch("alice", &["b", "c"])).unwrap();
        }

        // Cut the second frame in half.
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 10).unwrap();
        drop(file);

        let store = JournalOwnershipStore::open(&path).unwrap();
        assert_eq!(store.list_by_user("alice").unwrap(), kept);

        // New frames land after the surviving one.
        let next = batch("alice", &["d"]);
        store.insert_batch(&next).unwrap();
        drop(store);

        let store = JournalOwnershipStore::open(&path).unwrap();
        let entries: Vec<_> = store
            .list_by_user("alice")
            .unwrap()
            .into_iter()
            .map(|r| r.entry_id)
            .collect();
        assert_eq!(entries, ["a", "d"]);
    }

    #[test]
    fn test_damaged_final_frame_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned.journal");
        {
            let store = JournalOwnershipStore::open(&path).unwrap();
            store.insert_batch(&batch("alice", &["a"])).unwrap();
        }

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let store = JournalOwnershipStore::open(&path).unwrap();
        assert!(store.list_by_user("alice").unwrap().is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), HEADER_LEN);
    }

    #[test]
    fn test_damaged_frame_before_intact_ones_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned.journal");
        {
            let store = JournalOwnershipStore::open(&path).unwrap();
            store.insert_batch(&batch("alice", &["a"])).unwrap();
            store.insert_batch(&batch("alice", &["b"])).unwrap();
            store.insert_batch(&batch("bob", &["c"])).unwrap();
        }

        // Flip a byte inside the first frame's payload.
        let mut bytes = fs::read(&path).unwrap();
        let len_before = bytes.len();
        let inside_first = HEADER_LEN as usize + 12 + 4;
        bytes[inside_first] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = JournalOwnershipStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        // The intact frames after it are still on disk.
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(bytes.len(), len_before);
    }

    /// In-memory file with switchable write and truncate failures.
    #[derive(Default)]
    struct FlakyFile {
        data: Vec<u8>,
        pos: usize,
        fail_writes: bool,
        fail_truncate: bool,
    }

    impl Write for FlakyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = if self.fail_writes { buf.len().min(3) } else { buf.len() };
            let end = self.pos + n;
            if self.data.len() < end {
                self.data.resize(end, 0);
            }
            self.data[self.pos..end].copy_from_slice(&buf[..n]);
            self.pos = end;
            if self.fail_writes {
                return Err(io::Error::other("disk full"));
            }
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FlakyFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            let SeekFrom::Start(to) = pos else {
                return Err(io::Error::other("only absolute seeks"));
            };
            self.pos = usize::try_from(to).unwrap();
            Ok(to)
        }
    }

    impl JournalFile for FlakyFile {
        fn sync_data(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn set_len(&mut self, len: u64) -> io::Result<()> {
            if self.fail_truncate {
                return Err(io::Error::other("read-only filesystem"));
            }
            self.data.resize(usize::try_from(len).unwrap(), 0);
            Ok(())
        }
    }

    fn frame(lsn: u64) -> Vec<u8> {
        encode_frame(lsn, &encode_records(&batch("alice", &["a"])).unwrap()).unwrap()
    }

    #[test]
    fn test_failed_append_is_rolled_back() {
        let mut writer = Writer::new(FlakyFile::default(), 0, 0);
        writer.file.fail_writes = true;
        assert!(writer.append(&frame(0)).is_err());
        assert!(writer.file.data.is_empty());

        writer.file.fail_writes = false;
        writer.append(&frame(0)).unwrap();
        assert_eq!(writer.file.data, frame(0));
        assert_eq!(writer.next_lsn, 1);
    }

    #[test]
    fn test_failed_rollback_poisons_writer() {
        let mut writer = Writer::new(FlakyFile::default(), 0, 0);
        writer.file.fail_writes = true;
        writer.file.fail_truncate = true;
        assert!(writer.append(&frame(0)).is_err());
        let garbage = writer.file.data.clone();
        assert!(!garbage.is_empty());

        // Even with the disk healthy again, nothing lands after the garbage.
        writer.file.fail_writes = false;
        writer.file.fail_truncate = false;
        assert!(matches!(
            writer.append(&frame(0)),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(writer.file.data, garbage);
        assert_eq!(writer.end, 0);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-journal");
        fs::write(&path, b"OWAL\x01\x00\x00\x00").unwrap();

        let err = JournalOwnershipStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_record_codec_rejects_trailing_bytes() {
        let records = batch("alice", &["a", "b"]);
        let mut payload = encode_records(&records).unwrap();
        assert_eq!(decode_records(&payload).unwrap(), records);

        payload.push(0);
        assert!(decode_records(&payload).is_none());
    }
}

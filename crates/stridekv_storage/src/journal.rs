//! Append-only journal for the persistent store.
//!
//! Every record uses the same envelope:
//!
//! ```text
//! | magic "SKVJ" (4) | type (1) | payload length (4, LE) | payload | crc32 (4, LE) |
//! ```
//!
//! The CRC covers everything before it. A record cut short at the end of
//! the file is a torn write from a crash and is discarded on open. A record
//! that is complete but fails its CRC is reported as corruption.

use crate::error::{StorageError, StorageResult};
use crate::types::{CollectionId, Version, WriteBatch};
use bytes::Bytes;
use fs2::FileExt;
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"SKVJ";

/// Journal file name inside the store directory.
pub const JOURNAL_FILE: &str = "journal.skv";

/// Lock file name inside the store directory.
pub const LOCK_FILE: &str = "LOCK";

const TMP_FILE: &str = "journal.skv.tmp";

/// magic (4) + type (1) + length (4)
const HEADER_SIZE: usize = 9;
const CRC_SIZE: usize = 4;

const TYPE_CREATE: u8 = 1;
const TYPE_DROP: u8 = 2;
const TYPE_COMMIT: u8 = 3;
const TYPE_WATERMARK: u8 = 4;

/// A journaled change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// A named collection was created.
    CreateCollection {
        /// Assigned id.
        id: CollectionId,
        /// Collection name.
        name: Cow<'a, str>,
    },
    /// A named collection was dropped.
    DropCollection {
        /// Dropped id.
        id: CollectionId,
    },
    /// A batch was committed under `version`.
    Commit {
        /// Commit version.
        version: Version,
        /// The applied mutations.
        batch: Cow<'a, WriteBatch>,
    },
    /// Counters that must survive even when the records that advanced them
    /// were compacted away.
    Watermark {
        /// Next collection id to assign.
        next_collection: u64,
        /// Store version.
        version: Version,
    },
}

impl Record<'_> {
    fn type_byte(&self) -> u8 {
        match self {
            Self::CreateCollection { .. } => TYPE_CREATE,
            Self::DropCollection { .. } => TYPE_DROP,
            Self::Commit { .. } => TYPE_COMMIT,
            Self::Watermark { .. } => TYPE_WATERMARK,
        }
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) -> StorageResult<()> {
        match self {
            Self::CreateCollection { id, name } => {
                buf.extend_from_slice(&id.as_u64().to_le_bytes());
                let len = u16::try_from(name.len())
                    .map_err(|_| StorageError::limit_exceeded("collection name too long"))?;
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(name.as_bytes());
            }
            Self::DropCollection { id } => {
                buf.extend_from_slice(&id.as_u64().to_le_bytes());
            }
            Self::Commit { version, batch } => {
                buf.extend_from_slice(&version.as_u64().to_le_bytes());
                let count = u32::try_from(batch.len())
                    .map_err(|_| StorageError::limit_exceeded("too many mutations in one commit"))?;
                buf.extend_from_slice(&count.to_le_bytes());
                for m in batch.iter() {
                    buf.extend_from_slice(&m.collection.as_u64().to_le_bytes());
                    buf.extend_from_slice(&m.key.to_le_bytes());
                    match &m.value {
                        Some(value) => {
                            let len = u32::try_from(value.len()).map_err(|_| {
                                StorageError::limit_exceeded(format!(
                                    "value of {} bytes exceeds the journal limit",
                                    value.len()
                                ))
                            })?;
                            buf.push(1);
                            buf.extend_from_slice(&len.to_le_bytes());
                            buf.extend_from_slice(value);
                        }
                        None => buf.push(0),
                    }
                }
            }
            Self::Watermark {
                next_collection,
                version,
            } => {
                buf.extend_from_slice(&next_collection.to_le_bytes());
                buf.extend_from_slice(&version.as_u64().to_le_bytes());
            }
        }
        Ok(())
    }

    /// Encodes the record with its envelope.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` if a field does not fit the format.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut payload = Vec::new();
        self.encode_payload(&mut payload)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StorageError::limit_exceeded("journal record too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.push(self.type_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Converts into a record that owns its data.
    #[must_use]
    pub fn into_owned(self) -> Record<'static> {
        match self {
            Self::CreateCollection { id, name } => Record::CreateCollection {
                id,
                name: Cow::Owned(name.into_owned()),
            },
            Self::DropCollection { id } => Record::DropCollection { id },
            Self::Commit { version, batch } => Record::Commit {
                version,
                batch: Cow::Owned(batch.into_owned()),
            },
            Self::Watermark {
                next_collection,
                version,
            } => Record::Watermark {
                next_collection,
                version,
            },
        }
    }
}

/// Little-endian reader over a payload slice of a shared buffer.
struct Cursor<'b> {
    buf: &'b Bytes,
    pos: usize,
    end: usize,
    offset: u64,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> StorageResult<std::ops::Range<usize>> {
        if self.end - self.pos < n {
            return Err(StorageError::corrupted(self.offset, "payload ends early"));
        }
        let range = self.pos..self.pos + n;
        self.pos += n;
        Ok(range)
    }

    fn u8(&mut self) -> StorageResult<u8> {
        let r = self.take(1)?;
        Ok(self.buf[r.start])
    }

    fn u16(&mut self) -> StorageResult<u16> {
        let r = self.take(2)?;
        Ok(u16::from_le_bytes([self.buf[r.start], self.buf[r.start + 1]]))
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let r = self.take(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[r]);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> StorageResult<u64> {
        let r = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[r]);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self, n: usize) -> StorageResult<Bytes> {
        let r = self.take(n)?;
        Ok(self.buf.slice(r))
    }

    fn finish(&self) -> StorageResult<()> {
        if self.pos != self.end {
            return Err(StorageError::corrupted(self.offset, "trailing payload bytes"));
        }
        Ok(())
    }
}

fn decode_payload(kind: u8, cursor: &mut Cursor<'_>) -> StorageResult<Record<'static>> {
    let record = match kind {
        TYPE_CREATE => {
            let id = CollectionId::new(cursor.u64()?);
            let len = usize::from(cursor.u16()?);
            let raw = cursor.bytes(len)?;
            let name = std::str::from_utf8(&raw)
                .map_err(|_| StorageError::corrupted(cursor.offset, "collection name is not UTF-8"))?
                .to_owned();
            Record::CreateCollection {
                id,
                name: Cow::Owned(name),
            }
        }
        TYPE_DROP => Record::DropCollection {
            id: CollectionId::new(cursor.u64()?),
        },
        TYPE_COMMIT => {
            let version = Version::new(cursor.u64()?);
            let count = cursor.u32()? as usize;
            let mut batch = WriteBatch::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                let collection = CollectionId::new(cursor.u64()?);
                let key = cursor.u64()? as i64;
                let value = match cursor.u8()? {
                    0 => None,
                    1 => {
                        let len = cursor.u32()? as usize;
                        Some(cursor.bytes(len)?)
                    }
                    other => {
                        return Err(StorageError::corrupted(
                            cursor.offset,
                            format!("invalid value flag {other}"),
                        ))
                    }
                };
                batch.push(collection, key, value);
            }
            Record::Commit {
                version,
                batch: Cow::Owned(batch),
            }
        }
        TYPE_WATERMARK => Record::Watermark {
            next_collection: cursor.u64()?,
            version: Version::new(cursor.u64()?),
        },
        other => {
            return Err(StorageError::corrupted(
                cursor.offset,
                format!("unknown record type {other}"),
            ))
        }
    };
    cursor.finish()?;
    Ok(record)
}

/// Records decoded from a journal image.
#[derive(Debug, Default)]
pub struct Replay {
    /// Complete records in file order.
    pub records: Vec<Record<'static>>,
    /// Length of the valid prefix.
    pub valid_len: u64,
    /// True if an incomplete record followed the valid prefix.
    pub torn_tail: bool,
}

/// Decodes every complete record of a journal image.
///
/// # Errors
///
/// Returns `Corrupted` for a bad magic, a CRC mismatch or a malformed
/// payload. An incomplete final record is not an error.
pub fn decode_all(data: Bytes) -> StorageResult<Replay> {
    let mut replay = Replay::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = pos as u64;
        let remaining = data.len() - pos;
        if remaining < HEADER_SIZE {
            replay.torn_tail = true;
            break;
        }
        if data[pos..pos + 4] != JOURNAL_MAGIC {
            return Err(StorageError::corrupted(offset, "bad record magic"));
        }
        let kind = data[pos + 4];
        let mut raw_len = [0u8; 4];
        raw_len.copy_from_slice(&data[pos + 5..pos + HEADER_SIZE]);
        let len = u32::from_le_bytes(raw_len) as usize;

        let total = HEADER_SIZE + len + CRC_SIZE;
        if remaining < total {
            replay.torn_tail = true;
            break;
        }
        let crc_at = pos + HEADER_SIZE + len;
        let mut raw_crc = [0u8; 4];
        raw_crc.copy_from_slice(&data[crc_at..crc_at + CRC_SIZE]);
        if crc32fast::hash(&data[pos..crc_at]) != u32::from_le_bytes(raw_crc) {
            return Err(StorageError::corrupted(offset, "checksum mismatch"));
        }

        let mut cursor = Cursor {
            buf: &data,
            pos: pos + HEADER_SIZE,
            end: crc_at,
            offset,
        };
        replay.records.push(decode_payload(kind, &mut cursor)?);
        pos += total;
    }

    replay.valid_len = pos as u64;
    Ok(replay)
}

/// An open journal holding the directory lock.
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    file: File,
    size: u64,
    _lock: File,
}

impl Journal {
    /// Opens the journal in `dir`, replaying its records.
    ///
    /// A torn tail is truncated away so later appends start on a record
    /// boundary.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another handle owns the directory, `Io` if the
    /// directory is missing and `create_if_missing` is false, and
    /// `Corrupted` if the journal fails validation.
    pub fn open(dir: &Path, create_if_missing: bool) -> StorageResult<(Self, Vec<Record<'static>>)> {
        if !dir.exists() {
            if create_if_missing {
                fs::create_dir_all(dir)?;
            } else {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", dir.display()),
                )));
            }
        }
        if !dir.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", dir.display()),
            )));
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        // A leftover temporary file is an interrupted compaction; the
        // journal itself is still authoritative.
        let tmp = dir.join(TMP_FILE);
        if tmp.exists() {
            tracing::warn!(path = %tmp.display(), "removing stale compaction file");
            fs::remove_file(&tmp)?;
        }

        let path = dir.join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut image = Vec::new();
        file.read_to_end(&mut image)?;
        let file_len = image.len() as u64;
        let replay = decode_all(Bytes::from(image))?;

        if replay.torn_tail {
            tracing::warn!(
                valid = replay.valid_len,
                discarded = file_len - replay.valid_len,
                "discarding torn journal tail"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        tracing::debug!(
            path = %path.display(),
            records = replay.records.len(),
            bytes = replay.valid_len,
            "journal opened"
        );

        Ok((
            Self {
                dir: dir.to_path_buf(),
                file,
                size: replay.valid_len,
                _lock: lock,
            },
            replay.records,
        ))
    }

    /// Directory holding the journal.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes currently in the journal.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends one record, forcing it to disk when `sync` is set.
    ///
    /// Returns the offset of the record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    pub fn append(&mut self, record: &Record<'_>, sync: bool) -> StorageResult<u64> {
        let data = record.encode()?;
        let offset = self.size;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&data)?;
        if sync {
            self.file.sync_data()?;
        }
        self.size += data.len() as u64;
        Ok(offset)
    }

    /// Forces appended records to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Atomically replaces the journal with `records`.
    ///
    /// Records are written to a temporary file which is synced and renamed
    /// over the journal. If anything fails before the rename the old
    /// journal is untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    pub fn rewrite(&mut self, records: &[Record<'_>]) -> StorageResult<u64> {
        let tmp_path = self.dir.join(TMP_FILE);
        let path = self.dir.join(JOURNAL_FILE);

        let mut size = 0u64;
        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            for record in records {
                let data = record.encode()?;
                tmp.write_all(&data)?;
                size += data.len() as u64;
            }
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        #[cfg(unix)]
        File::open(&self.dir)?.sync_all()?;

        self.file = OpenOptions::new().read(true).write(true).open(&path)?;
        self.size = size;
        Ok(size)
    }
}

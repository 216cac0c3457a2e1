//! Append-only journal of schema changes and committed transactions.
//!
//! Each entry is framed as:
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (n) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers header and payload. The
//! payload is a CBOR-encoded [`Value`].
//!
//! On replay, an incomplete final entry is treated as a torn write and cut
//! off; a bad magic, version or checksum anywhere is corruption.

use crate::data::DatabaseState;
use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use crate::schema::{IndexSchema, StoreSchema};
use brickstore_codec::{from_cbor, to_cbor, Value};
use brickstore_storage::StorageBackend;
use tracing::{debug, warn};

/// Journal entry magic bytes.
const MAGIC: [u8; 4] = *b"BSJL";

/// Current journal format version.
const VERSION: u16 = 1;

/// Header size: magic + version + type + length.
const HEADER_SIZE: usize = 4 + 2 + 1 + 4;

/// Trailing checksum size.
const CRC_SIZE: usize = 4;

/// Entry type tags.
const TYPE_SCHEMA: u8 = 1;
const TYPE_COMMIT: u8 = 2;

/// One change inside a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    /// A record was written.
    Put {
        /// Record key.
        key: Key,
        /// New record value.
        value: Value,
    },
    /// A record was removed.
    Delete {
        /// Record key.
        key: Key,
    },
    /// Every record was removed.
    Clear,
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JournalEntry {
    /// The schema after a version change.
    Schema {
        /// New database version.
        version: u32,
        /// Every store definition.
        stores: Vec<StoreSchema>,
    },
    /// The writes of one committed transaction.
    Commit {
        /// Store the transaction wrote to.
        store: String,
        /// Key generator after the transaction.
        generator: i64,
        /// Writes in order.
        mutations: Vec<Mutation>,
    },
}

impl JournalEntry {
    fn type_tag(&self) -> u8 {
        match self {
            Self::Schema { .. } => TYPE_SCHEMA,
            Self::Commit { .. } => TYPE_COMMIT,
        }
    }

    /// Encodes the entry with framing and checksum.
    pub(crate) fn encode(&self) -> EngineResult<Vec<u8>> {
        let payload = to_cbor(&self.to_value())?;
        let length = u32::try_from(payload.len())
            .map_err(|_| EngineError::data("journal entry exceeds 4 GiB"))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.push(self.type_tag());
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(&payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Schema { version, stores } => Value::record([
                ("version", Value::from(*version)),
                (
                    "stores",
                    Value::Array(stores.iter().map(store_to_value).collect()),
                ),
            ]),
            Self::Commit {
                store,
                generator,
                mutations,
            } => Value::record([
                ("store", Value::from(store.as_str())),
                ("generator", Value::from(*generator)),
                (
                    "mutations",
                    Value::Array(mutations.iter().map(mutation_to_value).collect()),
                ),
            ]),
        }
    }

    fn from_value(tag: u8, value: &Value) -> EngineResult<Self> {
        match tag {
            TYPE_SCHEMA => {
                let version = u32::try_from(integer(value, "version")?)
                    .map_err(|_| EngineError::corrupted("schema version out of range"))?;
                let stores = array(value, "stores")?
                    .iter()
                    .map(store_from_value)
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(Self::Schema { version, stores })
            }
            TYPE_COMMIT => Ok(Self::Commit {
                store: text(value, "store")?.to_string(),
                generator: integer(value, "generator")?,
                mutations: array(value, "mutations")?
                    .iter()
                    .map(mutation_from_value)
                    .collect::<EngineResult<Vec<_>>>()?,
            }),
            other => Err(EngineError::corrupted(format!(
                "unknown journal entry type {other}"
            ))),
        }
    }

    /// Applies the entry to `state` during replay.
    pub(crate) fn apply(self, state: &mut DatabaseState) -> EngineResult<()> {
        match self {
            Self::Schema { version, stores } => state.apply_schema(version, stores),
            Self::Commit {
                store,
                generator,
                mutations,
            } => {
                let data = state
                    .store_mut(&store)
                    .map_err(|_| EngineError::corrupted(format!("commit to unknown store '{store}'")))?;
                for mutation in mutations {
                    match mutation {
                        Mutation::Put { key, value } => {
                            data.put(value, Some(key), false).map_err(|e| {
                                EngineError::corrupted(format!("replayed put failed: {e}"))
                            })?;
                        }
                        Mutation::Delete { key } => {
                            data.remove(&key);
                        }
                        Mutation::Clear => {
                            data.clear();
                        }
                    }
                }
                data.set_generator(generator);
                Ok(())
            }
        }
    }
}

/// The journal of one database.
pub(crate) struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl Journal {
    /// Opens a journal and replays it into a fresh state.
    ///
    /// A torn final entry is truncated away so later appends start on a
    /// clean boundary.
    pub(crate) fn open(
        mut backend: Box<dyn StorageBackend>,
        sync_on_commit: bool,
    ) -> EngineResult<(Self, DatabaseState)> {
        let bytes = backend.read_all()?;
        let (entries, valid_len) = decode_entries(&bytes)?;

        if valid_len < bytes.len() {
            warn!(
                valid = valid_len,
                total = bytes.len(),
                "truncating torn journal tail"
            );
            backend.truncate(valid_len as u64)?;
        }

        let mut state = DatabaseState::default();
        let count = entries.len();
        for entry in entries {
            entry.apply(&mut state)?;
        }
        debug!(entries = count, version = state.version, "journal replayed");

        Ok((
            Self {
                backend,
                sync_on_commit,
            },
            state,
        ))
    }

    /// Appends an entry, syncing if configured.
    pub(crate) fn append(&mut self, entry: &JournalEntry) -> EngineResult<()> {
        let bytes = entry.encode()?;
        self.backend.append(&bytes)?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }
}

/// Decodes every complete entry. Returns the entries and the length of
/// the valid prefix.
fn decode_entries(bytes: &[u8]) -> EngineResult<(Vec<JournalEntry>, usize)> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < HEADER_SIZE {
            break;
        }

        if rest[0..4] != MAGIC {
            return Err(EngineError::corrupted(format!(
                "invalid magic at offset {offset}"
            )));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > VERSION {
            return Err(EngineError::corrupted(format!(
                "unsupported version {version} at offset {offset}"
            )));
        }

        let tag = rest[6];
        let payload_len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total_len {
            break;
        }

        let payload_end = HEADER_SIZE + payload_len;
        let stored_crc = u32::from_le_bytes([
            rest[payload_end],
            rest[payload_end + 1],
            rest[payload_end + 2],
            rest[payload_end + 3],
        ]);
        let computed_crc = compute_crc32(&rest[..payload_end]);
        if stored_crc != computed_crc {
            return Err(EngineError::corrupted(format!(
                "checksum mismatch at offset {offset}: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
            )));
        }

        let value = from_cbor(&rest[HEADER_SIZE..payload_end])
            .map_err(|e| EngineError::corrupted(format!("entry at offset {offset}: {e}")))?;
        entries.push(JournalEntry::from_value(tag, &value)?);
        offset += total_len;
    }

    Ok((entries, offset))
}

fn store_to_value(store: &StoreSchema) -> Value {
    let indexes = store
        .indexes
        .values()
        .map(|index| {
            Value::record([
                ("name", Value::from(index.name.as_str())),
                ("key_path", Value::from(index.key_path.as_str())),
                ("unique", Value::from(index.unique)),
            ])
        })
        .collect::<Vec<_>>();
    Value::record([
        ("name", Value::from(store.name.as_str())),
        ("auto_increment", Value::from(store.auto_increment)),
        ("indexes", Value::Array(indexes)),
    ])
}

fn store_from_value(value: &Value) -> EngineResult<StoreSchema> {
    let mut store = StoreSchema::new(text(value, "name")?, boolean(value, "auto_increment")?);
    for index in array(value, "indexes")? {
        let index = IndexSchema::new(
            text(index, "name")?,
            text(index, "key_path")?,
            boolean(index, "unique")?,
        );
        store.indexes.insert(index.name.clone(), index);
    }
    Ok(store)
}

fn mutation_to_value(mutation: &Mutation) -> Value {
    match mutation {
        Mutation::Put { key, value } => {
            Value::Array(vec![Value::from("put"), key.to_value(), value.clone()])
        }
        Mutation::Delete { key } => Value::Array(vec![Value::from("delete"), key.to_value()]),
        Mutation::Clear => Value::Array(vec![Value::from("clear")]),
    }
}

fn mutation_from_value(value: &Value) -> EngineResult<Mutation> {
    let parts = value
        .as_array()
        .ok_or_else(|| EngineError::corrupted("mutation is not an array"))?;
    let key = |index: usize| -> EngineResult<Key> {
        parts
            .get(index)
            .and_then(Key::from_value)
            .ok_or_else(|| EngineError::corrupted("mutation has an invalid key"))
    };
    match parts.first().and_then(Value::as_text) {
        Some("put") => Ok(Mutation::Put {
            key: key(1)?,
            value: parts
                .get(2)
                .cloned()
                .ok_or_else(|| EngineError::corrupted("put mutation has no value"))?,
        }),
        Some("delete") => Ok(Mutation::Delete { key: key(1)? }),
        Some("clear") => Ok(Mutation::Clear),
        _ => Err(EngineError::corrupted("unknown mutation kind")),
    }
}

fn field<'a>(value: &'a Value, name: &str) -> EngineResult<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| EngineError::corrupted(format!("missing field '{name}'")))
}

fn text<'a>(value: &'a Value, name: &str) -> EngineResult<&'a str> {
    field(value, name)?
        .as_text()
        .ok_or_else(|| EngineError::corrupted(format!("field '{name}' is not text")))
}

fn integer(value: &Value, name: &str) -> EngineResult<i64> {
    field(value, name)?
        .as_integer()
        .ok_or_else(|| EngineError::corrupted(format!("field '{name}' is not an integer")))
}

fn boolean(value: &Value, name: &str) -> EngineResult<bool> {
    field(value, name)?
        .as_bool()
        .ok_or_else(|| EngineError::corrupted(format!("field '{name}' is not a boolean")))
}

fn array<'a>(value: &'a Value, name: &str) -> EngineResult<&'a [Value]> {
    field(value, name)?
        .as_array()
        .ok_or_else(|| EngineError::corrupted(format!("field '{name}' is not an array")))
}

/// Computes CRC32 checksum for data.
fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

//! Persistent storage for request history.
//!
//! Entries are kept as JSON Lines, one entry per line, in id order. Appends are
//! written, flushed and `sync_data`ed before they return. Removal, and eviction
//! past the retention cap once enough dead lines have piled up, rewrite the file
//! through a temporary file and an atomic rename.
//!
//! A rewritten or cleared file starts with an id mark, `{"next_id":N}`, so ids
//! of deleted entries are not handed out again after a restart.
//!
//! Readers never take the writer lock: they clone an `Arc` of the current
//! snapshot, which is replaced (never mutated) after each change.

use super::models::{HistoryEntry, HistoryError, PendingEntry};
use super::search::{matches_query, HistoryFilter};
use crate::config::get_config;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

type Snapshot = Arc<Vec<Arc<HistoryEntry>>>;

/// Lowest id the next entry may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdMark {
    next_id: u64,
}

impl IdMark {
    fn line(next_id: u64) -> Result<String, HistoryError> {
        let mut line = serde_json::to_string(&IdMark { next_id })?;
        line.push('\n');
        Ok(line)
    }
}

/// Configuration for history storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of entries to keep. Oldest entries are evicted first.
    pub max_entries: usize,

    /// Whether to mask credentials in the stored request.
    pub redact_sensitive_headers: bool,

    /// Number of dead lines (evicted or unreadable) tolerated in the file
    /// before it is rewritten.
    pub compaction_threshold: usize,
}

impl HistoryConfig {
    /// Creates a HistoryConfig from the global configuration.
    pub fn from_global_config() -> Self {
        let global_config = get_config();
        Self {
            max_entries: global_config.history_limit,
            redact_sensitive_headers: global_config.redact_sensitive_headers,
            compaction_threshold: (global_config.history_limit / 2).max(1),
        }
    }
}

impl Default for HistoryConfig {
    /// Reads `historyLimit` and `redactSensitiveHeaders` from the global configuration.
    fn default() -> Self {
        Self::from_global_config()
    }
}

/// State only touched while holding the writer lock.
struct Writer {
    file: Option<File>,
    next_id: u64,
    /// Lines in the file that no longer hold a live entry.
    dead_lines: usize,
    /// The last line in the file may be incomplete.
    dirty: bool,
}

/// Durable, searchable log of completed executions.
pub struct HistoryStore {
    path: Option<PathBuf>,
    config: HistoryConfig,
    writer: Mutex<Writer>,
    snapshot: RwLock<Snapshot>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl HistoryStore {
    /// Opens (or creates) the history file at `path` and loads its entries.
    ///
    /// Lines that cannot be parsed are skipped with a warning. Missing parent
    /// directories are created.
    ///
    /// # Arguments
    /// * `path` - History file, created if it does not exist
    /// * `config` - Retention cap, redaction and compaction settings
    ///
    /// # Returns
    /// The loaded store, or an I/O error if the file cannot be read or opened
    /// for appending.
    pub async fn open(
        path: impl Into<PathBuf>,
        config: HistoryConfig,
    ) -> Result<Self, HistoryError> {
        let path = path.into();
        if let Some(parent) = non_empty_parent(&path) {
            fs::create_dir_all(parent).await?;
        }

        let loaded = load_entries(&path).await?;
        let mut entries = loaded.entries;
        let mut dead_lines = loaded.dead_lines;

        if entries.len() > config.max_entries {
            let excess = entries.len() - config.max_entries;
            entries.drain(..excess);
            dead_lines += excess;
        }

        info!(
            "loaded {} history entries from {}",
            entries.len(),
            path.display()
        );

        let file = open_append(&path).await?;
        if !loaded.existed {
            sync_parent_dir(&path).await;
        }

        let next_id = entries
            .last()
            .map_or(1, |e| e.id + 1)
            .max(loaded.next_id);
        let store = Self {
            writer: Mutex::new(Writer {
                file: Some(file),
                next_id,
                dead_lines,
                dirty: loaded.dirty,
            }),
            snapshot: RwLock::new(Arc::new(entries)),
            path: Some(path),
            config,
        };

        if dead_lines >= store.config.compaction_threshold {
            let mut writer = store.writer.lock().await;
            let entries = store.snapshot();
            if let Err(e) = store.compact(&mut writer, &entries).await {
                warn!("failed to compact history file: {}", e);
            }
        }

        Ok(store)
    }

    /// Opens the history file named by the global configuration.
    pub async fn open_default() -> Result<Self, HistoryError> {
        let path = get_config()
            .history_path()
            .ok_or(HistoryError::NoHistoryPath)?;
        Self::open(path, HistoryConfig::from_global_config()).await
    }

    /// Creates a store that keeps entries in memory only.
    pub fn in_memory(config: HistoryConfig) -> Self {
        Self {
            path: None,
            config,
            writer: Mutex::new(Writer {
                file: None,
                next_id: 1,
                dead_lines: 0,
                dirty: false,
            }),
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Location of the backing file, `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Settings the store was opened with.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Appends an entry, assigning its id and timestamp.
    ///
    /// Returns once the entry is durable. On a persistence error the entry is
    /// not added, but its id is still consumed so ids never repeat.
    pub async fn append(&self, pending: PendingEntry) -> Result<Arc<HistoryEntry>, HistoryError> {
        let mut writer = self.writer.lock().await;

        let id = writer.next_id;
        writer.next_id += 1;
        let entry = Arc::new(pending.into_entry(
            id,
            Utc::now(),
            self.config.redact_sensitive_headers,
        ));

        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(entry.as_ref())?;
            line.push('\n');
            if writer.dirty {
                // terminate a partially written line so it is skipped on load
                line.insert(0, '\n');
            }

            if let Err(e) = write_line(&mut writer, path, &line).await {
                writer.dirty = true;
                warn!("failed to persist history entry #{}: {}", id, e);
                return Err(e.into());
            }
            writer.dirty = false;
        }

        let mut entries = Vec::clone(&self.snapshot());
        entries.push(Arc::clone(&entry));

        if entries.len() > self.config.max_entries {
            let excess = entries.len() - self.config.max_entries;
            entries.drain(..excess);
            writer.dead_lines += excess;
            debug!("evicted {} history entries", excess);
        }

        if self.path.is_some() && writer.dead_lines >= self.config.compaction_threshold {
            if let Err(e) = self.compact(&mut writer, &entries).await {
                warn!("failed to compact history file: {}", e);
            }
        }

        self.publish(entries);
        debug!("appended history entry #{}", id);
        Ok(entry)
    }

    /// Entries matching `filter`, newest first.
    pub fn list(&self, filter: &HistoryFilter) -> Vec<Arc<HistoryEntry>> {
        self.snapshot()
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Entries whose URL, header values or response text contain `query`,
    /// ignoring case. Newest first.
    pub fn search(&self, query: &str) -> Vec<Arc<HistoryEntry>> {
        let query_lower = query.to_lowercase();
        self.snapshot()
            .iter()
            .rev()
            .filter(|entry| matches_query(entry, &query_lower))
            .cloned()
            .collect()
    }

    /// Looks up one entry.
    ///
    /// # Arguments
    /// * `id` - Id assigned by [`HistoryStore::append`]
    ///
    /// # Returns
    /// The entry, or `None` if it never existed, was removed or was evicted.
    pub fn get(&self, id: u64) -> Option<Arc<HistoryEntry>> {
        let snapshot = self.snapshot();
        snapshot
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| Arc::clone(&snapshot[i]))
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Deletes one entry and rewrites the file.
    ///
    /// Returns `false` if no entry has that id.
    pub async fn remove(&self, id: u64) -> Result<bool, HistoryError> {
        let mut writer = self.writer.lock().await;

        let mut entries = Vec::clone(&self.snapshot());
        let Ok(index) = entries.binary_search_by_key(&id, |e| e.id) else {
            return Ok(false);
        };
        entries.remove(index);

        if self.path.is_some() {
            self.compact(&mut writer, &entries).await?;
        }

        self.publish(entries);
        debug!("removed history entry #{}", id);
        Ok(true)
    }

    /// Deletes every entry. Ids keep increasing, across restarts too.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        let mut writer = self.writer.lock().await;

        if let Some(path) = &self.path {
            let mark = IdMark::line(writer.next_id)?;
            writer.file = None;
            let mut file = File::create(path).await?;
            file.write_all(mark.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            writer.file = Some(open_append(path).await?);
            writer.dead_lines = 0;
            writer.dirty = false;
        }

        self.publish(Vec::new());
        info!("history cleared");
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let guard = match self.snapshot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&guard)
    }

    fn publish(&self, entries: Vec<Arc<HistoryEntry>>) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(entries);
    }

    /// Rewrites the file to hold exactly `entries`.
    async fn compact(
        &self,
        writer: &mut Writer,
        entries: &[Arc<HistoryEntry>],
    ) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut contents = IdMark::line(writer.next_id)?;
        for entry in entries {
            contents.push_str(&serde_json::to_string(entry.as_ref())?);
            contents.push('\n');
        }

        let tmp_path = temp_path(path);
        let mut tmp = File::create(&tmp_path).await?;
        tmp.write_all(contents.as_bytes()).await?;
        tmp.flush().await?;
        tmp.sync_all().await?;
        drop(tmp);

        // the append handle must be closed before the rename on some platforms
        writer.file = None;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            writer.file = open_append(path).await.ok();
            return Err(e.into());
        }
        sync_parent_dir(path).await;

        writer.file = Some(open_append(path).await?);
        writer.dead_lines = 0;
        writer.dirty = false;

        debug!(
            "compacted history file {} to {} entries",
            path.display(),
            entries.len()
        );
        Ok(())
    }
}

struct Loaded {
    entries: Vec<Arc<HistoryEntry>>,
    /// Highest id mark found, 1 if none.
    next_id: u64,
    dead_lines: usize,
    dirty: bool,
    existed: bool,
}

async fn load_entries(path: &Path) -> Result<Loaded, HistoryError> {
    let (bytes, existed) = match fs::read(path).await {
        Ok(bytes) => (bytes, true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let mut next_id = 1;
    let mut dead_lines = 0;

    for (line_num, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<HistoryEntry>(line) {
            Ok(mut entry) => {
                if let Some(formatted) = entry.formatted.as_mut() {
                    formatted.reindex();
                }
                entries.push(Arc::new(entry));
            }
            Err(e) => match serde_json::from_slice::<IdMark>(line) {
                Ok(mark) => next_id = next_id.max(mark.next_id),
                Err(_) => {
                    dead_lines += 1;
                    warn!(
                        "skipping corrupted history entry at {}:{}: {}",
                        path.display(),
                        line_num + 1,
                        e
                    );
                }
            },
        }
    }

    entries.sort_by_key(|e| e.id);
    let before = entries.len();
    entries.dedup_by_key(|e| e.id);
    dead_lines += before - entries.len();

    Ok(Loaded {
        entries,
        next_id,
        dead_lines,
        dirty: bytes.last().is_some_and(|b| *b != b'\n'),
        existed,
    })
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn write_line(writer: &mut Writer, path: &Path, line: &str) -> std::io::Result<()> {
    if writer.file.is_none() {
        writer.file = Some(open_append(path).await?);
    }
    let Some(file) = writer.file.as_mut() else {
        return Ok(());
    };

    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history.jsonl".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Makes a rename or a newly created file durable. Best effort: not every
/// platform can open a directory.
async fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        let dir = non_empty_parent(path).unwrap_or_else(|| Path::new("."));
        match File::open(dir).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    debug!("failed to sync {}: {}", path.display(), e);
                }
            }
            Err(e) => debug!("failed to open parent of {}: {}", path.display(), e),
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

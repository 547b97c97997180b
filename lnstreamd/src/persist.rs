//! Durable stream records.
//!
//! The engine never writes storage. [`StreamPersister`] follows the engine's events and keeps
//! the records of a [`StreamStore`] up to date.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::{self, JoinHandle};
use tracing::*;

use crate::notify::{Event, Notifier};
use crate::stream::{StreamParams, StreamStatus, TotalParts};

pub const STREAMS_FILE: &str = "streams.json";
pub const DEFAULT_CURRENCY: &str = "BTC";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistError {
    #[error("stream store i/o: {0}")]
    Io(String),
    #[error("stream store format: {0}")]
    Format(String),
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Format(e.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Paused,
    Finished,
}

impl From<StreamStatus> for RecordStatus {
    fn from(s: StreamStatus) -> Self {
        match s {
            StreamStatus::Run => RecordStatus::Active,
            StreamStatus::Pause => RecordStatus::Paused,
            StreamStatus::End => RecordStatus::Finished,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub id: String,
    pub name: String,
    pub destination: String,
    /// satoshi per part
    pub price: u64,
    pub total_parts: TotalParts,
    pub parts_paid: u64,
    pub delay_ms: u64,
    pub currency: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub status: RecordStatus,
}

impl StreamRecord {
    /// A paused record for a newly added stream, named after its id unless `name` is given
    pub fn new(id: &str, name: Option<String>, params: &StreamParams) -> Self {
        StreamRecord {
            id: id.to_string(),
            name: name.unwrap_or_else(|| id.to_string()),
            destination: params.destination.clone(),
            price: params.price,
            total_parts: params.total_parts,
            parts_paid: params.current_part,
            delay_ms: params.delay_ms,
            currency: DEFAULT_CURRENCY.to_string(),
            memo: params.memo.clone(),
            status: RecordStatus::Paused,
        }
    }

    pub fn params(&self) -> StreamParams {
        StreamParams {
            price: self.price,
            total_parts: self.total_parts,
            current_part: self.parts_paid,
            delay_ms: self.delay_ms,
            destination: self.destination.clone(),
            memo: self.memo.clone(),
        }
    }
}

/// A store of stream records keyed by stream id
pub trait StreamStore: Send + Sync {
    /// All records, ordered by id
    fn load(&self) -> Result<Vec<StreamRecord>, PersistError>;
    /// Returns Ok(None) if there is no record for `id`
    fn get(&self, id: &str) -> Result<Option<StreamRecord>, PersistError>;
    /// Insert or replace
    fn put(&self, record: &StreamRecord) -> Result<(), PersistError>;
    fn remove(&self, id: &str) -> Result<(), PersistError>;
}

/// Records kept in one JSON file, rewritten on every change
pub struct JsonStreamStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStreamStore {
    pub fn new<P: AsRef<Path>>(datadir: P) -> Self {
        JsonStreamStore { path: datadir.as_ref().join(STREAMS_FILE), lock: Mutex::new(()) }
    }

    fn read(&self) -> Result<BTreeMap<String, StreamRecord>, PersistError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, records: &BTreeMap<String, StreamRecord>) -> Result<(), PersistError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), PersistError>
    where
        F: FnOnce(&mut BTreeMap<String, StreamRecord>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read()?;
        f(&mut records);
        self.write(&records)
    }
}

impl StreamStore for JsonStreamStore {
    fn load(&self) -> Result<Vec<StreamRecord>, PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.into_values().collect())
    }

    fn get(&self, id: &str) -> Result<Option<StreamRecord>, PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.remove(id))
    }

    fn put(&self, record: &StreamRecord) -> Result<(), PersistError> {
        self.modify(|records| {
            records.insert(record.id.clone(), record.clone());
        })
    }

    fn remove(&self, id: &str) -> Result<(), PersistError> {
        self.modify(|records| {
            records.remove(id);
        })
    }
}

/// Applies engine events to stream records
pub struct StreamPersister;

impl StreamPersister {
    /// Follow `notifier` until it is dropped or `shutdown` fires.
    ///
    /// Events already queued when `shutdown` fires are still written.
    pub fn spawn(
        store: Arc<dyn StreamStore>,
        notifier: &Notifier,
        shutdown: triggered::Listener,
    ) -> JoinHandle<()> {
        let mut events = notifier.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = events.recv() => match event {
                        Ok(event) => Self::persist(&store, event).await,
                        Err(RecvError::Lagged(n)) => warn!("persister missed {} events", n),
                        Err(RecvError::Closed) => break,
                    },
                    _ = shutdown.clone() => {
                        loop {
                            match events.try_recv() {
                                Ok(event) => Self::persist(&store, event).await,
                                Err(TryRecvError::Lagged(n)) =>
                                    warn!("persister missed {} events", n),
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            debug!("persister stopped");
        })
    }

    async fn persist(store: &Arc<dyn StreamStore>, event: Event) {
        if !matches!(
            event,
            Event::Progress { .. } | Event::StatusChanged { .. } | Event::Finished { .. }
        ) {
            return;
        }
        let store = Arc::clone(store);
        let applied = task::spawn_blocking(move || {
            if let Err(e) = Self::apply(store.as_ref(), &event) {
                error!("could not persist {:?}: {}", event, e);
            }
        })
        .await;
        if let Err(e) = applied {
            error!("persister write failed: {}", e);
        }
    }

    /// Update the record an event refers to; events for unknown streams are ignored
    pub fn apply(store: &dyn StreamStore, event: &Event) -> Result<(), PersistError> {
        let (id, parts_paid, status) = match event {
            Event::Progress { id, current_part } => (id, Some(*current_part), None),
            Event::StatusChanged { id, status } => (id, None, Some(RecordStatus::from(*status))),
            Event::Finished { id, current_part } =>
                (id, Some(*current_part), Some(RecordStatus::Finished)),
            _ => return Ok(()),
        };
        let mut record = match store.get(id)? {
            Some(record) => record,
            None => {
                debug!("no record for stream {}", id);
                return Ok(());
            }
        };
        if let Some(parts_paid) = parts_paid {
            record.parts_paid = parts_paid;
        }
        if let Some(status) = status {
            record.status = status;
        }
        store.put(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, status: RecordStatus) -> StreamRecord {
        StreamRecord {
            id: id.to_string(),
            name: "podcast".to_string(),
            destination: "abc".to_string(),
            price: 10,
            total_parts: TotalParts::Finite(5),
            parts_paid: 1,
            delay_ms: 1000,
            currency: "BTC".to_string(),
            memo: None,
            status,
        }
    }

    #[test]
    fn json_store_test() {
        let dir = TempDir::new().unwrap();
        let store = JsonStreamStore::new(dir.path());
        assert!(store.load().unwrap().is_empty());

        store.put(&record("s2", RecordStatus::Paused)).unwrap();
        store.put(&record("s1", RecordStatus::Active)).unwrap();
        let ids: Vec<String> = store.load().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        // survives reopening
        let store = JsonStreamStore::new(dir.path());
        assert_eq!(store.get("s1").unwrap().unwrap().status, RecordStatus::Active);
        store.remove("s1").unwrap();
        assert_eq!(store.get("s1").unwrap(), None);
        assert!(dir.path().join(STREAMS_FILE).exists());
    }

    #[test]
    fn corrupt_store_test() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STREAMS_FILE), b"not json").unwrap();
        let store = JsonStreamStore::new(dir.path());
        assert!(matches!(store.load(), Err(PersistError::Format(_))));
    }

    #[test]
    fn apply_test() {
        let dir = TempDir::new().unwrap();
        let store = JsonStreamStore::new(dir.path());
        store.put(&record("s1", RecordStatus::Paused)).unwrap();

        let progress = Event::Progress { id: "s1".to_string(), current_part: 3 };
        StreamPersister::apply(&store, &progress).unwrap();
        let running = Event::StatusChanged { id: "s1".to_string(), status: StreamStatus::Run };
        StreamPersister::apply(&store, &running).unwrap();
        let r = store.get("s1").unwrap().unwrap();
        assert_eq!((r.parts_paid, r.status), (3, RecordStatus::Active));

        let finished = Event::Finished { id: "s1".to_string(), current_part: 5 };
        StreamPersister::apply(&store, &finished).unwrap();
        let r = store.get("s1").unwrap().unwrap();
        assert_eq!((r.parts_paid, r.status), (5, RecordStatus::Finished));

        // unknown streams and unrelated events are ignored
        StreamPersister::apply(&store, &Event::Progress { id: "s9".to_string(), current_part: 1 })
            .unwrap();
        StreamPersister::apply(&store, &Event::RelayUp).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persister_task_test() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStreamStore::new(dir.path()));
        store.put(&record("s1", RecordStatus::Active)).unwrap();
        let notifier = Notifier::new();
        let (_stop, stop_signal) = triggered::trigger();
        let task = StreamPersister::spawn(store.clone(), &notifier, stop_signal);

        notifier.notify(Event::Progress { id: "s1".to_string(), current_part: 2 });
        drop(notifier);
        task.await.unwrap();
        assert_eq!(store.get("s1").unwrap().unwrap().parts_paid, 2);
    }

    #[tokio::test]
    async fn persister_drains_on_shutdown_test() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStreamStore::new(dir.path()));
        store.put(&record("s1", RecordStatus::Active)).unwrap();
        let notifier = Notifier::new();
        let (stop, stop_signal) = triggered::trigger();
        let task = StreamPersister::spawn(store.clone(), &notifier, stop_signal);

        for current_part in 2..=4 {
            notifier.notify(Event::Progress { id: "s1".to_string(), current_part });
        }
        let paused = Event::StatusChanged { id: "s1".to_string(), status: StreamStatus::Pause };
        notifier.notify(paused);
        stop.trigger();
        task.await.unwrap();

        let r = store.get("s1").unwrap().unwrap();
        assert_eq!((r.parts_paid, r.status), (4, RecordStatus::Paused));
    }
}

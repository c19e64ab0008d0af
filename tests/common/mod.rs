// tests/common/mod.rs
// In-memory fakes for the engine's collaborators.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use cinema_sync::asset::AssetMaterializer;
use cinema_sync::catalog::CatalogLookup;
use cinema_sync::publish::EventPublisher;
use cinema_sync::source::RecordSource;
use cinema_sync::store::{MemoryStore, SyncStore};
use cinema_sync::{
    EngineDeps, EnrichedMetadata, ImagePayload, PublishRequest, ReconcileEngine, ServiceError,
    SourceRecord, StoreError, SyncState,
};

pub const CHANNEL: &str = "cinema-voice";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, day, hour, 0, 0).unwrap()
}

pub fn record(id: &str, external_ref: &str, scheduled_at: DateTime<Utc>) -> SourceRecord {
    SourceRecord {
        id: id.into(),
        external_link: Some(format!("https://www.imdb.com/title/{external_ref}/")),
        scheduled_at,
        has_host: true,
    }
}

pub fn movie(title: &str, runtime: u32, image: Option<&str>) -> EnrichedMetadata {
    EnrichedMetadata {
        title: title.into(),
        synopsis: format!("{title} overview."),
        genres: vec!["Drama".into()],
        adult: false,
        release_year: Some(1994),
        runtime_minutes: Some(runtime),
        image_ref: image.map(str::to_string),
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub records: Mutex<Vec<SourceRecord>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl FakeSource {
    pub fn with(records: Vec<SourceRecord>) -> Self {
        let s = Self::default();
        *s.records.lock() = records;
        s
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_eligible(&self, _now: DateTime<Utc>) -> Result<Vec<SourceRecord>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                service: "fake-source",
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(self.records.lock().clone())
    }

    fn name(&self) -> &'static str {
        "fake-source"
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub movies: Mutex<HashMap<String, EnrichedMetadata>>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with(entries: Vec<(&str, EnrichedMetadata)>) -> Self {
        let c = Self::default();
        c.movies
            .lock()
            .extend(entries.into_iter().map(|(k, v)| (k.to_string(), v)));
        c
    }
}

#[async_trait]
impl CatalogLookup for FakeCatalog {
    async fn lookup(&self, external_ref: &str) -> Result<EnrichedMetadata, ServiceError> {
        self.lookups.lock().push(external_ref.to_string());
        self.movies
            .lock()
            .get(external_ref)
            .cloned()
            .ok_or(ServiceError::NotFound { service: "fake-catalog" })
    }
}

#[derive(Default)]
pub struct FakeAssets {
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetMaterializer for FakeAssets {
    async fn materialize(&self, image_ref: &str) -> Result<ImagePayload, ServiceError> {
        self.calls.lock().push(image_ref.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::NotFound { service: "fake-assets" });
        }
        Ok(ImagePayload(format!("data:image/jpeg;base64,{image_ref}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(PublishRequest),
    Update(String, PublishRequest),
}

#[derive(Default)]
pub struct FakePublisher {
    pub calls: Mutex<Vec<Call>>,
    pub next_id: AtomicU64,
    pub fail: AtomicBool,
}

impl FakePublisher {
    pub fn creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Update(..)))
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn create(&self, req: &PublishRequest) -> Result<String, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                service: "fake-publisher",
                status: 500,
                body: String::new(),
            });
        }
        self.calls.lock().push(Call::Create(req.clone()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("event-{id}"))
    }

    async fn update(&self, event_id: &str, req: &PublishRequest) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                service: "fake-publisher",
                status: 500,
                body: String::new(),
            });
        }
        self.calls
            .lock()
            .push(Call::Update(event_id.to_string(), req.clone()));
        Ok(())
    }
}

/// Memory store whose writes (and reads) can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

#[async_trait]
impl SyncStore for FlakyStore {
    async fn get(&self, id: &str) -> Result<Option<SyncState>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, state: SyncState) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.inner.set(id, state).await
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub catalog: Arc<FakeCatalog>,
    pub assets: Arc<FakeAssets>,
    pub publisher: Arc<FakePublisher>,
    pub store: Arc<FlakyStore>,
    pub engine: ReconcileEngine,
}

impl Harness {
    pub fn new(records: Vec<SourceRecord>, movies: Vec<(&str, EnrichedMetadata)>) -> Self {
        let source = Arc::new(FakeSource::with(records));
        let catalog = Arc::new(FakeCatalog::with(movies));
        let assets = Arc::new(FakeAssets::default());
        let publisher = Arc::new(FakePublisher::default());
        let store = Arc::new(FlakyStore::default());
        let deps = EngineDeps {
            source: source.clone(),
            catalog: catalog.clone(),
            assets: assets.clone(),
            publisher: publisher.clone(),
            store: store.clone(),
        };
        let engine = ReconcileEngine::new(deps, CHANNEL).with_concurrency(4);
        Self {
            source,
            catalog,
            assets,
            publisher,
            store,
            engine,
        }
    }
}

//! Test harness: an in-memory object store whose modification times can be
//! rewritten, plus builders for seeding log layouts.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload, PutResult,
};

use janitor::checkpoints::{Action, CheckpointWriter, NdjsonCheckpointIo};
use janitor::paths;
use janitor::protocol::{ChecksumRecord, Protocol};
use janitor::snapshot::{CheckpointProvider, Snapshot, TableMetadata, properties};

/// In-memory store that reports overridden modification times, standing in
/// for aged production data.
#[derive(Debug)]
pub struct BackdatingStore {
    inner: InMemory,
    overrides: Mutex<HashMap<Path, DateTime<Utc>>>,
}

impl BackdatingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemory::new(),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_modified(&self, location: &Path, instant: DateTime<Utc>) {
        self.overrides
            .lock()
            .unwrap()
            .insert(location.clone(), instant);
    }

    fn patch(&self, mut meta: ObjectMeta) -> ObjectMeta {
        if let Some(instant) = self.overrides.lock().unwrap().get(&meta.location) {
            meta.last_modified = *instant;
        }
        meta
    }

    fn overrides_snapshot(&self) -> HashMap<Path, DateTime<Utc>> {
        self.overrides.lock().unwrap().clone()
    }
}

impl fmt::Display for BackdatingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackdatingStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for BackdatingStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        let mut result = self.inner.get_opts(location, options).await?;
        result.meta = self.patch(result.meta);
        Ok(result)
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        let overrides = self.overrides_snapshot();
        self.inner
            .list(prefix)
            .map(move |item| {
                item.map(|mut meta| {
                    if let Some(instant) = overrides.get(&meta.location) {
                        meta.last_modified = *instant;
                    }
                    meta
                })
            })
            .boxed()
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&Path>,
    ) -> object_store::Result<ListResult> {
        let mut result = self.inner.list_with_delimiter(prefix).await?;
        result.objects = result.objects.into_iter().map(|m| self.patch(m)).collect();
        Ok(result)
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

pub fn log_root() -> Path {
    Path::from("tables/events/_txn_log")
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub async fn seed_aged(store: &Arc<BackdatingStore>, location: &Path, modified: DateTime<Utc>) {
    store
        .put(location, PutPayload::from_static(b"{}"))
        .await
        .unwrap();
    store.set_modified(location, modified);
}

pub async fn seed_commit(store: &Arc<BackdatingStore>, version: u64, modified: DateTime<Utc>) {
    seed_aged(store, &paths::commit_path(&log_root(), version), modified).await;
}

pub async fn seed_checksum(
    store: &Arc<BackdatingStore>,
    version: u64,
    protocol: Option<Protocol>,
    modified: DateTime<Utc>,
) {
    let record = ChecksumRecord {
        protocol,
        ..Default::default()
    };
    let location = paths::checksum_path(&log_root(), version);
    store
        .put(
            &location,
            PutPayload::from(serde_json::to_vec(&record).unwrap()),
        )
        .await
        .unwrap();
    store.set_modified(&location, modified);
}

pub async fn seed_classic_checkpoint(
    store: &Arc<BackdatingStore>,
    version: u64,
    modified: DateTime<Utc>,
) -> Path {
    let location = paths::classic_checkpoint_path(&log_root(), version);
    seed_aged(store, &location, modified).await;
    location
}

/// Seed a v2 top-level index referencing the given sidecar filenames.
pub async fn seed_v2_checkpoint(
    store: &Arc<BackdatingStore>,
    version: u64,
    sidecars: &[&str],
    modified: DateTime<Utc>,
) -> Path {
    let location = log_root().child(format!(
        "{}.checkpoint.7d9f66e5-dc34-4b28-b2ab-79b9b1cda8c8.json",
        paths::version_prefix(version)
    ));
    let io = NdjsonCheckpointIo::new(store_handle(store));
    let mut actions = vec![Action(serde_json::json!({ "metaData": { "id": "events" } }))];
    actions.extend(sidecars.iter().map(|s| Action::sidecar(*s)));
    io.write_classic_single_file(&actions, &location)
        .await
        .unwrap();
    store.set_modified(&location, modified);
    location
}

pub async fn seed_sidecar(store: &Arc<BackdatingStore>, name: &str, modified: DateTime<Utc>) -> Path {
    let location = paths::sidecar_dir(&log_root()).child(name);
    seed_aged(store, &location, modified).await;
    location
}

pub async fn seed_staged_commit(
    store: &Arc<BackdatingStore>,
    version: u64,
    modified: DateTime<Utc>,
) -> Path {
    let location = paths::staged_commits_dir(&log_root()).child(format!(
        "{}.43b41547-82d2-4d8e-ae7f-00e6a8b1f0cb.json",
        paths::version_prefix(version)
    ));
    seed_aged(store, &location, modified).await;
    location
}

pub fn store_handle(store: &Arc<BackdatingStore>) -> Arc<dyn ObjectStore> {
    store.clone() as Arc<dyn ObjectStore>
}

pub struct SnapshotFixture {
    pub latest_version: u64,
    pub checkpoint: Option<CheckpointProvider>,
    pub properties: Vec<(&'static str, String)>,
}

pub fn build_snapshot(fixture: SnapshotFixture) -> Snapshot {
    let mut props: HashMap<String, String> = fixture
        .properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    props
        .entry(properties::LOG_RETENTION_MILLIS.to_string())
        .or_insert_with(|| "7 days".to_string());
    Snapshot::new(
        fixture.latest_version,
        log_root(),
        TableMetadata::new(props),
        fixture.checkpoint,
    )
}

/// Surviving backfilled commit versions, ascending.
pub async fn surviving_commits(store: &Arc<BackdatingStore>) -> Vec<u64> {
    use futures::TryStreamExt;
    let root = log_root();
    let metas: Vec<ObjectMeta> = store.list(Some(&root)).try_collect().await.unwrap();
    let mut versions: Vec<u64> = metas
        .iter()
        .filter_map(|m| match paths::classify(&root, &m.location) {
            paths::LogFileKind::Commit {
                version,
                backfilled: true,
            } => Some(version),
            _ => None,
        })
        .collect();
    versions.sort_unstable();
    versions
}

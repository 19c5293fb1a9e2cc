// In-memory source and target used by the unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::CoreError;
use crate::fetch::EntitySource;
use crate::model::{EntityId, EntityType, FieldDiff, RawEntity, RecordKind, Status, SyncRecord};
use crate::target::{AuditState, FlagRequest, TargetStore};

// ── Entity builders ──────────────────────────────────────────────────

pub(crate) fn raw_entity(
    id: u64,
    object_type: EntityType,
    name: Option<&str>,
    props: &[(&str, &str)],
) -> RawEntity {
    RawEntity {
        id,
        name: name.map(str::to_owned),
        object_type: Some(object_type.to_string()),
        properties: props
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

pub(crate) fn block(id: u64, cidr: &str, name: &str) -> RawEntity {
    raw_entity(id, EntityType::Ip4Block, Some(name), &[("CIDR", cidr)])
}

pub(crate) fn network(id: u64, cidr: &str, name: &str) -> RawEntity {
    raw_entity(id, EntityType::Ip4Network, Some(name), &[("CIDR", cidr)])
}

pub(crate) fn address(id: u64, ip: &str, state: &str, name: Option<&str>) -> RawEntity {
    raw_entity(
        id,
        EntityType::Ip4Address,
        name,
        &[("address", ip), ("state", state)],
    )
}

// ── FakeSource ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Failure {
    /// Fail every request at this offset.
    AtOffset { offset: u32, transient: bool },
    /// Fail the first `n` requests with a transient error.
    Times(usize),
}

#[derive(Default)]
struct SourceState {
    calls: AtomicUsize,
    forks: AtomicUsize,
    log: Mutex<Vec<(EntityId, EntityType, u32)>>,
    parent_calls: Mutex<HashMap<EntityId, usize>>,
}

/// Tree of raw entities served page by page.
#[derive(Clone, Default)]
pub(crate) struct FakeSource {
    children: Arc<BTreeMap<(EntityId, EntityType), Vec<RawEntity>>>,
    failures: Arc<HashMap<EntityId, Failure>>,
    delay: Option<Duration>,
    state: Arc<SourceState>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_children(
        mut self,
        parent: u64,
        object_type: EntityType,
        entities: Vec<RawEntity>,
    ) -> Self {
        Arc::make_mut(&mut self.children)
            .entry((EntityId(parent), object_type))
            .or_default()
            .extend(entities);
        self
    }

    pub(crate) fn fail_at(mut self, parent: u64, offset: u32, transient: bool) -> Self {
        Arc::make_mut(&mut self.failures)
            .insert(EntityId(parent), Failure::AtOffset { offset, transient });
        self
    }

    pub(crate) fn fail_times(mut self, parent: u64, times: usize) -> Self {
        Arc::make_mut(&mut self.failures).insert(EntityId(parent), Failure::Times(times));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn forks(&self) -> usize {
        self.state.forks.load(Ordering::SeqCst)
    }

    pub(crate) fn requested_parents(&self) -> BTreeSet<EntityId> {
        self.state
            .log
            .lock()
            .unwrap()
            .iter()
            .map(|(parent, _, _)| *parent)
            .collect()
    }

    fn serve(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        start: u32,
        count: u32,
    ) -> Result<Vec<RawEntity>, CoreError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .log
            .lock()
            .unwrap()
            .push((parent_id, object_type, start));

        let seen = {
            let mut per_parent = self.state.parent_calls.lock().unwrap();
            let counter = per_parent.entry(parent_id).or_insert(0);
            *counter += 1;
            *counter
        };

        match self.failures.get(&parent_id) {
            Some(Failure::AtOffset { offset, transient }) if *offset == start => {
                return Err(CoreError::Api {
                    message: "injected failure".into(),
                    status: Some(if *transient { 503 } else { 400 }),
                    transient: *transient,
                });
            }
            Some(Failure::Times(n)) if seen <= *n => {
                return Err(CoreError::Api {
                    message: "injected transient failure".into(),
                    status: Some(503),
                    transient: true,
                });
            }
            _ => {}
        }

        let all = self
            .children
            .get(&(parent_id, object_type))
            .map_or(&[][..], Vec::as_slice);
        let start = usize::try_from(start).unwrap();
        let count = usize::try_from(count).unwrap();
        Ok(all.iter().skip(start).take(count).cloned().collect())
    }
}

impl EntitySource for FakeSource {
    async fn fetch_entities(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        start: u32,
        count: u32,
    ) -> Result<Vec<RawEntity>, CoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.serve(parent_id, object_type, start, count)
    }

    fn fork(&self) -> Result<Self, CoreError> {
        self.state.forks.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}

// ── MemoryTarget ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct TargetData {
    records: BTreeMap<String, SyncRecord>,
    notes: BTreeMap<String, Vec<String>>,
    next_pk: usize,
}

/// Transactional in-memory target store.
#[derive(Default)]
pub(crate) struct MemoryTarget {
    data: Mutex<TargetData>,
    saved: Mutex<Option<TargetData>>,
    fail_create_after: Option<usize>,
    creates: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryTarget {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records; primary keys are assigned in order.
    pub(crate) fn with_records(records: Vec<SyncRecord>) -> Self {
        let target = Self::new();
        {
            let mut data = target.data.lock().unwrap();
            for mut record in records {
                data.next_pk += 1;
                let pk = format!("pk-{}", data.next_pk);
                record.target_pk = Some(pk.clone());
                data.records.insert(pk, record);
            }
        }
        target
    }

    /// Fail every create after `n` successful ones.
    pub(crate) fn failing_after(mut self, n: usize) -> Self {
        self.fail_create_after = Some(n);
        self
    }

    pub(crate) fn records(&self) -> Vec<SyncRecord> {
        self.data.lock().unwrap().records.values().cloned().collect()
    }

    pub(crate) fn record(&self, value: &str) -> Option<SyncRecord> {
        self.data
            .lock()
            .unwrap()
            .records
            .values()
            .find(|r| r.key.value == value)
            .cloned()
    }

    pub(crate) fn notes(&self, pk: &str) -> Vec<String> {
        self.data
            .lock()
            .unwrap()
            .notes
            .get(pk)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn pk_of(&self, value: &str) -> String {
        self.record(value).and_then(|r| r.target_pk).unwrap()
    }

    /// Number of mutating calls (create, update, flag, delete).
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn not_found(pk: &str) -> CoreError {
        CoreError::Internal(format!("no record with pk {pk}"))
    }
}

impl TargetStore for MemoryTarget {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn begin(&self) -> Result<(), CoreError> {
        let snapshot = self.data.lock().unwrap().clone();
        *self.saved.lock().unwrap() = Some(snapshot);
        Ok(())
    }

    async fn commit(&self) -> Result<(), CoreError> {
        *self.saved.lock().unwrap() = None;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), CoreError> {
        if let Some(saved) = self.saved.lock().unwrap().take() {
            *self.data.lock().unwrap() = saved;
        }
        Ok(())
    }

    async fn list_all(&self, kind: RecordKind) -> Result<Vec<SyncRecord>, CoreError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.key.kind == kind)
            .cloned()
            .collect())
    }

    async fn create(&self, record: &SyncRecord) -> Result<String, CoreError> {
        let done = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_after.is_some_and(|n| done >= n) {
            return Err(CoreError::Api {
                message: "create rejected".into(),
                status: Some(400),
                transient: false,
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut data = self.data.lock().unwrap();
        data.next_pk += 1;
        let pk = format!("pk-{}", data.next_pk);
        let mut stored = record.clone();
        stored.target_pk = Some(pk.clone());
        data.records.insert(pk.clone(), stored);
        Ok(pk)
    }

    async fn update(
        &self,
        target_pk: &str,
        record: &SyncRecord,
        _diff: &FieldDiff,
    ) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock().unwrap();
        let stored = data
            .records
            .get_mut(target_pk)
            .ok_or_else(|| Self::not_found(target_pk))?;
        stored.description.clone_from(&record.description);
        stored.status = record.status;
        stored.attributes.clone_from(&record.attributes);
        Ok(())
    }

    async fn audit_state(&self, _kind: RecordKind, target_pk: &str) -> Result<AuditState, CoreError> {
        let data = self.data.lock().unwrap();
        let stored = data
            .records
            .get(target_pk)
            .ok_or_else(|| Self::not_found(target_pk))?;
        Ok(AuditState {
            status: stored.status,
            tags: stored.tags.clone(),
        })
    }

    async fn flag(
        &self,
        _kind: RecordKind,
        target_pk: &str,
        request: &FlagRequest,
    ) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock().unwrap();
        let stored = data
            .records
            .get_mut(target_pk)
            .ok_or_else(|| Self::not_found(target_pk))?;
        if let Some(status) = request.set_status {
            stored.status = status;
        }
        if let Some(ref tag) = request.add_tag {
            stored.tags.insert(tag.name.clone());
        }
        if let Some(ref note) = request.note {
            data.notes
                .entry(target_pk.to_owned())
                .or_default()
                .push(note.clone());
        }
        Ok(())
    }

    async fn delete(&self, _kind: RecordKind, target_pk: &str) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data
            .lock()
            .unwrap()
            .records
            .remove(target_pk)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(target_pk))
    }
}

/// Record with the given key value and status, no attributes.
pub(crate) fn prefix_record(value: &str, description: &str, status: Status) -> SyncRecord {
    SyncRecord::new(crate::model::RecordKey::prefix(value), description, status)
}

/// Like [`prefix_record`], as created by an earlier sync of entity `source_id`.
pub(crate) fn owned_prefix(
    value: &str,
    description: &str,
    status: Status,
    source_id: u64,
) -> SyncRecord {
    let mut record = prefix_record(value, description, status);
    record.source_id = Some(source_id.to_string());
    record
}

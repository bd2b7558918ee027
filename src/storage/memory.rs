//! In-memory intake store with optional JSON file persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, RwLock};

use crate::error::{IntakeError, Result, StorageError};
use crate::feedback::{CategorySummary, InterviewSession, Response, SessionId, Summarizer};
use crate::intent::FeedbackCategory;
use crate::schedule::{find_conflict, Booking, ScheduleEntry};

use super::traits::IntakeStore;
use super::types::{AgentId, Lead, LeadId, Property, PropertyId, SeedData};

/// File name of the persisted snapshot inside the data directory.
pub const PERSISTENCE_FILE: &str = "intake.json";

/// Everything but the schedule, guarded by one lock.
#[derive(Default)]
struct StoreData {
    leads: HashMap<LeadId, Lead>,
    properties: HashMap<PropertyId, Property>,
    sessions: HashMap<SessionId, InterviewSession>,
    /// Responses per session, in arrival order
    responses: HashMap<SessionId, Vec<Response>>,
    summaries: BTreeMap<(PropertyId, FeedbackCategory), CategorySummary>,
}

type AgentSchedule = Arc<AsyncMutex<Vec<ScheduleEntry>>>;

/// Persisted snapshot.
#[derive(Serialize, Deserialize)]
struct PersistenceData {
    version: u32,
    leads: Vec<Lead>,
    properties: Vec<Property>,
    sessions: Vec<InterviewSession>,
    responses: Vec<Response>,
    summaries: Vec<CategorySummary>,
    entries: Vec<ScheduleEntry>,
}

/// In-memory store.
///
/// Records live behind a single `RwLock`. Each agent's schedule has its own
/// mutex, so bookings for different agents never contend and the check and
/// append for one agent happen under one guard.
///
/// With persistence enabled, every change holds the write lock until its
/// snapshot is on disk. A change whose snapshot fails is undone before the
/// next change starts, so callers never see an error for a change that stuck.
pub struct MemoryStore {
    data: RwLock<StoreData>,
    schedules: RwLock<HashMap<AgentId, AgentSchedule>>,
    persistence_path: Option<PathBuf>,
    persist_lock: AsyncMutex<()>,
}

impl MemoryStore {
    /// Create a store without persistence.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            schedules: RwLock::new(HashMap::new()),
            persistence_path: None,
            persist_lock: AsyncMutex::new(()),
        }
    }

    /// Create a store persisted to `<data_dir>/intake.json`, loading the
    /// file if it exists.
    pub async fn with_persistence(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(StorageError::Io)?;

        let persistence_path = data_dir.join(PERSISTENCE_FILE);
        let store = Self {
            persistence_path: Some(persistence_path.clone()),
            ..Self::new()
        };

        if persistence_path.exists() {
            store.load_from_file(&persistence_path).await?;
        }

        Ok(store)
    }

    /// Create a store holding `seed`.
    pub fn with_seed(seed: SeedData) -> Self {
        let mut data = StoreData::default();
        for lead in seed.leads {
            data.leads.insert(lead.id, lead);
        }
        for property in seed.properties {
            data.properties.insert(property.id, property);
        }
        Self {
            data: RwLock::new(data),
            ..Self::new()
        }
    }

    /// Insert or replace the leads and properties in `seed`.
    pub async fn seed(&self, seed: SeedData) -> Result<()> {
        let _write = self.begin_write().await;
        let mut data = self.data.write().await;
        let (leads, properties) = (seed.leads.len(), seed.properties.len());
        let previous = (data.leads.clone(), data.properties.clone());
        for lead in seed.leads {
            data.leads.insert(lead.id, lead);
        }
        for property in seed.properties {
            data.properties.insert(property.id, property);
        }
        drop(data);

        self.persist_or_undo(move |data| {
            (data.leads, data.properties) = previous;
        })
        .await?;
        tracing::info!("Seeded {} leads and {} properties", leads, properties);
        Ok(())
    }

    /// Load seed data from a JSON file of `{ "leads": [...], "properties": [...] }`.
    pub async fn seed_from_file(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(StorageError::Io)?;
        let seed: SeedData = serde_json::from_str(&content)?;
        self.seed(seed).await
    }

    async fn load_from_file(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(StorageError::Io)?;

        let persisted: PersistenceData = serde_json::from_str(&content).map_err(|e| {
            tracing::warn!("Unreadable store file {}: {}", path.display(), e);
            StorageError::Corrupt(format!("{}: {}", path.display(), e))
        })?;

        let mut data = self.data.write().await;
        for lead in persisted.leads {
            data.leads.insert(lead.id, lead);
        }
        for property in persisted.properties {
            data.properties.insert(property.id, property);
        }
        for session in persisted.sessions {
            data.sessions.insert(session.id.clone(), session);
        }
        for response in persisted.responses {
            data.responses
                .entry(response.session_id.clone())
                .or_default()
                .push(response);
        }
        for summary in persisted.summaries {
            data.summaries
                .insert((summary.property_id, summary.category), summary);
        }

        let mut schedules = self.schedules.write().await;
        let entry_count = persisted.entries.len();
        for entry in persisted.entries {
            schedules
                .entry(entry.agent_id)
                .or_default()
                .lock()
                .await
                .push(entry);
        }

        tracing::info!(
            "Loaded {} sessions, {} summaries and {} schedule entries from {}",
            data.sessions.len(),
            data.summaries.len(),
            entry_count,
            path.display()
        );

        Ok(())
    }

    /// Serialize changes while persistence is enabled. Held from the first
    /// mutation until the snapshot is written or the change is undone.
    async fn begin_write(&self) -> Option<MutexGuard<'_, ()>> {
        match self.persistence_path {
            Some(_) => Some(self.persist_lock.lock().await),
            None => None,
        }
    }

    /// Persist data to file if persistence is enabled. Callers hold the
    /// guard from [`Self::begin_write`].
    async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.persistence_path else {
            return Ok(());
        };

        let data = self.data.read().await;
        let mut persisted = PersistenceData {
            version: 1,
            leads: data.leads.values().cloned().collect(),
            properties: data.properties.values().cloned().collect(),
            sessions: data.sessions.values().cloned().collect(),
            responses: data.responses.values().flatten().cloned().collect(),
            summaries: data.summaries.values().cloned().collect(),
            entries: Vec::new(),
        };
        drop(data);

        let schedules: Vec<AgentSchedule> = self.schedules.read().await.values().cloned().collect();
        for schedule in schedules {
            persisted.entries.extend(schedule.lock().await.iter().cloned());
        }

        let content = serde_json::to_string_pretty(&persisted).map_err(IntakeError::Serialization)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(StorageError::Io)?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(StorageError::Io)?;

        Ok(())
    }

    /// Persist, or apply `undo` to the records and return the error.
    async fn persist_or_undo(&self, undo: impl FnOnce(&mut StoreData) + Send) -> Result<()> {
        if let Err(e) = self.persist().await {
            tracing::warn!("Failed to persist store, change rolled back: {}", e);
            undo(&mut *self.data.write().await);
            return Err(e);
        }
        Ok(())
    }

    /// The agent's schedule, created on first use.
    async fn schedule(&self, agent_id: AgentId) -> AgentSchedule {
        if let Some(schedule) = self.schedules.read().await.get(&agent_id) {
            return schedule.clone();
        }
        self.schedules
            .write()
            .await
            .entry(agent_id)
            .or_default()
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntakeStore for MemoryStore {
    // ========================================================================
    // CRM Records
    // ========================================================================

    async fn get_lead(&self, id: LeadId) -> Result<Option<Lead>> {
        Ok(self.data.read().await.leads.get(&id).cloned())
    }

    async fn upsert_lead(&self, lead: Lead) -> Result<Lead> {
        let _write = self.begin_write().await;
        let previous = self.data.write().await.leads.insert(lead.id, lead.clone());
        let id = lead.id;
        self.persist_or_undo(move |data| match previous {
            Some(previous) => {
                data.leads.insert(id, previous);
            }
            None => {
                data.leads.remove(&id);
            }
        })
        .await?;
        Ok(lead)
    }

    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>> {
        Ok(self.data.read().await.properties.get(&id).cloned())
    }

    async fn upsert_property(&self, property: Property) -> Result<Property> {
        let _write = self.begin_write().await;
        let previous = self
            .data
            .write()
            .await
            .properties
            .insert(property.id, property.clone());
        let id = property.id;
        self.persist_or_undo(move |data| match previous {
            Some(previous) => {
                data.properties.insert(id, previous);
            }
            None => {
                data.properties.remove(&id);
            }
        })
        .await?;
        Ok(property)
    }

    // ========================================================================
    // Interview Sessions
    // ========================================================================

    async fn create_session(&self, session: InterviewSession) -> Result<InterviewSession> {
        let _write = self.begin_write().await;
        self.data
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session.clone());
        let id = session.id.clone();
        self.persist_or_undo(move |data| {
            data.sessions.remove(&id);
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<InterviewSession>> {
        Ok(self.data.read().await.sessions.get(id).cloned())
    }

    async fn session_responses(&self, session_id: &str) -> Result<Vec<Response>> {
        Ok(self
            .data
            .read()
            .await
            .responses
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_response(
        &self,
        response: Response,
        session: InterviewSession,
        summarizer: &Summarizer,
    ) -> Result<CategorySummary> {
        let _write = self.begin_write().await;
        let mut data = self.data.write().await;

        let Some(previous_session) = data.sessions.get(&session.id).cloned() else {
            return Err(StorageError::NotFound(format!("session {}", session.id)).into());
        };

        let key = (response.property_id, response.category);
        let previous_summary = data.summaries.get(&key).cloned();
        let response_id = response.id.clone();
        let summary = data
            .summaries
            .entry(key)
            .or_insert_with(|| CategorySummary::new(key.0, key.1));
        summarizer.absorb(summary, response.clone());
        let summary = summary.clone();

        data.responses
            .entry(response.session_id.clone())
            .or_default()
            .push(response);
        data.sessions.insert(session.id.clone(), session);

        drop(data);
        self.persist_or_undo(move |data| {
            restore_summary(data, key, previous_summary);
            if let Some(responses) = data.responses.get_mut(&previous_session.id) {
                responses.retain(|r| r.id != response_id);
            }
            data.sessions.insert(previous_session.id.clone(), previous_session);
        })
        .await?;
        Ok(summary)
    }

    // ========================================================================
    // Category Summaries
    // ========================================================================

    async fn get_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
    ) -> Result<Option<CategorySummary>> {
        Ok(self
            .data
            .read()
            .await
            .summaries
            .get(&(property_id, category))
            .cloned())
    }

    async fn list_summaries(&self, property_id: PropertyId) -> Result<Vec<CategorySummary>> {
        let data = self.data.read().await;
        Ok(data
            .summaries
            .range((property_id, FeedbackCategory::Price)..=(property_id, FeedbackCategory::General))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn edit_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
        text: String,
        editor: String,
        summarizer: &Summarizer,
    ) -> Result<CategorySummary> {
        let _write = self.begin_write().await;
        let mut data = self.data.write().await;
        let key = (property_id, category);
        let previous = data.summaries.get(&key).cloned();
        let summary = data
            .summaries
            .entry(key)
            .or_insert_with(|| CategorySummary::new(property_id, category));
        summarizer.edit(summary, text, editor);
        let summary = summary.clone();
        drop(data);

        self.persist_or_undo(move |data| restore_summary(data, key, previous))
            .await?;
        Ok(summary)
    }

    async fn reset_summary(
        &self,
        property_id: PropertyId,
        category: FeedbackCategory,
        summarizer: &Summarizer,
    ) -> Result<Option<CategorySummary>> {
        let _write = self.begin_write().await;
        let mut data = self.data.write().await;
        let key = (property_id, category);
        let Some(summary) = data.summaries.get_mut(&key) else {
            return Ok(None);
        };
        let previous = Some(summary.clone());
        summarizer.reset(summary);
        let summary = summary.clone();
        drop(data);

        self.persist_or_undo(move |data| restore_summary(data, key, previous))
            .await?;
        Ok(Some(summary))
    }

    // ========================================================================
    // Schedule
    // ========================================================================

    async fn entries_for_agent(&self, agent_id: AgentId) -> Result<Vec<ScheduleEntry>> {
        let schedule = self.schedules.read().await.get(&agent_id).cloned();
        let Some(schedule) = schedule else {
            return Ok(Vec::new());
        };
        let mut entries = schedule.lock().await.clone();
        entries.sort_by_key(|e| e.start);
        Ok(entries)
    }

    async fn insert_entry_if_free(&self, entry: ScheduleEntry) -> Result<Booking> {
        let _write = self.begin_write().await;
        let schedule = self.schedule(entry.agent_id).await;

        {
            let mut entries = schedule.lock().await;
            if let Some(existing) = find_conflict(entry.agent_id, &entry.range(), &entries) {
                tracing::debug!(
                    agent_id = entry.agent_id,
                    existing = %existing.id,
                    "Slot {} taken",
                    entry.range()
                );
                return Ok(Booking::Conflict {
                    existing: existing.clone(),
                });
            }
            entries.push(entry.clone());
        }

        if let Err(e) = self.persist().await {
            tracing::warn!(entry = %entry.id, "Failed to persist booking, rolled back: {}", e);
            schedule.lock().await.retain(|existing| existing.id != entry.id);
            return Err(e);
        }

        tracing::debug!(agent_id = entry.agent_id, entry = %entry.id, "Committed {}", entry.range());
        Ok(Booking::Committed(entry))
    }
}

/// Put a summary back the way it was before a failed change.
fn restore_summary(
    data: &mut StoreData,
    key: (PropertyId, FeedbackCategory),
    previous: Option<CategorySummary>,
) {
    match previous {
        Some(previous) => {
            data.summaries.insert(key, previous);
        }
        None => {
            data.summaries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{ResponseMethod, SessionStatus};
    use crate::schedule::EntrySource;
    use crate::temporal::TimeRange;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn range(h: u32, m: u32, minutes: i64) -> TimeRange {
        TimeRange::starting_at(
            Utc.with_ymd_and_hms(2024, 1, 17, h, m, 0).unwrap(),
            chrono::Duration::minutes(minutes),
        )
        .unwrap()
    }

    fn response(session: &InterviewSession, text: &str) -> Response {
        Response {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            property_id: session.property_id,
            question_id: session.current_question_id.clone().unwrap_or_default(),
            response_method: ResponseMethod::Text,
            response_value: text.to_string(),
            response_text: None,
            category: FeedbackCategory::Price,
            confidence: 1.0,
            needs_review: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_seed_and_lookup() {
        let store = MemoryStore::with_seed(SeedData {
            leads: vec![Lead::new(1, "Dana")],
            properties: vec![Property::new(7, "Elm St").with_agent(3)],
        });

        assert_eq!(store.get_lead(1).await.unwrap().unwrap().name, "Dana");
        assert_eq!(store.get_property(7).await.unwrap().unwrap().agent_id, Some(3));
        assert!(store.get_property(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_entry_if_free() {
        let store = MemoryStore::new();

        let first = ScheduleEntry::new(1, 7, range(10, 0, 30), EntrySource::Manual);
        assert!(store.insert_entry_if_free(first.clone()).await.unwrap().is_committed());

        let clash = ScheduleEntry::new(1, 7, range(10, 15, 30), EntrySource::Voice);
        match store.insert_entry_if_free(clash).await.unwrap() {
            Booking::Conflict { existing } => assert_eq!(existing.id, first.id),
            other => panic!("expected conflict, got {:?}", other),
        }

        let adjacent = ScheduleEntry::new(1, 7, range(10, 30, 30), EntrySource::Voice);
        assert!(store.insert_entry_if_free(adjacent).await.unwrap().is_committed());

        let other_agent = ScheduleEntry::new(2, 7, range(10, 0, 30), EntrySource::Voice);
        assert!(store.insert_entry_if_free(other_agent).await.unwrap().is_committed());

        assert_eq!(store.entries_for_agent(1).await.unwrap().len(), 2);
        assert_eq!(store.entries_for_agent(2).await.unwrap().len(), 1);
        assert!(store.entries_for_agent(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_never_double_book() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let entry = ScheduleEntry::new(1, 7, range(15, 0, 30), EntrySource::Voice);
                    store.insert_entry_if_free(entry).await.unwrap().is_committed()
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(store.entries_for_agent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_response_requires_session() {
        let store = MemoryStore::new();
        let session = InterviewSession::new(1, 7, "quick_pulse", Some("rating".to_string()));
        let result = store
            .commit_response(response(&session, "great"), session.advanced(None), &Summarizer::default())
            .await;
        assert!(matches!(result, Err(IntakeError::Storage(StorageError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let summarizer = Summarizer::default();

        let session_id = {
            let store = MemoryStore::with_persistence(temp_dir.path()).await.unwrap();
            store.upsert_property(Property::new(7, "Elm St")).await.unwrap();

            let session = store
                .create_session(InterviewSession::new(1, 7, "quick_pulse", Some("rating".to_string())))
                .await
                .unwrap();
            store
                .commit_response(response(&session, "too pricey"), session.advanced(None), &summarizer)
                .await
                .unwrap();
            store
                .insert_entry_if_free(ScheduleEntry::new(1, 7, range(9, 0, 30), EntrySource::Manual))
                .await
                .unwrap();
            session.id
        };

        let store = MemoryStore::with_persistence(temp_dir.path()).await.unwrap();
        let session = store.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(store.session_responses(&session_id).await.unwrap().len(), 1);
        assert_eq!(
            store
                .get_summary(7, FeedbackCategory::Price)
                .await
                .unwrap()
                .unwrap()
                .summary_text,
            "1 response: too pricey"
        );
        assert_eq!(store.entries_for_agent(1).await.unwrap().len(), 1);
        assert!(store.get_property(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_no_change() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let summarizer = Summarizer::default();
        let store = MemoryStore::with_persistence(&data_dir).await.unwrap();

        let session = store
            .create_session(InterviewSession::new(1, 7, "quick_pulse", Some("rating".to_string())))
            .await
            .unwrap();
        std::fs::remove_dir_all(&data_dir).unwrap();

        let result = store
            .commit_response(response(&session, "too pricey"), session.advanced(None), &summarizer)
            .await;
        assert!(result.is_err());
        let stored = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored, session);
        assert!(store.session_responses(&session.id).await.unwrap().is_empty());
        assert!(store.get_summary(7, FeedbackCategory::Price).await.unwrap().is_none());

        let entry = ScheduleEntry::new(1, 7, range(9, 0, 30), EntrySource::Manual);
        assert!(store.insert_entry_if_free(entry.clone()).await.is_err());
        assert!(store.entries_for_agent(1).await.unwrap().is_empty());

        let edit = store
            .edit_summary(7, FeedbackCategory::Size, "Small".into(), "ed".into(), &summarizer)
            .await;
        assert!(edit.is_err());
        assert!(store.get_summary(7, FeedbackCategory::Size).await.unwrap().is_none());

        std::fs::create_dir_all(&data_dir).unwrap();
        assert!(store.insert_entry_if_free(entry).await.unwrap().is_committed());
        store
            .commit_response(response(&session, "too pricey"), session.advanced(None), &summarizer)
            .await
            .unwrap();
        assert_eq!(store.session_responses(&session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(PERSISTENCE_FILE), "{not json").unwrap();

        let result = MemoryStore::with_persistence(temp_dir.path()).await;
        assert!(matches!(result, Err(IntakeError::Storage(StorageError::Corrupt(_)))));
    }

    #[tokio::test]
    async fn test_list_summaries_scoped_to_property() {
        let store = MemoryStore::new();
        let summarizer = Summarizer::default();
        store
            .edit_summary(7, FeedbackCategory::Size, "Small".into(), "ed".into(), &summarizer)
            .await
            .unwrap();
        store
            .edit_summary(7, FeedbackCategory::Price, "High".into(), "ed".into(), &summarizer)
            .await
            .unwrap();
        store
            .edit_summary(8, FeedbackCategory::Price, "Fine".into(), "ed".into(), &summarizer)
            .await
            .unwrap();

        let summaries = store.list_summaries(7).await.unwrap();
        let categories: Vec<_> = summaries.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![FeedbackCategory::Price, FeedbackCategory::Size]);

        assert!(store.reset_summary(9, FeedbackCategory::Price, &summarizer).await.unwrap().is_none());
    }
}

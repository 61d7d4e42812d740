use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use pageview_core::JobToken;
use pageview_core::Page;
use pageview_core::PageId;
use pageview_core::Section;
use pageview_core::SectionId;
use pageview_core::StreamEvent;
use pageview_core::StreamMessage;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::contracts::HistoricalQueries;
use crate::contracts::Location;
use crate::contracts::Mutations;
use crate::contracts::PendingJobSlot;
use crate::contracts::SectionConnection;
use crate::contracts::ServiceError;
use crate::contracts::StreamSubscription;
use crate::contracts::StreamTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub subscribes: usize,
    pub unsubscribes: usize,
    pub open: usize,
}

/// Transport that serves queued messages per job token. Clones share the same queues, so a test
/// can keep feeding a job after the view subscribed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    scripts: Rc<RefCell<HashMap<JobToken, VecDeque<StreamMessage>>>>,
    stats: Rc<RefCell<TransportStats>>,
    refuse: Rc<RefCell<Option<ServiceError>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events<I>(self, job: &JobToken, events: I) -> Self
    where
        I: IntoIterator<Item = StreamEvent>,
    {
        for event in events {
            self.push(job, StreamMessage::Event(event));
        }
        self
    }

    pub fn push(&self, job: &JobToken, message: StreamMessage) {
        self.scripts
            .borrow_mut()
            .entry(job.clone())
            .or_default()
            .push_back(message);
    }

    pub fn refuse_with(&self, error: ServiceError) {
        *self.refuse.borrow_mut() = Some(error);
    }

    pub fn stats(&self) -> TransportStats {
        *self.stats.borrow()
    }

    pub fn remaining(&self, job: &JobToken) -> usize {
        self.scripts.borrow().get(job).map_or(0, VecDeque::len)
    }
}

impl StreamTransport for ScriptedTransport {
    fn subscribe(&mut self, job: &JobToken) -> Result<Box<dyn StreamSubscription>, ServiceError> {
        if let Some(error) = self.refuse.borrow().clone() {
            return Err(error);
        }
        let mut stats = self.stats.borrow_mut();
        stats.subscribes += 1;
        stats.open += 1;
        Ok(Box::new(ScriptedSubscription {
            job: job.clone(),
            scripts: Rc::clone(&self.scripts),
            stats: Rc::clone(&self.stats),
            closed: false,
        }))
    }
}

struct ScriptedSubscription {
    job: JobToken,
    scripts: Rc<RefCell<HashMap<JobToken, VecDeque<StreamMessage>>>>,
    stats: Rc<RefCell<TransportStats>>,
    closed: bool,
}

impl StreamSubscription for ScriptedSubscription {
    fn poll(&mut self) -> Option<StreamMessage> {
        if self.closed {
            return None;
        }
        self.scripts
            .borrow_mut()
            .get_mut(&self.job)
            .and_then(VecDeque::pop_front)
    }

    fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut stats = self.stats.borrow_mut();
        stats.unsubscribes += 1;
        stats.open = stats.open.saturating_sub(1);
    }
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse fixture: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Historical records as stored in a YAML fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFixture {
    pub pages: Vec<Page>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Default)]
struct QueryStore {
    fixture: QueryFixture,
    scripted_sections: VecDeque<Result<SectionConnection, ServiceError>>,
    page_failure: Option<ServiceError>,
    page_calls: usize,
    section_cursors: Vec<Option<String>>,
}

/// Query service over in-memory records. Section pages are cut with `offset:<n>` cursors unless
/// responses were scripted with [`InMemoryQueries::script_sections`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueries {
    inner: Rc<RefCell<QueryStore>>,
}

impl InMemoryQueries {
    pub fn new(fixture: QueryFixture) -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueryStore {
                fixture,
                ..QueryStore::default()
            })),
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, FixtureError> {
        Ok(Self::new(serde_yaml::from_str(raw)?))
    }

    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn script_sections(&self, response: Result<SectionConnection, ServiceError>) {
        self.inner.borrow_mut().scripted_sections.push_back(response);
    }

    pub fn fail_pages_with(&self, error: ServiceError) {
        self.inner.borrow_mut().page_failure = Some(error);
    }

    pub fn page_calls(&self) -> usize {
        self.inner.borrow().page_calls
    }

    pub fn section_cursors(&self) -> Vec<Option<String>> {
        self.inner.borrow().section_cursors.clone()
    }
}

impl HistoricalQueries for InMemoryQueries {
    fn list_pages(&self, ids: &[PageId]) -> Result<Vec<Page>, ServiceError> {
        let mut store = self.inner.borrow_mut();
        store.page_calls += 1;
        if let Some(error) = store.page_failure.clone() {
            return Err(error);
        }
        Ok(store
            .fixture
            .pages
            .iter()
            .filter(|page| ids.contains(&page.id))
            .cloned()
            .collect())
    }

    fn list_sections(
        &self,
        page_id: &PageId,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<SectionConnection, ServiceError> {
        let mut store = self.inner.borrow_mut();
        store.section_cursors.push(cursor.map(str::to_string));
        if let Some(response) = store.scripted_sections.pop_front() {
            return response;
        }

        let offset = match cursor {
            None => 0,
            Some(raw) => raw
                .strip_prefix("offset:")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ServiceError::Rejected(format!("bad cursor {raw}")))?,
        };
        let owned: Vec<&Section> = store
            .fixture
            .sections
            .iter()
            .filter(|section| &section.page_id == page_id)
            .collect();
        let end = owned.len().min(offset + page_size.max(1) as usize);
        let records = owned
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|section| (*section).clone())
            .collect();
        Ok(SectionConnection {
            records,
            has_next_page: end < owned.len(),
            end_cursor: Some(format!("offset:{end}")),
        })
    }
}

#[derive(Debug, Default)]
struct MutationStore {
    add_responses: VecDeque<Result<Option<Section>, ServiceError>>,
    delete_section_responses: VecDeque<Result<bool, ServiceError>>,
    delete_page_responses: VecDeque<Result<bool, ServiceError>>,
    next_section: usize,
    calls: Vec<String>,
}

/// Mutation service that acknowledges everything unless a response was scripted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMutations {
    inner: Rc<RefCell<MutationStore>>,
}

impl InMemoryMutations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_add(&self, response: Result<Option<Section>, ServiceError>) {
        self.inner.borrow_mut().add_responses.push_back(response);
    }

    pub fn script_delete_section(&self, response: Result<bool, ServiceError>) {
        self.inner
            .borrow_mut()
            .delete_section_responses
            .push_back(response);
    }

    pub fn script_delete_page(&self, response: Result<bool, ServiceError>) {
        self.inner
            .borrow_mut()
            .delete_page_responses
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.borrow().calls.clone()
    }
}

impl Mutations for InMemoryMutations {
    fn add_section(&self, page_id: &PageId, title: &str) -> Result<Option<Section>, ServiceError> {
        let mut store = self.inner.borrow_mut();
        store.calls.push(format!("add_section {page_id} {title}"));
        if let Some(response) = store.add_responses.pop_front() {
            return response;
        }
        store.next_section += 1;
        Ok(Some(Section::empty(
            SectionId::new(format!("added-{}", store.next_section)),
            page_id.clone(),
            title,
        )))
    }

    fn delete_section(&self, section_id: &SectionId) -> Result<bool, ServiceError> {
        let mut store = self.inner.borrow_mut();
        store.calls.push(format!("delete_section {section_id}"));
        store.delete_section_responses.pop_front().unwrap_or(Ok(true))
    }

    fn delete_page(&self, page_id: &PageId) -> Result<bool, ServiceError> {
        let mut store = self.inner.borrow_mut();
        store.calls.push(format!("delete_page {page_id}"));
        store.delete_page_responses.pop_front().unwrap_or(Ok(true))
    }
}

/// Cross-view pending-job token shared by clones.
#[derive(Debug, Clone, Default)]
pub struct SharedJobSlot {
    slot: Rc<RefCell<Option<JobToken>>>,
}

impl SharedJobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, job: JobToken) {
        *self.slot.borrow_mut() = Some(job);
    }
}

impl PendingJobSlot for SharedJobSlot {
    fn get(&self) -> Option<JobToken> {
        self.slot.borrow().clone()
    }

    fn clear(&self) {
        self.slot.borrow_mut().take();
    }
}

#[derive(Debug, Default)]
struct LocationState {
    path: String,
    page_id: Option<PageId>,
    history: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    inner: Rc<RefCell<LocationState>>,
}

impl MemoryLocation {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            inner: Rc::new(RefCell::new(LocationState {
                history: vec![path.clone()],
                path,
                page_id: None,
            })),
        }
    }

    pub fn at_page(path: impl Into<String>, page_id: PageId) -> Self {
        let location = Self::new(path);
        location.inner.borrow_mut().page_id = Some(page_id);
        location
    }

    pub fn path(&self) -> String {
        self.inner.borrow().path.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.inner.borrow().history.clone()
    }
}

impl Location for MemoryLocation {
    fn current_page_id(&self) -> Option<PageId> {
        self.inner.borrow().page_id.clone()
    }

    fn replace(&mut self, page_id: &PageId, path: &str) {
        let mut state = self.inner.borrow_mut();
        state.page_id = Some(page_id.clone());
        state.path = path.to_string();
        state.history.push(path.to_string());
    }

    fn reset(&mut self, path: &str) {
        let mut state = self.inner.borrow_mut();
        state.page_id = None;
        state.path = path.to_string();
        state.history.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const FIXTURE: &str = r#"
pages:
  - id: "1"
    author_id: alice
    title: Notes
    content: body
    created_at: 2024-01-01T00:00:00Z
    updated_at: 2024-01-02T00:00:00Z
sections:
  - { id: a, page_id: "1", title: A, content: one }
  - { id: b, page_id: "1", title: B }
  - { id: c, page_id: "1", title: C, content: three }
  - { id: z, page_id: "2", title: Z }
"#;

    #[test]
    fn yaml_fixture_pages_by_offset_cursor() {
        let queries = InMemoryQueries::from_yaml_str(FIXTURE).expect("fixture");
        let page_id = PageId::from("1");

        let first = queries.list_sections(&page_id, 2, None).expect("first");
        assert_eq!(first.records.len(), 2);
        assert!(first.has_next_page);
        assert_eq!(first.end_cursor.as_deref(), Some("offset:2"));

        let second = queries
            .list_sections(&page_id, 2, first.end_cursor.as_deref())
            .expect("second");
        let ids: Vec<&str> = second.records.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert!(!second.has_next_page);
        assert_eq!(second.records[0].content, "three");
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        let queries = InMemoryQueries::from_yaml_str(FIXTURE).expect("fixture");
        let page = queries
            .list_sections(&PageId::from("1"), 10, None)
            .expect("sections");
        assert_eq!(page.records[1].content, "");
    }

    #[test]
    fn unknown_cursor_is_rejected() {
        let queries = InMemoryQueries::default();
        let err = queries
            .list_sections(&PageId::from("1"), 10, Some("bogus"))
            .expect_err("bad cursor");
        assert!(matches!(err, ServiceError::Rejected(_)));
    }

    #[test]
    fn subscription_stops_serving_after_unsubscribe() {
        let job = JobToken::from("job");
        let mut transport = ScriptedTransport::new().with_events(
            &job,
            [StreamEvent::PageContentDelta {
                delta: "a".to_string(),
            }],
        );
        let mut subscription = transport.subscribe(&job).expect("subscribe");
        subscription.unsubscribe();
        subscription.unsubscribe();

        assert_eq!(subscription.poll(), None);
        assert_eq!(
            transport.stats(),
            TransportStats {
                subscribes: 1,
                unsubscribes: 1,
                open: 0,
            }
        );
        assert_eq!(transport.remaining(&job), 1);
    }

    #[test]
    fn job_slot_is_shared_between_clones() {
        let slot = SharedJobSlot::new();
        let other_view = slot.clone();
        slot.set(JobToken::from("job"));
        assert_eq!(other_view.get(), Some(JobToken::from("job")));
        other_view.clear();
        assert_eq!(slot.get(), None);
    }
}

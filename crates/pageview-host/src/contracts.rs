use pageview_core::JobToken;
use pageview_core::Page;
use pageview_core::PageId;
use pageview_core::Section;
use pageview_core::SectionId;
use pageview_core::StreamMessage;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConnection {
    pub records: Vec<Section>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One open conversion stream.
pub trait StreamSubscription {
    /// Next delivered message, or `None` when nothing is available yet.
    fn poll(&mut self) -> Option<StreamMessage>;
    fn unsubscribe(&mut self);
}

pub trait StreamTransport {
    fn subscribe(&mut self, job: &JobToken) -> Result<Box<dyn StreamSubscription>, ServiceError>;
}

pub trait HistoricalQueries {
    fn list_pages(&self, ids: &[PageId]) -> Result<Vec<Page>, ServiceError>;
    fn list_sections(
        &self,
        page_id: &PageId,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<SectionConnection, ServiceError>;
}

pub trait Mutations {
    /// `Ok(None)` is a falsy acknowledgement.
    fn add_section(&self, page_id: &PageId, title: &str) -> Result<Option<Section>, ServiceError>;
    fn delete_section(&self, section_id: &SectionId) -> Result<bool, ServiceError>;
    fn delete_page(&self, page_id: &PageId) -> Result<bool, ServiceError>;
}

/// Hand-off slot for a conversion requested from another view.
pub trait PendingJobSlot {
    fn get(&self) -> Option<JobToken>;
    fn clear(&self);
}

pub trait Location {
    fn current_page_id(&self) -> Option<PageId>;
    fn replace(&mut self, page_id: &PageId, path: &str);
    fn reset(&mut self, path: &str);
}

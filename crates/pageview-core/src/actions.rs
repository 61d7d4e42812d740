use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::state::JobToken;
use super::state::Notice;
use super::state::Page;
use super::state::PageId;
use super::state::Section;
use super::state::SectionId;
use super::state::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSection {
    pub id: SectionId,
    pub title: String,
}

/// One step of a page conversion stream, in transport order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    PageCreated {
        id: PageId,
        author_id: UserId,
        title: String,
    },
    PageContentDelta {
        delta: String,
    },
    PageContentCompleted {
        id: PageId,
    },
    PageSectionsCreated {
        sections: Vec<NewSection>,
    },
    PageSectionContentDelta {
        id: SectionId,
        delta: String,
    },
    PageSectionContentCompleted {
        id: SectionId,
    },
    PageCompleted {
        id: PageId,
    },
    #[serde(skip)]
    Unrecognized {
        kind: String,
    },
}

pub const KNOWN_EVENT_TAGS: [&str; 7] = [
    "page_created",
    "page_content_delta",
    "page_content_completed",
    "page_sections_created",
    "page_section_content_delta",
    "page_section_content_completed",
    "page_completed",
];

impl StreamEvent {
    pub fn tag(&self) -> &str {
        match self {
            Self::PageCreated { .. } => "page_created",
            Self::PageContentDelta { .. } => "page_content_delta",
            Self::PageContentCompleted { .. } => "page_content_completed",
            Self::PageSectionsCreated { .. } => "page_sections_created",
            Self::PageSectionContentDelta { .. } => "page_section_content_delta",
            Self::PageSectionContentCompleted { .. } => "page_section_content_completed",
            Self::PageCompleted { .. } => "page_completed",
            Self::Unrecognized { kind } => kind.as_str(),
        }
    }
}

/// What a transport hands the view: an event or its terminal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Event(StreamEvent),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Stream {
        event: StreamEvent,
        received_at: DateTime<Utc>,
    },
    Control(ControlAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Page,
    Sections,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Mount {
        pending_job: Option<JobToken>,
        location_page_id: Option<PageId>,
    },
    StreamFailed {
        message: String,
    },
    PageLoaded(Option<Page>),
    SectionsPageLoaded {
        records: Vec<Section>,
        has_next_page: bool,
        end_cursor: Option<String>,
    },
    FetchFailed {
        stage: FetchStage,
        message: String,
    },
    Stop,
    Reset,
    SectionAdded(Section),
    SectionRemoved(SectionId),
    PageRemoved,
    PushNotice(Notice),
}

impl From<ControlAction> for PageAction {
    fn from(action: ControlAction) -> Self {
        Self::Control(action)
    }
}

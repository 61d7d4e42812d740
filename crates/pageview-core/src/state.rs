use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::config::PageViewConfig;
use crate::error::ViewError;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(PageId);
string_id!(SectionId);
string_id!(UserId);
string_id!(JobToken);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub author_id: UserId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(
        id: PageId,
        author_id: UserId,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author_id,
            title: title.into(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub page_id: PageId,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn empty(id: SectionId, page_id: PageId, title: impl Into<String>) -> Self {
        Self {
            id,
            page_id,
            title: title.into(),
            content: String::new(),
        }
    }
}

/// Sections whose content stream has not reached its completion event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSections {
    ids: BTreeSet<SectionId>,
}

impl PendingSections {
    pub fn insert_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = SectionId>,
    {
        self.ids.extend(ids);
    }

    /// Returns `false` when the id was not pending.
    pub fn remove(&mut self, id: &SectionId) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &SectionId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionId> {
        self.ids.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPhase {
    Uninitialized,
    Converting { job: JobToken },
    LoadingHistorical { page_id: PageId },
    Settled,
}

impl ViewPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Converting { .. } => "converting",
            Self::LoadingHistorical { .. } => "loading-historical",
            Self::Settled => "settled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationFlags {
    pub page_content: bool,
}

impl GenerationFlags {
    pub fn clear_all(&mut self) {
        self.page_content = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    /// Every cursor already sent; a server that hands one back again is cycling.
    pub requested: BTreeSet<String>,
    pub pages_loaded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoticeBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<Notice>,
}

impl NoticeBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, mut notice: Notice) {
        notice.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(notice);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_seq = 1;
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PageViewState {
    pub phase: ViewPhase,
    pub page: Option<Page>,
    pub sections: Vec<Section>,
    pub pending: PendingSections,
    pub current_section: Option<SectionId>,
    pub generating: GenerationFlags,
    pub history: HistoryCursor,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<ViewError>,
    pub notices: NoticeBuffer,
    pub path_prefix: String,
    pub section_page_size: u32,
}

impl PageViewState {
    pub fn new(config: &PageViewConfig) -> Self {
        Self {
            phase: ViewPhase::Uninitialized,
            page: None,
            sections: Vec::new(),
            pending: PendingSections::default(),
            current_section: None,
            generating: GenerationFlags::default(),
            history: HistoryCursor::default(),
            loading: false,
            ready: false,
            error: None,
            notices: NoticeBuffer::new(config.notice_capacity),
            path_prefix: config.path_prefix.clone(),
            section_page_size: config.section_page_size,
        }
    }

    pub fn is_converting(&self) -> bool {
        matches!(self.phase, ViewPhase::Converting { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, ViewPhase::Settled)
    }

    pub fn page_id(&self) -> Option<&PageId> {
        self.page.as_ref().map(|page| &page.id)
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|section| &section.id == id)
    }

    pub fn section_mut(&mut self, id: &SectionId) -> Option<&mut Section> {
        self.sections.iter_mut().find(|section| &section.id == id)
    }

    /// Drops everything accumulated for the current page, keeping configuration.
    pub fn discard(&mut self) {
        self.phase = ViewPhase::Uninitialized;
        self.page = None;
        self.sections.clear();
        self.pending.clear();
        self.current_section = None;
        self.generating.clear_all();
        self.history = HistoryCursor::default();
        self.loading = false;
        self.ready = false;
        self.error = None;
        self.notices.clear();
    }
}

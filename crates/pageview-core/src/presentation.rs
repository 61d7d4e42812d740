use std::time::Duration;
use std::time::Instant;

use crate::error::ViewError;
use crate::state::PageViewState;
use crate::state::SectionId;
use crate::state::UserId;
use crate::state::ViewPhase;

/// Timer used to smooth UI reveals; never consulted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedReveal {
    delay: Duration,
    armed_at: Option<Instant>,
}

impl DelayedReveal {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            armed_at: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        if self.armed_at.is_none() {
            self.armed_at = Some(now);
        }
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn is_revealed(&self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed_at) => now.saturating_duration_since(armed_at) >= self.delay,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorView {
    NotFound,
    Generic { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageViewFlags {
    pub is_loading: bool,
    pub is_ready: bool,
    pub show_stop_control: bool,
    pub is_owner: bool,
    pub is_generating_page: bool,
    pub generating_sections: Vec<SectionId>,
    pub current_section: Option<SectionId>,
    pub show_section_input: bool,
    pub error_view: Option<ErrorView>,
}

pub fn derive_flags(
    state: &PageViewState,
    viewer: Option<&UserId>,
    reveal: &DelayedReveal,
    now: Instant,
) -> PageViewFlags {
    let converting = matches!(state.phase, ViewPhase::Converting { .. });
    let generating_sections: Vec<SectionId> = state
        .sections
        .iter()
        .filter(|section| state.pending.contains(&section.id))
        .map(|section| section.id.clone())
        .collect();
    let error_view = state.error.as_ref().map(|error| match error {
        ViewError::NotFound { .. } => ErrorView::NotFound,
        other => ErrorView::Generic {
            message: other.to_string(),
        },
    });

    PageViewFlags {
        is_loading: state.loading,
        is_ready: state.ready,
        show_stop_control: converting && state.loading && reveal.is_revealed(now),
        is_owner: match (viewer, state.page.as_ref()) {
            (Some(viewer), Some(page)) => &page.author_id == viewer,
            _ => false,
        },
        is_generating_page: state.generating.page_content,
        show_section_input: state.is_settled()
            && state.ready
            && state.page.is_some()
            && state.pending.is_empty()
            && error_view.is_none(),
        generating_sections,
        current_section: state.current_section.clone(),
        error_view,
    }
}

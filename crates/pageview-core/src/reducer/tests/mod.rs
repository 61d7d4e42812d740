use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use pretty_assertions::assert_eq;

pub(super) use super::reduce;
pub(super) use super::PageEffect;
pub(super) use crate::actions::ControlAction;
pub(super) use crate::actions::FetchStage;
pub(super) use crate::actions::NewSection;
pub(super) use crate::actions::PageAction;
pub(super) use crate::actions::StreamEvent;
pub(super) use crate::config::PageViewConfig;
pub(super) use crate::error::ViewError;
pub(super) use crate::state::JobToken;
pub(super) use crate::state::Notice;
pub(super) use crate::state::NoticeBuffer;
pub(super) use crate::state::NoticeLevel;
pub(super) use crate::state::Page;
pub(super) use crate::state::PageId;
pub(super) use crate::state::PageViewState;
pub(super) use crate::state::Section;
pub(super) use crate::state::SectionId;
pub(super) use crate::state::UserId;
pub(super) use crate::state::ViewPhase;

mod mutations;

fn state() -> PageViewState {
    PageViewState::new(&PageViewConfig::default())
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

fn converting() -> PageViewState {
    let mut state = state();
    let effects = control(
        &mut state,
        ControlAction::Mount {
            pending_job: Some(JobToken::from("job-1")),
            location_page_id: None,
        },
    );
    assert_eq!(
        effects,
        vec![
            PageEffect::ClearPendingJob,
            PageEffect::OpenStream {
                job: JobToken::from("job-1")
            }
        ]
    );
    state
}

fn loading(page_id: &str) -> PageViewState {
    let mut state = state();
    control(
        &mut state,
        ControlAction::Mount {
            pending_job: None,
            location_page_id: Some(PageId::from(page_id)),
        },
    );
    state
}

fn stream(state: &mut PageViewState, event: StreamEvent) -> Vec<PageEffect> {
    stream_at(state, event, at(0))
}

fn stream_at(
    state: &mut PageViewState,
    event: StreamEvent,
    received_at: DateTime<Utc>,
) -> Vec<PageEffect> {
    reduce(state, PageAction::Stream { event, received_at })
}

fn control(state: &mut PageViewState, action: ControlAction) -> Vec<PageEffect> {
    reduce(state, PageAction::Control(action))
}

fn created(id: &str, title: &str) -> StreamEvent {
    StreamEvent::PageCreated {
        id: PageId::from(id),
        author_id: UserId::from("author"),
        title: title.to_string(),
    }
}

fn page_delta(delta: &str) -> StreamEvent {
    StreamEvent::PageContentDelta {
        delta: delta.to_string(),
    }
}

fn sections_created(sections: &[(&str, &str)]) -> StreamEvent {
    StreamEvent::PageSectionsCreated {
        sections: sections
            .iter()
            .map(|(id, title)| NewSection {
                id: SectionId::from(*id),
                title: title.to_string(),
            })
            .collect(),
    }
}

fn section_delta(id: &str, delta: &str) -> StreamEvent {
    StreamEvent::PageSectionContentDelta {
        id: SectionId::from(id),
        delta: delta.to_string(),
    }
}

fn section_done(id: &str) -> StreamEvent {
    StreamEvent::PageSectionContentCompleted {
        id: SectionId::from(id),
    }
}

fn page_record(id: &str, title: &str, content: &str) -> Page {
    Page {
        id: PageId::from(id),
        author_id: UserId::from("author"),
        title: title.to_string(),
        content: content.to_string(),
        created_at: at(0),
        updated_at: at(0),
    }
}

fn section_record(page_id: &str, id: &str) -> Section {
    Section {
        id: SectionId::from(id),
        page_id: PageId::from(page_id),
        title: id.to_uppercase(),
        content: format!("{id} body"),
    }
}

fn section_ids(state: &PageViewState) -> Vec<&str> {
    state
        .sections
        .iter()
        .map(|section| section.id.as_str())
        .collect()
}

fn pending_ids(state: &PageViewState) -> Vec<&str> {
    state.pending.iter().map(SectionId::as_str).collect()
}

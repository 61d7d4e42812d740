use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::ControlAction;
use super::actions::FetchStage;
use super::actions::NewSection;
use super::actions::PageAction;
use super::actions::StreamEvent;
use super::error::ViewError;
use super::merge::merge_sections;
use super::slug::page_path;
use super::state::HistoryCursor;
use super::state::JobToken;
use super::state::Notice;
use super::state::NoticeLevel;
use super::state::Page;
use super::state::PageId;
use super::state::PageViewState;
use super::state::Section;
use super::state::ViewPhase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEffect {
    ClearPendingJob,
    OpenStream {
        job: JobToken,
    },
    CloseStream,
    FetchPage {
        page_id: PageId,
    },
    FetchSections {
        page_id: PageId,
        page_size: u32,
        cursor: Option<String>,
    },
    ReplaceLocation {
        page_id: PageId,
        path: String,
    },
    ResetLocation {
        path: String,
    },
}

pub fn reduce(state: &mut PageViewState, action: PageAction) -> Vec<PageEffect> {
    match action {
        PageAction::Stream { event, received_at } => reduce_stream(state, event, received_at),
        PageAction::Control(control) => reduce_control(state, control),
    }
}

fn reduce_stream(
    state: &mut PageViewState,
    event: StreamEvent,
    received_at: DateTime<Utc>,
) -> Vec<PageEffect> {
    if !state.is_converting() {
        debug!(
            event = event.tag(),
            phase = state.phase.label(),
            "dropping stream event outside conversion"
        );
        return Vec::new();
    }

    match event {
        StreamEvent::PageCreated {
            id,
            author_id,
            title,
        } => {
            if let Some(page) = &state.page {
                debug!(existing = %page.id, incoming = %id, "page already created");
                return Vec::new();
            }
            let path = page_path(&state.path_prefix, &title, &id);
            info!(page_id = %id, %path, "page created by stream");
            state.page = Some(Page::new(id.clone(), author_id, title, received_at));
            state.generating.page_content = true;
            state.ready = true;
            vec![PageEffect::ReplaceLocation { page_id: id, path }]
        }
        StreamEvent::PageContentDelta { delta } => {
            match state.page.as_mut() {
                Some(page) => {
                    page.content.push_str(&delta);
                    page.updated_at = received_at;
                }
                None => debug!("content delta before page creation"),
            }
            Vec::new()
        }
        StreamEvent::PageContentCompleted { id } => {
            match state.page.as_ref() {
                Some(page) if page.id == id => state.generating.page_content = false,
                Some(page) => {
                    debug!(expected = %page.id, got = %id, "content completion for another page")
                }
                None => debug!(page_id = %id, "content completion before page creation"),
            }
            Vec::new()
        }
        StreamEvent::PageSectionsCreated { sections } => {
            let Some(page_id) = state.page_id().cloned() else {
                debug!(count = sections.len(), "sections created before page creation");
                return Vec::new();
            };
            state.pending.clear();
            state
                .pending
                .insert_all(sections.iter().map(|section| section.id.clone()));
            state.sections = sections
                .into_iter()
                .map(|NewSection { id, title }| Section::empty(id, page_id.clone(), title))
                .collect();
            state.current_section = None;
            Vec::new()
        }
        StreamEvent::PageSectionContentDelta { id, delta } => {
            match state.section_mut(&id) {
                Some(section) => {
                    section.content.push_str(&delta);
                    state.current_section = Some(id);
                }
                None => debug!(section_id = %id, "delta for unknown section"),
            }
            Vec::new()
        }
        StreamEvent::PageSectionContentCompleted { id } => {
            if !state.pending.remove(&id) {
                debug!(section_id = %id, "section already settled");
            }
            Vec::new()
        }
        StreamEvent::PageCompleted { id } => {
            info!(page_id = %id, "page stream completed");
            settle(state);
            vec![PageEffect::CloseStream]
        }
        StreamEvent::Unrecognized { kind } => {
            debug!(%kind, "ignoring unrecognized stream event");
            Vec::new()
        }
    }
}

fn reduce_control(state: &mut PageViewState, action: ControlAction) -> Vec<PageEffect> {
    match action {
        ControlAction::Mount {
            pending_job,
            location_page_id,
        } => {
            if state.phase != ViewPhase::Uninitialized {
                debug!(phase = state.phase.label(), "view already mounted");
                return Vec::new();
            }
            state.error = None;
            if let Some(job) = pending_job {
                info!(%job, "mounting into conversion");
                state.phase = ViewPhase::Converting { job: job.clone() };
                state.loading = true;
                state.ready = false;
                return vec![PageEffect::ClearPendingJob, PageEffect::OpenStream { job }];
            }
            if let Some(page_id) = location_page_id {
                info!(%page_id, "mounting historical page");
                state.phase = ViewPhase::LoadingHistorical {
                    page_id: page_id.clone(),
                };
                state.loading = true;
                state.ready = false;
                state.history = HistoryCursor::default();
                return vec![PageEffect::FetchPage { page_id }];
            }
            info!("mounting fresh page");
            state.phase = ViewPhase::Settled;
            state.loading = false;
            state.ready = true;
            Vec::new()
        }
        ControlAction::StreamFailed { message } => {
            if !state.is_converting() {
                debug!(%message, "stream error after settle");
                return Vec::new();
            }
            warn!(%message, "stream transport failed");
            settle(state);
            state.error = Some(ViewError::Transport { message });
            vec![PageEffect::CloseStream]
        }
        ControlAction::PageLoaded(record) => {
            let ViewPhase::LoadingHistorical { page_id } = &state.phase else {
                debug!("page record outside historical load");
                return Vec::new();
            };
            let page_id = page_id.clone();
            match record {
                Some(page) => {
                    state.page = Some(page);
                    state.history.requested.clear();
                    vec![PageEffect::FetchSections {
                        page_id,
                        page_size: state.section_page_size,
                        cursor: None,
                    }]
                }
                None => {
                    warn!(%page_id, "page not found");
                    settle(state);
                    state.error = Some(ViewError::NotFound { page_id });
                    Vec::new()
                }
            }
        }
        ControlAction::SectionsPageLoaded {
            records,
            has_next_page,
            end_cursor,
        } => {
            let ViewPhase::LoadingHistorical { page_id } = &state.phase else {
                debug!(count = records.len(), "section page outside historical load");
                return Vec::new();
            };
            let page_id = page_id.clone();
            state.sections = merge_sections(&state.sections, &records);
            state.history.pages_loaded += 1;

            match end_cursor {
                Some(cursor) if has_next_page => {
                    if state.history.requested.contains(&cursor) {
                        warn!(%page_id, %cursor, "section cursor already requested");
                        finish_history(state);
                        return Vec::new();
                    }
                    state.history.requested.insert(cursor.clone());
                    vec![PageEffect::FetchSections {
                        page_id,
                        page_size: state.section_page_size,
                        cursor: Some(cursor),
                    }]
                }
                _ => {
                    finish_history(state);
                    Vec::new()
                }
            }
        }
        ControlAction::FetchFailed { stage, message } => {
            if !matches!(state.phase, ViewPhase::LoadingHistorical { .. }) {
                debug!(%message, "fetch failure outside historical load");
                return Vec::new();
            }
            match stage {
                FetchStage::Page => {
                    warn!(%message, "page fetch failed");
                    settle(state);
                    state.error = Some(ViewError::Fetch { message });
                }
                FetchStage::Sections => {
                    warn!(%message, "section page fetch failed, keeping merged sections");
                    state.notices.push(Notice::new(
                        NoticeLevel::Warn,
                        "Some sections could not be loaded",
                    ));
                    finish_history(state);
                }
            }
            Vec::new()
        }
        ControlAction::Stop => {
            if !state.is_converting() {
                return Vec::new();
            }
            info!("conversion stopped");
            settle(state);
            vec![PageEffect::CloseStream]
        }
        ControlAction::Reset => {
            let was_converting = state.is_converting();
            state.discard();
            if was_converting {
                vec![PageEffect::CloseStream]
            } else {
                Vec::new()
            }
        }
        ControlAction::SectionAdded(section) => {
            state.sections = merge_sections(&state.sections, std::slice::from_ref(&section));
            state.notices.push(Notice::new(
                NoticeLevel::Info,
                format!("Added section \"{}\"", section.title),
            ));
            Vec::new()
        }
        ControlAction::SectionRemoved(id) => {
            state.sections.retain(|section| section.id != id);
            state.pending.remove(&id);
            if state.current_section.as_ref() == Some(&id) {
                state.current_section = None;
            }
            Vec::new()
        }
        ControlAction::PageRemoved => {
            state.page = None;
            state.sections.clear();
            state.pending.clear();
            state.current_section = None;
            state.generating.clear_all();
            vec![PageEffect::ResetLocation {
                path: state.path_prefix.clone(),
            }]
        }
        ControlAction::PushNotice(notice) => {
            state.notices.push(notice);
            Vec::new()
        }
    }
}

/// Leaves accumulated content as is; only the activity markers are cleared.
fn settle(state: &mut PageViewState) {
    state.loading = false;
    state.ready = true;
    state.phase = ViewPhase::Settled;
    state.pending.clear();
    state.current_section = None;
    state.generating.clear_all();
}

fn finish_history(state: &mut PageViewState) {
    info!(
        pages = state.history.pages_loaded,
        sections = state.sections.len(),
        "historical load finished"
    );
    settle(state);
}

#[cfg(test)]
mod tests;

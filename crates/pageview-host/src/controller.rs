use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use chrono::Utc;
use pageview_core::derive_flags;
use pageview_core::reduce;
use pageview_core::wire::EventTranscript;
use pageview_core::ControlAction;
use pageview_core::DelayedReveal;
use pageview_core::FetchStage;
use pageview_core::Notice;
use pageview_core::NoticeLevel;
use pageview_core::PageAction;
use pageview_core::PageEffect;
use pageview_core::PageViewConfig;
use pageview_core::PageViewFlags;
use pageview_core::PageViewState;
use pageview_core::SectionId;
use pageview_core::StreamEvent;
use pageview_core::StreamMessage;
use pageview_core::UserId;
use tracing::info;
use tracing::warn;

use crate::contracts::HistoricalQueries;
use crate::contracts::Location;
use crate::contracts::Mutations;
use crate::contracts::PendingJobSlot;
use crate::contracts::ServiceError;
use crate::contracts::StreamSubscription;
use crate::contracts::StreamTransport;

pub struct Collaborators {
    pub transport: Box<dyn StreamTransport>,
    pub queries: Box<dyn HistoricalQueries>,
    pub mutations: Box<dyn Mutations>,
    pub jobs: Box<dyn PendingJobSlot>,
    pub location: Box<dyn Location>,
}

/// Owns one page view: its state, its single stream subscription, and the collaborators that
/// reducer effects run against.
pub struct PageViewController {
    state: PageViewState,
    collaborators: Collaborators,
    subscription: Option<Box<dyn StreamSubscription>>,
    stop_reveal: DelayedReveal,
    transcript: Option<EventTranscript>,
}

impl PageViewController {
    pub fn new(config: &PageViewConfig, collaborators: Collaborators) -> Self {
        Self {
            state: PageViewState::new(config),
            collaborators,
            subscription: None,
            stop_reveal: DelayedReveal::new(Duration::from_millis(config.reveal_delay_ms)),
            transcript: None,
        }
    }

    /// Records every delivered stream event.
    pub fn with_transcript(mut self, transcript: EventTranscript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn state(&self) -> &PageViewState {
        &self.state
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn flags(&self, viewer: Option<&UserId>, now: Instant) -> PageViewFlags {
        derive_flags(&self.state, viewer, &self.stop_reveal, now)
    }

    pub fn mount(&mut self) {
        let pending_job = self.collaborators.jobs.get();
        let location_page_id = self.collaborators.location.current_page_id();
        self.dispatch(
            ControlAction::Mount {
                pending_job,
                location_page_id,
            }
            .into(),
        );
    }

    /// Pulls one message from the open subscription. Returns `false` when nothing was delivered.
    pub fn poll_stream(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.poll() {
            Some(message) => {
                self.deliver(message);
                true
            }
            None => false,
        }
    }

    /// Drains the subscription until it settles or runs dry; returns messages handled.
    pub fn run_stream(&mut self) -> usize {
        let mut handled = 0;
        while self.state.is_converting() && self.poll_stream() {
            handled += 1;
        }
        handled
    }

    /// Entry point for push-style transports.
    pub fn deliver(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Event(event) => {
                // Events the reducer would drop never reach the transcript.
                if self.state.is_converting() {
                    self.record(&event);
                }
                self.dispatch(PageAction::Stream {
                    event,
                    received_at: Utc::now(),
                });
            }
            StreamMessage::Error(message) => {
                self.dispatch(ControlAction::StreamFailed { message }.into());
            }
        }
    }

    pub fn stop(&mut self) {
        self.dispatch(ControlAction::Stop.into());
    }

    pub fn reset(&mut self) {
        self.dispatch(ControlAction::Reset.into());
    }

    pub fn add_section(&mut self, title: &str) -> bool {
        let title = title.trim();
        let Some(page_id) = self.editable_page_id() else {
            self.notify(NoticeLevel::Warn, "The page is not ready for new sections");
            return false;
        };
        if title.is_empty() {
            self.notify(NoticeLevel::Warn, "A section needs a title");
            return false;
        }
        match self.collaborators.mutations.add_section(&page_id, title) {
            Ok(Some(section)) => {
                info!(section_id = %section.id, %page_id, "section added");
                self.dispatch(ControlAction::SectionAdded(section).into());
                true
            }
            Ok(None) => {
                warn!(%page_id, "add section was not acknowledged");
                self.notify(NoticeLevel::Error, "Could not add the section");
                false
            }
            Err(err) => {
                warn!(%page_id, error = %err, "add section failed");
                self.notify(NoticeLevel::Error, format!("Could not add the section: {err}"));
                false
            }
        }
    }

    /// The section is only removed locally after the service confirms.
    pub fn delete_section(&mut self, section_id: &SectionId) -> bool {
        if self.editable_page_id().is_none() || self.state.section(section_id).is_none() {
            self.notify(NoticeLevel::Warn, "That section cannot be deleted right now");
            return false;
        }
        match self.collaborators.mutations.delete_section(section_id) {
            Ok(true) => {
                info!(%section_id, "section deleted");
                self.dispatch(ControlAction::SectionRemoved(section_id.clone()).into());
                self.notify(NoticeLevel::Info, "Section deleted");
                true
            }
            Ok(false) => {
                warn!(%section_id, "delete section was refused");
                self.notify(NoticeLevel::Error, "Could not delete the section");
                false
            }
            Err(err) => {
                warn!(%section_id, error = %err, "delete section failed");
                self.notify(NoticeLevel::Error, format!("Could not delete the section: {err}"));
                false
            }
        }
    }

    pub fn delete_page(&mut self) -> bool {
        let Some(page_id) = self.editable_page_id() else {
            self.notify(NoticeLevel::Warn, "There is no page to delete");
            return false;
        };
        match self.collaborators.mutations.delete_page(&page_id) {
            Ok(true) => {
                info!(%page_id, "page deleted");
                self.dispatch(ControlAction::PageRemoved.into());
                true
            }
            Ok(false) => {
                warn!(%page_id, "delete page was refused");
                self.notify(NoticeLevel::Error, "Could not delete the page");
                false
            }
            Err(err) => {
                warn!(%page_id, error = %err, "delete page failed");
                self.notify(NoticeLevel::Error, format!("Could not delete the page: {err}"));
                false
            }
        }
    }

    fn editable_page_id(&self) -> Option<pageview_core::PageId> {
        if !self.state.is_settled() || self.state.error.is_some() {
            return None;
        }
        self.state.page_id().cloned()
    }

    fn record(&mut self, event: &StreamEvent) {
        let Some(transcript) = self.transcript.as_mut() else {
            return;
        };
        if let Err(err) = transcript.append(event) {
            warn!(error = %err, path = %transcript.path().display(), "transcript append failed");
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.dispatch(ControlAction::PushNotice(Notice::new(level, message)).into());
    }

    fn dispatch(&mut self, action: PageAction) {
        let mut queue: VecDeque<PageEffect> = reduce(&mut self.state, action).into();
        while let Some(effect) = queue.pop_front() {
            if let Some(next) = self.execute(effect) {
                queue.extend(reduce(&mut self.state, next));
            }
        }
    }

    fn execute(&mut self, effect: PageEffect) -> Option<PageAction> {
        match effect {
            PageEffect::ClearPendingJob => {
                self.collaborators.jobs.clear();
                None
            }
            PageEffect::OpenStream { job } => {
                self.close_stream();
                match self.collaborators.transport.subscribe(&job) {
                    Ok(subscription) => {
                        info!(%job, "stream subscribed");
                        self.subscription = Some(subscription);
                        self.stop_reveal.arm(Instant::now());
                        None
                    }
                    Err(err) => Some(
                        ControlAction::StreamFailed {
                            message: err.to_string(),
                        }
                        .into(),
                    ),
                }
            }
            PageEffect::CloseStream => {
                self.close_stream();
                None
            }
            PageEffect::FetchPage { page_id } => {
                let action = match self
                    .collaborators
                    .queries
                    .list_pages(std::slice::from_ref(&page_id))
                {
                    Ok(pages) => {
                        ControlAction::PageLoaded(pages.into_iter().find(|page| page.id == page_id))
                    }
                    Err(ServiceError::NotFound) => ControlAction::PageLoaded(None),
                    Err(err) => ControlAction::FetchFailed {
                        stage: FetchStage::Page,
                        message: err.to_string(),
                    },
                };
                Some(action.into())
            }
            PageEffect::FetchSections {
                page_id,
                page_size,
                cursor,
            } => {
                let action = match self.collaborators.queries.list_sections(
                    &page_id,
                    page_size,
                    cursor.as_deref(),
                ) {
                    Ok(connection) => ControlAction::SectionsPageLoaded {
                        records: connection.records,
                        has_next_page: connection.has_next_page,
                        end_cursor: connection.end_cursor,
                    },
                    Err(err) => ControlAction::FetchFailed {
                        stage: FetchStage::Sections,
                        message: err.to_string(),
                    },
                };
                Some(action.into())
            }
            PageEffect::ReplaceLocation { page_id, path } => {
                self.collaborators.location.replace(&page_id, &path);
                None
            }
            PageEffect::ResetLocation { path } => {
                self.collaborators.location.reset(&path);
                None
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            info!("stream unsubscribed");
        }
        self.stop_reveal.disarm();
    }
}

impl Drop for PageViewController {
    fn drop(&mut self) {
        self.close_stream();
    }
}

use super::*;
use pretty_assertions::assert_eq;

fn settled_with_sections() -> PageViewState {
    let mut state = loading("1");
    control(
        &mut state,
        ControlAction::PageLoaded(Some(page_record("1", "T", "body"))),
    );
    control(
        &mut state,
        ControlAction::SectionsPageLoaded {
            records: vec![section_record("1", "a"), section_record("1", "b")],
            has_next_page: false,
            end_cursor: None,
        },
    );
    state
}

#[test]
fn added_section_is_appended_once() {
    let mut state = settled_with_sections();

    control(
        &mut state,
        ControlAction::SectionAdded(section_record("1", "c")),
    );
    control(
        &mut state,
        ControlAction::SectionAdded(section_record("1", "c")),
    );

    assert_eq!(section_ids(&state), vec!["a", "b", "c"]);
    assert_eq!(
        state.notices.latest().map(|notice| notice.level),
        Some(NoticeLevel::Info)
    );
}

#[test]
fn removed_section_leaves_list_and_pending_set() {
    let mut state = converting();
    stream(&mut state, created("1", "T"));
    stream(&mut state, sections_created(&[("s1", "A"), ("s2", "B")]));
    stream(&mut state, section_delta("s2", "x"));

    control(
        &mut state,
        ControlAction::SectionRemoved(SectionId::from("s2")),
    );

    assert_eq!(section_ids(&state), vec!["s1"]);
    assert_eq!(pending_ids(&state), vec!["s1"]);
    assert_eq!(state.current_section, None);
}

#[test]
fn failure_notice_leaves_sections_untouched() {
    let mut state = settled_with_sections();
    let before = state.sections.clone();

    control(
        &mut state,
        ControlAction::PushNotice(Notice::new(NoticeLevel::Error, "Could not delete section")),
    );

    assert_eq!(state.sections, before);
    assert_eq!(state.notices.len(), 1);
}

#[test]
fn removed_page_clears_content_and_resets_location() {
    let mut state = settled_with_sections();

    let effects = control(&mut state, ControlAction::PageRemoved);

    assert_eq!(
        effects,
        vec![PageEffect::ResetLocation {
            path: "/page".to_string()
        }]
    );
    assert!(state.page.is_none());
    assert!(state.sections.is_empty());
}

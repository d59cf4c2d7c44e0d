//! Two-state modal presenter.
//!
//! The presenter owns the open/closed state machine and delegates drawing to
//! a [`Surface`], so the same logic drives the terminal renderer in the CLI
//! and a recording surface in tests.

use crate::{GlossaryEntry, GlossaryIndex};

/// What a modal displays. Built from a glossary entry or assembled directly
/// (the feedback form modal does the latter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalContent {
    pub title: String,
    pub category: String,
    pub body: String,
    pub related: Vec<RelatedChip>,
    /// Reference block; omitted from rendering entirely when `None`.
    pub reference: Option<String>,
}

/// A clickable related-term chip. Activating one re-opens the modal with the
/// related entry's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedChip {
    pub key: String,
    pub term: String,
}

impl ModalContent {
    /// Resolves an entry into displayable content. Related keys that do not
    /// resolve are dropped silently.
    pub fn from_entry(entry: &GlossaryEntry) -> Self {
        let related = entry
            .related_terms
            .iter()
            .filter_map(|key| {
                GlossaryIndex::get(key).map(|target| RelatedChip {
                    key: key.clone(),
                    term: target.term.clone(),
                })
            })
            .collect();
        Self {
            title: entry.term.clone(),
            category: entry.category.clone(),
            body: entry.definition.clone(),
            related,
            reference: entry.references.clone(),
        }
    }
}

/// Every way a modal can be dismissed. All of them take the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    CloseButton,
    Backdrop,
    CancelKey,
}

/// Drawing seam between the presenter and whatever displays it.
pub trait Surface {
    fn render(&mut self, content: &ModalContent);
    fn clear_modal(&mut self);
    /// While a modal is open the page behind it must not scroll.
    fn set_scroll_lock(&mut self, locked: bool);
    /// Transient user-facing message outside the modal.
    fn notice(&mut self, text: &str);
}

pub struct ModalPresenter<S: Surface> {
    surface: S,
    open: Option<ModalContent>,
}

impl<S: Surface> ModalPresenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            open: None,
        }
    }

    /// Opens the modal, or replaces its content when one is already open
    /// (related-term navigation keeps the modal up).
    pub fn open(&mut self, content: ModalContent) {
        if self.open.is_none() {
            self.surface.set_scroll_lock(true);
        }
        self.surface.render(&content);
        self.open = Some(content);
    }

    /// Looks up `key` and opens it; an absent key produces a fallback notice
    /// and leaves the state untouched.
    pub fn open_term(&mut self, key: &str) -> bool {
        match GlossaryIndex::get(key) {
            Some(entry) => {
                self.open(ModalContent::from_entry(entry));
                true
            }
            None => {
                self.surface
                    .notice(&format!("No glossary entry found for \"{key}\"."));
                false
            }
        }
    }

    /// Chip activation: same resolution rules as [`Self::open_term`].
    pub fn follow_related(&mut self, key: &str) -> bool {
        self.open_term(key)
    }

    /// Closes the modal. No-op when already closed; every [`CloseReason`]
    /// behaves identically.
    pub fn close(&mut self, _reason: CloseReason) {
        if self.open.take().is_some() {
            self.surface.clear_modal();
            self.surface.set_scroll_lock(false);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&ModalContent> {
        self.open.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records every surface call for assertions.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub rendered: Vec<ModalContent>,
        pub clears: usize,
        pub scroll_locked: bool,
        pub lock_changes: Vec<bool>,
        pub notices: Vec<String>,
    }

    impl Surface for RecordingSurface {
        fn render(&mut self, content: &ModalContent) {
            self.rendered.push(content.clone());
        }

        fn clear_modal(&mut self) {
            self.clears += 1;
        }

        fn set_scroll_lock(&mut self, locked: bool) {
            self.scroll_locked = locked;
            self.lock_changes.push(locked);
        }

        fn notice(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSurface;
    use super::*;

    fn presenter() -> ModalPresenter<RecordingSurface> {
        ModalPresenter::new(RecordingSurface::default())
    }

    #[test]
    fn open_and_close_transitions() {
        let mut modal = presenter();
        assert!(!modal.is_open());
        assert!(modal.open_term("absorbed-dose"));
        assert!(modal.is_open());
        assert!(modal.surface().scroll_locked);

        modal.close(CloseReason::CloseButton);
        assert!(!modal.is_open());
        assert!(!modal.surface().scroll_locked);
        assert_eq!(modal.surface().clears, 1);
    }

    #[test]
    fn every_close_reason_is_equivalent() {
        for reason in [
            CloseReason::CloseButton,
            CloseReason::Backdrop,
            CloseReason::CancelKey,
        ] {
            let mut modal = presenter();
            modal.open_term("sievert");
            modal.close(reason);
            assert!(!modal.is_open());
            assert!(!modal.surface().scroll_locked);
        }
    }

    #[test]
    fn close_when_already_closed_is_a_noop() {
        let mut modal = presenter();
        modal.close(CloseReason::CancelKey);
        assert_eq!(modal.surface().clears, 0);
        assert!(modal.surface().lock_changes.is_empty());
    }

    #[test]
    fn absent_key_shows_fallback_notice_without_opening() {
        let mut modal = presenter();
        assert!(!modal.open_term("no-such-term"));
        assert!(!modal.is_open());
        assert!(modal.surface().notices[0].contains("no-such-term"));
        assert!(modal.surface().lock_changes.is_empty());
    }

    #[test]
    fn related_navigation_replaces_content_and_keeps_modal_open() {
        let mut modal = presenter();
        modal.open_term("absorbed-dose");
        let first = modal.current().unwrap().title.clone();

        let next_key = modal.current().unwrap().related[0].key.clone();
        assert!(modal.follow_related(&next_key));
        assert!(modal.is_open());
        assert_ne!(modal.current().unwrap().title, first);
        // Scroll was locked exactly once across the whole navigation.
        assert_eq!(modal.surface().lock_changes, vec![true]);
        assert_eq!(modal.surface().rendered.len(), 2);
    }

    #[test]
    fn dangling_related_keys_are_skipped() {
        let entry = GlossaryEntry {
            term: "Test Term".to_string(),
            definition: "Body".to_string(),
            category: "fundamental".to_string(),
            related_terms: vec!["absorbed-dose".to_string(), "missing-key".to_string()],
            references: None,
        };
        let content = ModalContent::from_entry(&entry);
        assert_eq!(content.related.len(), 1);
        assert_eq!(content.related[0].key, "absorbed-dose");
        assert!(content.reference.is_none());
    }

    #[test]
    fn reference_block_carries_through_when_present() {
        let entry = GlossaryIndex::get("absorbed-dose").unwrap();
        let content = ModalContent::from_entry(entry);
        assert!(content.reference.as_deref().unwrap().contains("ICRP"));
    }
}

//! Feedback submission workflow.
//!
//! The controller binds a form to its `(section, module)` origin, validates
//! the draft, and dispatches it either into the [`FeedbackStore`] or into an
//! outbound mail composition. Transport is the user's mail client via a
//! `mailto:` URL; nothing here delivers anything.

use crate::feedback::{
    FeedbackCategory, FeedbackRecord, FeedbackStore, NewFeedback, StoreError,
};
use crate::presenter::{CloseReason, ModalContent, ModalPresenter, Surface};
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use thiserror::Error;

/// Where composed feedback mail is addressed. A future ingestion service
/// would consume [`FeedbackStore::export`] instead of replacing this.
pub const FEEDBACK_ADDRESS: &str = "feedback@dosimetry-course.example.org";

/// The `(section, module)` pair identifying where feedback originated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackContext {
    pub section: String,
    pub module: String,
}

impl FeedbackContext {
    pub fn new(section: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            module: module.into(),
        }
    }
}

/// User input as typed so far. Category and message are checked only at
/// dispatch time so the form can be corrected in place.
#[derive(Debug, Clone, Default)]
pub struct FeedbackDraft {
    pub category: Option<FeedbackCategory>,
    pub message: String,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Editing(FeedbackContext),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please choose a feedback category before submitting.")]
    MissingCategory,
    #[error("Please enter a message before submitting.")]
    EmptyMessage,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("The feedback form is not open.")]
    FormClosed,
    #[error("There is no saved feedback to send.")]
    NothingToSend,
}

/// Unsent-record counter shown next to the feedback controls; hidden while
/// nothing is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCounter {
    pub count: usize,
}

impl PendingCounter {
    pub fn visible(&self) -> bool {
        self.count > 0
    }
}

/// Outcome of a successful save-for-later dispatch.
#[derive(Debug, Clone)]
pub struct SavedFeedback {
    pub record: FeedbackRecord,
    pub pending: PendingCounter,
}

/// A composed outbound message. Delivery belongs to the mail client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn mailto_url(&self) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            self.to,
            encode_component(&self.subject),
            encode_component(&self.body)
        )
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Explicit confirmation token for destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum ClearOutcome {
    Cleared { pending: PendingCounter },
    Cancelled,
}

/// Shared-password gate in front of bulk export/clear. Plaintext comparison,
/// no hashing, no rate limiting: this is a convenience latch against stray
/// clicks, not a security boundary.
pub struct AdminGate {
    password: String,
}

impl AdminGate {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn check(&self, candidate: &str) -> bool {
        candidate == self.password
    }
}

pub struct FeedbackController<S: Surface> {
    store: FeedbackStore,
    presenter: ModalPresenter<S>,
    address: String,
    state: FormState,
}

impl<S: Surface> FeedbackController<S> {
    /// Both collaborators are injected so the controller can run against a
    /// recording surface and an ephemeral store in tests.
    pub fn new(store: FeedbackStore, presenter: ModalPresenter<S>) -> Self {
        Self {
            store,
            presenter,
            address: FEEDBACK_ADDRESS.to_string(),
            state: FormState::Idle,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn pending(&self) -> PendingCounter {
        PendingCounter {
            count: self.store.count(),
        }
    }

    /// Opens the form modal bound to `context`. Re-opening while editing just
    /// rebinds the context.
    pub fn open_form(&mut self, context: FeedbackContext) {
        self.presenter.open(form_content(&context));
        self.state = FormState::Editing(context);
    }

    /// Dismisses the form without dispatching anything.
    pub fn cancel(&mut self) {
        self.presenter.close(CloseReason::CancelKey);
        self.state = FormState::Idle;
    }

    /// Validates and stores the draft. On success the modal closes and the
    /// pending counter reflects the new record; on a validation failure the
    /// form stays open for correction and nothing is persisted.
    pub fn save_for_later(&mut self, draft: &FeedbackDraft) -> Result<SavedFeedback, WorkflowError> {
        let context = self.editing_context()?;
        let (category, message) = self.validated(draft)?;
        let record = self.store.add(NewFeedback {
            module: context.module,
            section: context.section,
            category,
            message,
            user_email: normalize_email(draft),
        })?;
        self.finish_dispatch();
        let pending = self.pending();
        self.presenter.surface_mut().notice(&format!(
            "Feedback saved. Unsent feedback: {}.",
            pending.count
        ));
        Ok(SavedFeedback { record, pending })
    }

    /// Validates the draft and composes a single-entry mail message without
    /// touching the store.
    pub fn send_now(&mut self, draft: &FeedbackDraft) -> Result<MailMessage, WorkflowError> {
        let context = self.editing_context()?;
        let (category, message) = self.validated(draft)?;
        let mut body = String::from("--- Feedback 1 ---\n");
        body.push_str(&entry_lines(
            &context.module,
            &context.section,
            category,
            &Utc::now().to_rfc3339(),
            &message,
            normalize_email(draft).as_deref(),
        ));
        let subject = format!(
            "Dosimetry course feedback: {} / {}",
            context.module, context.section
        );
        self.finish_dispatch();
        Ok(MailMessage {
            to: self.address.clone(),
            subject,
            body,
        })
    }

    /// Composes one mail message carrying every saved record, grouped into
    /// `--- Feedback N ---` blocks in submission order.
    pub fn send_all(&self) -> Result<MailMessage, WorkflowError> {
        let records = self.store.records();
        if records.is_empty() {
            return Err(WorkflowError::NothingToSend);
        }
        let mut body = String::new();
        for (n, record) in records.iter().enumerate() {
            if n > 0 {
                body.push('\n');
            }
            body.push_str(&format!("--- Feedback {} ---\n", n + 1));
            body.push_str(&entry_lines(
                &record.module,
                &record.section,
                record.category,
                &record.timestamp,
                &record.message,
                record.user_email.as_deref(),
            ));
        }
        Ok(MailMessage {
            to: self.address.clone(),
            subject: format!("Dosimetry course feedback ({} saved entries)", records.len()),
            body,
        })
    }

    /// Clears every saved record once the user has explicitly confirmed.
    pub fn clear_saved(&mut self, confirmation: Confirmation) -> Result<ClearOutcome, WorkflowError> {
        match confirmation {
            Confirmation::Cancelled => Ok(ClearOutcome::Cancelled),
            Confirmation::Confirmed => {
                self.store.clear()?;
                self.presenter
                    .surface_mut()
                    .notice("All saved feedback cleared.");
                Ok(ClearOutcome::Cleared {
                    pending: self.pending(),
                })
            }
        }
    }

    pub fn presenter(&self) -> &ModalPresenter<S> {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut ModalPresenter<S> {
        &mut self.presenter
    }

    fn editing_context(&self) -> Result<FeedbackContext, WorkflowError> {
        match &self.state {
            FormState::Editing(context) => Ok(context.clone()),
            FormState::Idle => Err(WorkflowError::FormClosed),
        }
    }

    /// Surfaces validation failures as notices so the caller's form stays
    /// open with its input intact.
    fn validated(
        &mut self,
        draft: &FeedbackDraft,
    ) -> Result<(FeedbackCategory, String), WorkflowError> {
        match validate(draft) {
            Ok(valid) => Ok(valid),
            Err(err) => {
                self.presenter.surface_mut().notice(&err.to_string());
                Err(err.into())
            }
        }
    }

    fn finish_dispatch(&mut self) {
        self.presenter.close(CloseReason::CloseButton);
        self.state = FormState::Idle;
    }
}

/// Dispatch precondition: a category is selected and the message is
/// non-empty once trimmed.
pub fn validate(draft: &FeedbackDraft) -> Result<(FeedbackCategory, String), ValidationError> {
    let category = draft.category.ok_or(ValidationError::MissingCategory)?;
    let message = draft.message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok((category, message.to_string()))
}

fn normalize_email(draft: &FeedbackDraft) -> Option<String> {
    draft
        .user_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
}

fn entry_lines(
    module: &str,
    section: &str,
    category: FeedbackCategory,
    date: &str,
    message: &str,
    email: Option<&str>,
) -> String {
    let mut lines = format!(
        "Module: {module}\nSection: {section}\nCategory: {}\nDate: {date}\nMessage: {message}\n",
        category.label()
    );
    if let Some(email) = email {
        lines.push_str(&format!("Email: {email}\n"));
    }
    lines
}

fn form_content(context: &FeedbackContext) -> ModalContent {
    ModalContent {
        title: "Section feedback".to_string(),
        category: format!("{} / {}", context.module, context.section),
        body: "Choose a category, describe the issue or idea, then save it for later or send it now."
            .to_string(),
        related: Vec::new(),
        reference: None,
    }
}

impl fmt::Display for PendingCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsent feedback: {}", self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::test_support::RecordingSurface;

    fn controller() -> FeedbackController<RecordingSurface> {
        FeedbackController::new(
            FeedbackStore::ephemeral(),
            ModalPresenter::new(RecordingSurface::default()),
        )
    }

    fn draft(message: &str) -> FeedbackDraft {
        FeedbackDraft {
            category: Some(FeedbackCategory::TechnicalIssue),
            message: message.to_string(),
            user_email: None,
        }
    }

    #[test]
    fn whitespace_message_rejected_like_empty() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("section-1", "intro"));

        for message in ["", "   ", "\t\n "] {
            let err = ctl.save_for_later(&draft(message)).unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::Validation(ValidationError::EmptyMessage)
            ));
            // Form stays open for correction, nothing was stored.
            assert!(matches!(ctl.state(), FormState::Editing(_)));
            assert_eq!(ctl.pending().count, 0);
        }
    }

    #[test]
    fn missing_category_blocks_dispatch() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("section-1", "intro"));
        let incomplete = FeedbackDraft {
            category: None,
            message: "some message".to_string(),
            user_email: None,
        };
        let err = ctl.save_for_later(&incomplete).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::MissingCategory)
        ));
        let notices = &ctl.presenter().surface().notices;
        assert!(notices.last().unwrap().contains("category"));
    }

    #[test]
    fn dispatch_without_open_form_is_an_error() {
        let mut ctl = controller();
        let err = ctl.save_for_later(&draft("hello")).unwrap_err();
        assert!(matches!(err, WorkflowError::FormClosed));
    }

    #[test]
    fn save_for_later_end_to_end() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("section-2", "bioassay"));
        assert!(ctl.presenter().is_open());

        let saved = ctl
            .save_for_later(&draft("Chart fails to render on narrow screens"))
            .unwrap();

        assert_eq!(saved.record.section, "section-2");
        assert_eq!(saved.record.module, "bioassay");
        assert_eq!(saved.record.category, FeedbackCategory::TechnicalIssue);
        assert_eq!(saved.record.status, "pending");
        assert_eq!(saved.pending.count, 1);
        assert!(saved.pending.visible());
        assert_eq!(saved.pending.to_string(), "Unsent feedback: 1");

        // Modal closed, controller back to idle.
        assert!(!ctl.presenter().is_open());
        assert_eq!(*ctl.state(), FormState::Idle);
    }

    #[test]
    fn counter_hidden_when_store_empty() {
        let ctl = controller();
        assert!(!ctl.pending().visible());
    }

    #[test]
    fn send_now_composes_without_persisting() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("section-3", "units"));
        let mut with_email = draft("Sievert conversion example is wrong");
        with_email.user_email = Some("  learner@example.org  ".to_string());

        let mail = ctl.send_now(&with_email).unwrap();
        assert_eq!(mail.to, FEEDBACK_ADDRESS);
        assert!(mail.subject.contains("units"));
        assert!(mail.body.starts_with("--- Feedback 1 ---\n"));
        assert!(mail.body.contains("Module: units\n"));
        assert!(mail.body.contains("Category: Technical issue\n"));
        assert!(mail.body.contains("Email: learner@example.org\n"));
        assert_eq!(ctl.pending().count, 0);
        assert!(!ctl.presenter().is_open());
    }

    #[test]
    fn send_all_groups_records_in_insertion_order() {
        let mut ctl = controller();
        for (n, section) in ["section-1", "section-2", "section-3"].iter().enumerate() {
            ctl.open_form(FeedbackContext::new(*section, "bioassay"));
            ctl.save_for_later(&draft(&format!("note {n}"))).unwrap();
        }

        let mail = ctl.send_all().unwrap();
        let blocks: Vec<usize> = (1..=3)
            .map(|n| {
                mail.body
                    .find(&format!("--- Feedback {n} ---"))
                    .unwrap_or_else(|| panic!("missing block {n}"))
            })
            .collect();
        assert!(blocks[0] < blocks[1] && blocks[1] < blocks[2]);
        assert_eq!(mail.body.matches("--- Feedback").count(), 3);
        assert!(mail.body.contains("Section: section-1\n"));
        assert!(mail.body.contains("Message: note 2\n"));
        assert!(mail.subject.contains("3 saved entries"));
    }

    #[test]
    fn send_all_with_empty_store_is_typed_error() {
        let ctl = controller();
        assert!(matches!(ctl.send_all(), Err(WorkflowError::NothingToSend)));
    }

    #[test]
    fn mailto_url_percent_encodes_subject_and_body() {
        let mail = MailMessage {
            to: "feedback@example.org".to_string(),
            subject: "two words".to_string(),
            body: "line one\nline two & more".to_string(),
        };
        let url = mail.mailto_url();
        assert!(url.starts_with("mailto:feedback@example.org?subject=two%20words&body="));
        assert!(url.contains("%0A"));
        assert!(url.contains("%26"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn clear_requires_confirmation() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("s", "m"));
        ctl.save_for_later(&draft("keep me")).unwrap();

        let outcome = ctl.clear_saved(Confirmation::Cancelled).unwrap();
        assert!(matches!(outcome, ClearOutcome::Cancelled));
        assert_eq!(ctl.pending().count, 1);

        let outcome = ctl.clear_saved(Confirmation::Confirmed).unwrap();
        match outcome {
            ClearOutcome::Cleared { pending } => {
                assert_eq!(pending.count, 0);
                assert!(!pending.visible());
            }
            ClearOutcome::Cancelled => panic!("expected cleared"),
        }
    }

    #[test]
    fn cancel_closes_without_dispatch() {
        let mut ctl = controller();
        ctl.open_form(FeedbackContext::new("s", "m"));
        ctl.cancel();
        assert_eq!(*ctl.state(), FormState::Idle);
        assert!(!ctl.presenter().is_open());
        assert_eq!(ctl.pending().count, 0);
    }

    #[test]
    fn admin_gate_is_a_plain_comparison() {
        let gate = AdminGate::new("dosimetry2024");
        assert!(gate.check("dosimetry2024"));
        assert!(!gate.check("DOSIMETRY2024"));
        assert!(!gate.check(""));
    }
}

//! Validate/apply/edit state machine for one open document.
//!
//! `ValidationWorkflow` holds no I/O. A request is started with
//! `begin_validate`/`begin_apply`, which hands out a `Ticket`; the response is
//! fed back through `complete_validate`/`complete_apply`. A completion only
//! takes effect when its ticket is the pending one and the document has not
//! been edited since it was issued; anything else is dropped untouched.
//!
//! `Session` binds a workflow to a `Backend` and an `AnnotationSink`. Its
//! methods take `&self`, so an edit can land while a request is in flight on
//! the same thread.

use crate::backend::{ApplyResponse, Backend, BackendError, ValidateMode, ValidateResponse};
use crate::markers::{self, AnnotationSink, SPAN_WIDTH};
use crate::models::{
    Annotation, ConfigurationVersion, Document, Finding, Revision, WorkflowState,
};
use std::cell::{Ref, RefCell};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Validate(ValidateMode),
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identifies one issued request and the revision it was issued against.
pub struct Ticket {
    seq: u64,
    generation: Revision,
    kind: RequestKind,
}

impl Ticket {
    pub fn generation(&self) -> Revision {
        self.generation
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What to send: the ticket plus the snapshot text it covers.
pub struct Request {
    pub ticket: Ticket,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The response was applied; the workflow is now in this state.
    Accepted(WorkflowState),
    /// The response was superseded and ignored.
    Discarded,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("a request is already in flight ({0})")]
    Busy(WorkflowState),
    #[error("cannot {action} while {state}")]
    NotAllowed {
        action: &'static str,
        state: WorkflowState,
    },
}

#[derive(Debug)]
pub struct ValidationWorkflow {
    document: Document,
    state: WorkflowState,
    annotations: Vec<Annotation>,
    last_error: Option<String>,
    applied: Option<ConfigurationVersion>,
    pending: Option<Ticket>,
    next_seq: u64,
    span_width: u32,
}

impl ValidationWorkflow {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            document: Document::new(text),
            state: WorkflowState::Idle,
            annotations: Vec::new(),
            last_error: None,
            applied: None,
            pending: None,
            next_seq: 0,
            span_width: SPAN_WIDTH,
        }
    }

    pub fn with_span_width(mut self, width: u32) -> Self {
        self.span_width = width;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn text(&self) -> &str {
        self.document.text()
    }

    pub fn revision(&self) -> Revision {
        self.document.revision()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Message of the last failed call, if the current state is `Failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Version echoed by the last successful apply, if the state is `Applied`.
    pub fn applied_version(&self) -> Option<&ConfigurationVersion> {
        self.applied.as_ref()
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    /// Replace the text. Always lands in `Idle` with no annotations, and
    /// orphans any request still in flight.
    pub fn edit(&mut self, text: impl Into<String>) -> Revision {
        let rev = self.document.edit(text);
        if self.state != WorkflowState::Idle {
            debug!(from = %self.state, revision = %rev, "edit resets workflow");
        }
        self.reset_outcome();
        self.pending = None;
        self.state = WorkflowState::Idle;
        rev
    }

    fn reset_outcome(&mut self) {
        self.annotations.clear();
        self.last_error = None;
        self.applied = None;
    }

    fn issue(&mut self, kind: RequestKind, next: WorkflowState) -> Request {
        self.next_seq += 1;
        let ticket = Ticket {
            seq: self.next_seq,
            generation: self.revision(),
            kind,
        };
        self.pending = Some(ticket);
        self.state = next;
        info!(state = %next, revision = %ticket.generation, "request issued");
        Request {
            ticket,
            text: self.document.text().to_string(),
        }
    }

    pub fn begin_validate(&mut self, mode: ValidateMode) -> Result<Request, WorkflowError> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy(self.state));
        }
        Ok(self.issue(RequestKind::Validate(mode), WorkflowState::Validating))
    }

    pub fn begin_apply(&mut self) -> Result<Request, WorkflowError> {
        match self.state {
            WorkflowState::Idle | WorkflowState::Valid => {
                Ok(self.issue(RequestKind::Apply, WorkflowState::Applying))
            }
            s if s.is_busy() => Err(WorkflowError::Busy(s)),
            s => Err(WorkflowError::NotAllowed {
                action: "apply",
                state: s,
            }),
        }
    }

    fn take_if_current(&mut self, ticket: &Ticket, apply: bool) -> bool {
        let kind_ok = matches!(
            (ticket.kind, apply),
            (RequestKind::Apply, true) | (RequestKind::Validate(_), false)
        );
        if kind_ok && self.pending == Some(*ticket) && ticket.generation == self.revision() {
            self.pending = None;
            true
        } else {
            debug!(
                generation = %ticket.generation,
                revision = %self.revision(),
                "discarding superseded response"
            );
            false
        }
    }

    fn fail(&mut self, err: &BackendError) {
        let payload = err.payload();
        warn!(error = %payload.message, "request failed");
        self.annotations = if payload.findings.is_empty() {
            Vec::new()
        } else {
            self.assemble(&payload.findings)
        };
        self.last_error = Some(payload.message);
        self.state = WorkflowState::Failed;
    }

    fn assemble(&self, findings: &[Finding]) -> Vec<Annotation> {
        markers::assemble_with_width(self.document.text(), findings, self.span_width)
    }

    pub fn complete_validate(
        &mut self,
        ticket: &Ticket,
        result: Result<ValidateResponse, BackendError>,
    ) -> Completion {
        if !self.take_if_current(ticket, false) {
            return Completion::Discarded;
        }
        self.reset_outcome();
        match result {
            Ok(resp) => {
                let findings = resp.findings();
                if !findings.is_empty() {
                    self.annotations = self.assemble(findings);
                    self.state = WorkflowState::Invalid;
                } else if resp.is_valid {
                    self.state = WorkflowState::Valid;
                } else {
                    // Rejected without details: still point somewhere.
                    self.annotations =
                        self.assemble(&[Finding::message("document rejected by server")]);
                    self.state = WorkflowState::Invalid;
                }
                info!(
                    state = %self.state,
                    findings = self.annotations.len(),
                    "validation finished"
                );
            }
            Err(e) => self.fail(&e),
        }
        Completion::Accepted(self.state)
    }

    pub fn complete_apply(
        &mut self,
        ticket: &Ticket,
        result: Result<ApplyResponse, BackendError>,
    ) -> Completion {
        if !self.take_if_current(ticket, true) {
            return Completion::Discarded;
        }
        self.reset_outcome();
        match result {
            Ok(resp) => {
                info!(version = %resp.applied_version.id, "configuration applied");
                self.applied = Some(resp.applied_version);
                self.state = WorkflowState::Applied;
            }
            Err(e) => self.fail(&e),
        }
        Completion::Accepted(self.state)
    }
}

/// A workflow wired to a backend and a rendering surface.
pub struct Session<B, S> {
    workflow: RefCell<ValidationWorkflow>,
    backend: B,
    sink: RefCell<S>,
}

impl<B: Backend, S: AnnotationSink> Session<B, S> {
    pub fn new(backend: B, sink: S, text: impl Into<String>) -> Self {
        Self::with_workflow(backend, sink, ValidationWorkflow::new(text))
    }

    pub fn with_workflow(backend: B, sink: S, workflow: ValidationWorkflow) -> Self {
        Self {
            workflow: RefCell::new(workflow),
            backend,
            sink: RefCell::new(sink),
        }
    }

    pub fn workflow(&self) -> Ref<'_, ValidationWorkflow> {
        self.workflow.borrow()
    }

    pub fn sink(&self) -> Ref<'_, S> {
        self.sink.borrow()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.borrow().state()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.workflow.borrow().annotations().to_vec()
    }

    pub fn edit(&self, text: impl Into<String>) -> Revision {
        let rev = self.workflow.borrow_mut().edit(text);
        self.sink.borrow_mut().clear_annotations();
        rev
    }

    fn publish(&self, completion: Completion) {
        if let Completion::Accepted(_) = completion {
            let wf = self.workflow.borrow();
            markers::publish(&mut *self.sink.borrow_mut(), wf.annotations());
        }
    }

    pub async fn validate(&self) -> Result<Completion, WorkflowError> {
        self.run_validate(ValidateMode::Persist).await
    }

    pub async fn validate_dry_run(&self) -> Result<Completion, WorkflowError> {
        self.run_validate(ValidateMode::DryRun).await
    }

    async fn run_validate(&self, mode: ValidateMode) -> Result<Completion, WorkflowError> {
        let req = self.workflow.borrow_mut().begin_validate(mode)?;
        let result = self.backend.validate(&req.text, mode).await;
        let completion = self
            .workflow
            .borrow_mut()
            .complete_validate(&req.ticket, result);
        self.publish(completion);
        Ok(completion)
    }

    pub async fn apply(&self) -> Result<Completion, WorkflowError> {
        let req = self.workflow.borrow_mut().begin_apply()?;
        let result = self.backend.apply(&req.text).await;
        let completion = self.workflow.borrow_mut().complete_apply(&req.ticket, result);
        self.publish(completion);
        Ok(completion)
    }

    /// Load a previously applied version into the editor.
    pub async fn restore(&self, id: &str) -> Result<Revision, BackendError> {
        let doc = self.backend.get_version(id).await?;
        info!(version = %doc.version.id, "restoring version");
        Ok(self.edit(doc.text))
    }
}

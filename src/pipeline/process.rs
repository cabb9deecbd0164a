use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::store::DocumentStore;
use crate::core::{CpeError, Document, DocumentState, calculate_totals, validate_document, validation_failure};
use crate::package::pack;
use crate::sunat::SubmissionClient;
use crate::ubl::{self, CdrStatus};
use crate::xmldsig::{self, KeyMaterial};

/// Pipeline step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Validate,
    Convert,
    Serialize,
    Sign,
    Package,
    Submit,
    Response,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Validate => "validate",
            Self::Convert => "convert",
            Self::Serialize => "serialize",
            Self::Sign => "sign",
            Self::Package => "package",
            Self::Submit => "submit",
            Self::Response => "response",
            Self::Store => "store",
        })
    }
}

/// A stage failure with its cause.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: CpeError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: CpeError) -> Self {
        Self { stage, source }
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> AtStage<T> for Result<T, CpeError> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

/// Runs a document through generation, signing, packaging and submission.
///
/// Only the stages the document has not passed yet are executed, so a
/// document saved as `Signed` resumes at packaging.
#[derive(Clone)]
pub struct Pipeline {
    client: SubmissionClient,
    store: Arc<dyn DocumentStore>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(client: SubmissionClient, store: Arc<dyn DocumentStore>) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn client(&self) -> &SubmissionClient {
        &self.client
    }

    /// Advance `document` as far as it can go.
    ///
    /// Validation failures are returned without touching the document. Any
    /// later failure moves it to `Error`, records the message and saves it.
    /// Terminal documents are left alone.
    pub async fn process(
        &self,
        document: &mut Document,
        key: &KeyMaterial,
    ) -> Result<(), PipelineError> {
        if document.state.is_terminal() {
            debug!(document_id = %document.id, state = %document.state, "nothing left to do");
            return Ok(());
        }

        if document.state == DocumentState::Pending {
            let errors = validate_document(document);
            if !errors.is_empty() {
                return Err(PipelineError::new(Stage::Validate, validation_failure(&errors)));
            }
        }

        match self.run_stages(document, key).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    document_id = %document.id,
                    stage = %err.stage,
                    error = %err.source,
                    "pipeline stage failed"
                );
                if !document.state.is_terminal() {
                    document.state = DocumentState::Error;
                    document.status_message = Some(err.to_string());
                    if let Err(e) = self.store.save(document) {
                        warn!(document_id = %document.id, error = %e, "could not persist error state");
                    }
                }
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        document: &mut Document,
        key: &KeyMaterial,
    ) -> Result<(), PipelineError> {
        if document.state == DocumentState::Pending {
            if document.totals.is_none() {
                calculate_totals(document).at(Stage::Convert)?;
            }
            let schema = ubl::convert(document).at(Stage::Convert)?;
            let xml = ubl::serialize(&schema).at(Stage::Serialize)?;
            document.xml = Some(xml);
            self.transition(document, DocumentState::Processing)?;
        }

        if document.state == DocumentState::Processing {
            if document.xml.is_none() {
                document.xml = Some(ubl::to_xml(document).at(Stage::Serialize)?);
            }
            let xml = document.xml.as_deref().unwrap_or_default();
            let signed = xmldsig::sign(xml.as_bytes(), key).at(Stage::Sign)?;
            document.signed_xml = Some(signed);
            self.transition(document, DocumentState::Signed)?;
        }

        if document.state == DocumentState::Signed {
            let signed = document
                .signed_xml
                .as_deref()
                .ok_or_else(|| CpeError::Signing("signed XML missing".into()))
                .at(Stage::Package)?;
            let package = pack(signed.as_bytes(), &document.file_name()).at(Stage::Package)?;
            document.zip = Some(package.zip.clone());

            let outcome = self.client.submit(&package).await.at(Stage::Submit)?;
            document.ticket = outcome.ticket.clone();
            document.cdr = outcome.cdr.clone();
            self.transition(document, DocumentState::Sent)?;
            return self.settle(document, outcome.status, Some(outcome.message));
        }

        if document.state == DocumentState::Sent {
            let (status, message, cdr) = match document.ticket.clone() {
                Some(ticket) => {
                    let out = self.client.query_status(&ticket).await.at(Stage::Response)?;
                    (out.status, out.message, out.cdr)
                }
                None => {
                    let out = self
                        .client
                        .download_cdr(
                            &document.issuer.identity.number,
                            document.document_type.code(),
                            &document.series,
                            &document.number,
                        )
                        .await
                        .at(Stage::Response)?;
                    (out.status, out.message, out.cdr)
                }
            };
            if cdr.is_some() {
                document.cdr = cdr;
            }
            return self.settle(document, status, message);
        }

        Ok(())
    }

    /// Record the business outcome of a sent document. Pending leaves it
    /// `Sent` for a later poll.
    fn settle(
        &self,
        document: &mut Document,
        status: CdrStatus,
        message: Option<String>,
    ) -> Result<(), PipelineError> {
        let next = match status {
            CdrStatus::Accepted => DocumentState::Accepted,
            CdrStatus::Rejected => DocumentState::Rejected,
            CdrStatus::Pending => {
                debug!(document_id = %document.id, "outcome pending, poll the ticket later");
                return Ok(());
            }
        };
        document.status_message = message;
        self.transition(document, next)
    }

    fn transition(&self, document: &mut Document, next: DocumentState) -> Result<(), PipelineError> {
        let from = document.state;
        document.state.advance(next).at(Stage::Store)?;
        debug!(document_id = %document.id, %from, to = %next, "state transition");
        self.store.save(document).at(Stage::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::InMemoryStore;
    use crate::pipeline::test_support::{key, sample_document, sandbox_client};

    #[tokio::test]
    async fn full_run_in_simulation() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(sandbox_client(), store.clone());
        let mut doc = sample_document("F001", "00000001");

        pipeline.process(&mut doc, &key()).await.unwrap();

        assert_eq!(doc.state, DocumentState::Accepted);
        assert!(doc.xml.is_some());
        assert!(doc.signed_xml.is_some());
        assert!(doc.zip.is_some());
        assert_eq!(doc.ticket.as_deref(), Some("123456789"));
        assert_eq!(store.get(&doc.id).unwrap().state, DocumentState::Accepted);
    }

    #[tokio::test]
    async fn resumes_from_signed() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(sandbox_client(), store.clone());
        let mut doc = sample_document("F001", "00000002");
        doc.state = DocumentState::Signed;
        doc.signed_xml = Some("<Invoice></Invoice>".into());

        pipeline.process(&mut doc, &key()).await.unwrap();
        assert_eq!(doc.state, DocumentState::Accepted);
        // XML generation was skipped
        assert!(doc.xml.is_none());
    }

    #[tokio::test]
    async fn validation_failure_does_not_persist() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(sandbox_client(), store.clone());
        let mut doc = sample_document("F001", "00000003");
        doc.issuer.identity.number = "99123456789".into();

        let err = pipeline.process(&mut doc, &key()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert_eq!(doc.state, DocumentState::Pending);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn stage_failure_sets_error_state() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(sandbox_client(), store.clone());
        let mut doc = sample_document("F001", "00000004");
        doc.state = DocumentState::Signed;
        doc.signed_xml = None;

        let err = pipeline.process(&mut doc, &key()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Package);
        assert_eq!(doc.state, DocumentState::Error);
        assert!(doc.status_message.unwrap().starts_with("package stage failed"));
        assert_eq!(store.get(&doc.id).unwrap().state, DocumentState::Error);
    }

    #[tokio::test]
    async fn signing_failure_keeps_generated_xml() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(sandbox_client(), store.clone());
        let mut doc = sample_document("F001", "00000006");
        doc.state = DocumentState::Processing;
        doc.xml = Some("<Invoice><unclosed></Invoice>".into());

        let err = pipeline.process(&mut doc, &key()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Sign);
        assert_eq!(doc.state, DocumentState::Error);
        assert_eq!(doc.xml.as_deref(), Some("<Invoice><unclosed></Invoice>"));
        assert!(doc.signed_xml.is_none());
        let saved = store.get(&doc.id).unwrap();
        assert_eq!(saved.state, DocumentState::Error);
        assert_eq!(saved.xml, doc.xml);
    }

    #[tokio::test]
    async fn terminal_documents_untouched() {
        let pipeline = Pipeline::new(sandbox_client(), Arc::new(InMemoryStore::new()));
        let mut doc = sample_document("F001", "00000005");
        doc.state = DocumentState::Rejected;
        pipeline.process(&mut doc, &key()).await.unwrap();
        assert_eq!(doc.state, DocumentState::Rejected);
        assert!(doc.xml.is_none());
    }
}

use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::SunatConfig;
use super::response::{
    CdrOutcome, StatusOutcome, SubmissionOutcome, process_cdr, process_send_bill, process_status,
};
use super::soap::{SoapOperation, envelope};
use crate::core::CpeError;
use crate::package::{SignedDocumentPackage, validate_package};
use crate::ubl::CdrStatus;

/// Ticket returned by simulated submissions.
pub const SIMULATED_TICKET: &str = "123456789";

/// CDR marker bytes returned by simulated submissions.
pub const SIMULATED_CDR: &[u8] = b"ACEPTADO";

/// SOAP client for the SUNAT billService.
///
/// Transport failures (no HTTP response at all) are retried up to
/// `max_retries` times with a linear backoff. Any HTTP response, including
/// a fault or a non-200 status, is final.
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    config: SunatConfig,
    http: reqwest::Client,
    cancel: Option<watch::Receiver<bool>>,
}

impl SubmissionClient {
    pub fn new(config: SunatConfig) -> Result<Self, CpeError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CpeError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http,
            cancel: None,
        })
    }

    /// Abort requests and retry waits once the channel carries `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &SunatConfig {
        &self.config
    }

    /// Send a signed package (`sendBill`).
    pub async fn submit(
        &self,
        package: &SignedDocumentPackage,
    ) -> Result<SubmissionOutcome, CpeError> {
        validate_package(package)?;

        if self.config.is_simulation() {
            info!(file_name = %package.file_name, "simulation mode, no request sent");
            return Ok(SubmissionOutcome {
                success: true,
                http_status: 200,
                status: CdrStatus::Accepted,
                ticket: Some(SIMULATED_TICKET.to_string()),
                cdr: Some(SIMULATED_CDR.to_vec()),
                cdr_response: None,
                message: "accepted (simulation)".into(),
                timestamp: Utc::now(),
            });
        }

        let op = SoapOperation::SendBill {
            file_name: &package.file_name,
            content: &package.base64,
        };
        let (status, body) = self.call(&op).await?;
        let outcome = process_send_bill(status, &body)?;
        info!(
            file_name = %package.file_name,
            status = ?outcome.status,
            ticket = outcome.ticket.as_deref().unwrap_or(""),
            "sendBill answered"
        );
        Ok(outcome)
    }

    /// Poll an asynchronous ticket (`getStatus`).
    pub async fn query_status(&self, ticket: &str) -> Result<StatusOutcome, CpeError> {
        if ticket.trim().is_empty() {
            return Err(CpeError::Validation("ticket is required".into()));
        }
        if self.config.is_simulation() {
            return Ok(StatusOutcome {
                status_code: "0".into(),
                status: CdrStatus::Accepted,
                cdr: Some(SIMULATED_CDR.to_vec()),
                cdr_response: None,
                message: Some("accepted (simulation)".into()),
                timestamp: Utc::now(),
            });
        }
        let (status, body) = self.call(&SoapOperation::GetStatus { ticket }).await?;
        process_status(status, &body)
    }

    /// Fetch the CDR of an already submitted voucher (`getStatusCdr`).
    pub async fn download_cdr(
        &self,
        ruc: &str,
        type_code: &str,
        series: &str,
        number: &str,
    ) -> Result<CdrOutcome, CpeError> {
        if self.config.is_simulation() {
            return Ok(CdrOutcome {
                status_code: Some("0".into()),
                status: CdrStatus::Accepted,
                cdr: Some(SIMULATED_CDR.to_vec()),
                cdr_response: None,
                message: Some("accepted (simulation)".into()),
                timestamp: Utc::now(),
            });
        }
        let op = SoapOperation::GetStatusCdr {
            ruc,
            type_code,
            series,
            number,
        };
        let (status, body) = self.call(&op).await?;
        process_cdr(status, &body)
    }

    async fn call(&self, op: &SoapOperation<'_>) -> Result<(u16, Vec<u8>), CpeError> {
        let request = envelope(&self.config.username, &self.config.password, op)?;
        let operation = op.name();
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                res = self.send_once(op, &request) => res,
                _ = cancelled(self.cancel.clone()) => {
                    Err(CpeError::Cancelled(format!("{operation} cancelled")))
                }
            };
            match result {
                Ok((status, body)) => {
                    debug!(operation, attempt, status, "response received");
                    return Ok((status, body));
                }
                Err(e) if e.is_retryable() && attempt <= max_retries => {
                    let delay = self.config.retry_base_delay * attempt;
                    warn!(
                        operation,
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transport failure, retrying"
                    );
                    self.pause(operation, delay).await?;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, attempt, error = %e, "giving up after retries");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        op: &SoapOperation<'_>,
        request: &str,
    ) -> Result<(u16, Vec<u8>), CpeError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", op.action())
            .body(request.to_owned())
            .send()
            .await
            .map_err(|e| CpeError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| CpeError::Transport(format!("reading response body: {e}")))?;
        Ok((status, body.to_vec()))
    }

    async fn pause(&self, operation: &str, delay: Duration) -> Result<(), CpeError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancelled(self.cancel.clone()) => {
                Err(CpeError::Cancelled(format!("{operation} retry wait cancelled")))
            }
        }
    }
}

/// Resolves once the channel carries `true`. Never resolves without a
/// channel or after the sender is gone.
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel {
        if rx.wait_for(|c| *c).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::pack;
    use crate::sunat::Environment;

    fn package() -> SignedDocumentPackage {
        pack(b"<Invoice></Invoice>", "20123456789-01-F001-00000001").unwrap()
    }

    #[tokio::test]
    async fn simulation_returns_canned_acceptance() {
        // Unroutable endpoint: any real request would fail.
        let cfg = SunatConfig::sandbox("20123456789").with_endpoint("http://127.0.0.1:1/none");
        let client = SubmissionClient::new(cfg).unwrap();
        let outcome = client.submit(&package()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.ticket.as_deref(), Some(SIMULATED_TICKET));
        assert_eq!(outcome.cdr.as_deref(), Some(SIMULATED_CDR));
        assert_eq!(outcome.status, CdrStatus::Accepted);
    }

    #[tokio::test]
    async fn invalid_package_rejected_before_sending() {
        let client = SubmissionClient::new(SunatConfig::sandbox("20123456789")).unwrap();
        let mut pkg = package();
        pkg.base64.clear();
        assert!(matches!(
            client.submit(&pkg).await,
            Err(CpeError::Packaging { .. })
        ));
    }

    #[tokio::test]
    async fn empty_ticket_is_validation_error() {
        let cfg = SunatConfig::new(Environment::Beta, "20123456789", "u", "p");
        let client = SubmissionClient::new(cfg).unwrap();
        assert!(matches!(
            client.query_status(" ").await,
            Err(CpeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_interrupts_retry_wait() {
        let cfg = SunatConfig::new(Environment::Beta, "20123456789", "u", "p")
            .with_endpoint("http://127.0.0.1:1/none")
            .with_max_retries(5)
            .with_retry_base_delay(Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);
        let client = SubmissionClient::new(cfg).unwrap().with_cancellation(rx);
        tx.send(true).unwrap();
        let err = client.submit(&package()).await.unwrap_err();
        assert!(matches!(err, CpeError::Cancelled(_)));
    }

    #[tokio::test]
    async fn pending_cancel_future_without_channel() {
        let done = tokio::time::timeout(Duration::from_millis(20), cancelled(None)).await;
        assert!(done.is_err());
    }
}

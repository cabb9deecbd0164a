//! SUNAT billService client.
//!
//! Three SOAP operations are supported: `sendBill` for a signed package,
//! `getStatus` to poll a ticket and `getStatusCdr` to fetch the CDR of an
//! earlier submission. Credentials travel in a WS-Security UsernameToken.
//!
//! ```no_run
//! # async fn run(package: comprobante::package::SignedDocumentPackage) -> Result<(), comprobante::core::CpeError> {
//! use comprobante::sunat::{Environment, SubmissionClient, SunatConfig};
//!
//! let config = SunatConfig::new(Environment::Beta, "20123456789", "20123456789USUARIO1", "clave");
//! let client = SubmissionClient::new(config)?;
//! let outcome = client.submit(&package).await?;
//! println!("{:?} {}", outcome.status, outcome.message);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod response;
mod soap;

pub use client::{SIMULATED_CDR, SIMULATED_TICKET, SubmissionClient};
pub use config::{
    BETA_ENDPOINT, Environment, PRODUCTION_ENDPOINT, ParseEnvironmentError, SANDBOX_CREDENTIAL,
    SunatConfig,
};
pub use response::{
    CdrOutcome, StatusOutcome, SubmissionOutcome, decode_cdr, process_cdr, process_send_bill,
    process_status,
};
pub use soap::{SERVICE_NS, SOAP_ENV_NS, SoapOperation, WSSE_NS, envelope};

//! Non-destructive SMTP probe.
//!
//! Determines deliverability without delivering mail: connect to the mail
//! exchanger, `EHLO`, `MAIL FROM` with a constant non-dereferenceable
//! sender, `RCPT TO` for the address under test, then QUIT. The probe never
//! reaches a DATA phase. Outcomes are produced fresh per address and never
//! cached, since mail-server state can change under us.

use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Ehlo, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Severity;
use lettre::Address as SmtpAddress;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Probe-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Connection refused, timed out, or host unresolvable.
    Unreachable,
    /// RCPT TO answered with a permanent 5xx.
    Rejected,
    /// RCPT TO answered with a temporary 4xx (greylisting etc.).
    Temporary,
    /// The handshake broke down before a RCPT verdict.
    ProtocolError,
}

/// Result of probing one recipient at one mail exchanger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub accepted_recipient: bool,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn accepted() -> Self {
        Self {
            reachable: true,
            accepted_recipient: true,
            failure: None,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            accepted_recipient: false,
            failure: Some(ProbeFailure::Unreachable),
        }
    }

    pub fn refused(failure: ProbeFailure) -> Self {
        Self {
            reachable: true,
            accepted_recipient: false,
            failure: Some(failure),
        }
    }
}

/// Tests recipient acceptance at a resolved mail exchanger.
#[async_trait]
pub trait RecipientProbe: Send + Sync {
    async fn probe(&self, mx_host: &str, email: &str) -> ProbeOutcome;
}

/// Transport selection. Constant per deployment, never per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    /// Plaintext SMTP on port 25.
    Plaintext,
    /// Submission port 587 with STARTTLS.
    Starttls,
}

impl TransportPolicy {
    pub fn port(self) -> u16 {
        match self {
            TransportPolicy::Plaintext => 25,
            TransportPolicy::Starttls => 587,
        }
    }
}

/// Probe configuration. The sender must stay a constant,
/// non-dereferenceable address, never a real caller's.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub transport: TransportPolicy,
    /// Connect-and-total budget for one probe.
    pub timeout: Duration,
    /// Fixed local identity for EHLO.
    pub helo_domain: String,
    /// Constant MAIL FROM sender.
    pub sender: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            transport: TransportPolicy::Plaintext,
            timeout: Duration::from_secs(10),
            helo_domain: "verifier.invalid".to_owned(),
            sender: "no-reply@verifier.invalid".to_owned(),
        }
    }
}

/// Production probe over lettre's blocking SMTP client.
///
/// The handshake runs on the blocking thread pool under a total timeout; a
/// timed-out handshake is abandoned and reported unreachable.
pub struct LettreProbe {
    config: ProbeConfig,
}

impl LettreProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RecipientProbe for LettreProbe {
    async fn probe(&self, mx_host: &str, email: &str) -> ProbeOutcome {
        let config = self.config.clone();
        let host = mx_host.to_owned();
        let address = email.to_owned();

        let handshake =
            tokio::task::spawn_blocking(move || run_handshake(&config, &host, &address));

        match tokio::time::timeout(self.config.timeout, handshake).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                warn!(mx_host, error = %join_err, "SMTP probe task failed");
                ProbeOutcome::refused(ProbeFailure::ProtocolError)
            }
            Err(_elapsed) => {
                debug!(mx_host, "SMTP probe timed out");
                ProbeOutcome::unreachable()
            }
        }
    }
}

fn run_handshake(config: &ProbeConfig, mx_host: &str, email: &str) -> ProbeOutcome {
    let recipient = match SmtpAddress::from_str(email) {
        Ok(addr) => addr,
        Err(e) => {
            // The pipeline's syntax stage keeps this from happening; treat a
            // disagreement with lettre's grammar as a protocol-level failure.
            debug!(email, error = %e, "recipient rejected by SMTP address grammar");
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
    };
    let sender = match SmtpAddress::from_str(&config.sender) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(sender = %config.sender, error = %e, "probe sender misconfigured");
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
    };

    let port = config.transport.port();
    let socket_addr = match (mx_host, port).to_socket_addrs().ok().and_then(|mut a| a.next()) {
        Some(addr) => addr,
        None => {
            debug!(mx_host, "could not resolve mail exchanger address");
            return ProbeOutcome::unreachable();
        }
    };

    let tls = match config.transport {
        TransportPolicy::Plaintext => None,
        TransportPolicy::Starttls => match TlsParameters::new(mx_host.to_owned()) {
            Ok(params) => Some(params),
            Err(e) => {
                warn!(mx_host, error = %e, "failed to build TLS parameters");
                return ProbeOutcome::unreachable();
            }
        },
    };

    let helo = ClientId::Domain(config.helo_domain.clone());
    let mut conn = match SmtpConnection::connect(
        socket_addr,
        Some(config.timeout),
        &helo,
        tls.as_ref(),
        None,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            debug!(mx_host, error = %e, "SMTP connection failed");
            return ProbeOutcome::unreachable();
        }
    };

    match conn.command(Ehlo::new(helo.clone())) {
        Ok(response) if response.is_positive() => {}
        Ok(response) => {
            debug!(mx_host, code = %response.code(), "EHLO rejected");
            conn.quit().ok();
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
        Err(e) => {
            debug!(mx_host, error = %e, "EHLO failed");
            conn.quit().ok();
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
    }

    match conn.command(Mail::new(Some(sender), vec![])) {
        Ok(response) if response.is_positive() => {}
        Ok(response) => {
            debug!(mx_host, code = %response.code(), "MAIL FROM rejected");
            conn.quit().ok();
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
        Err(e) => {
            debug!(mx_host, error = %e, "MAIL FROM failed");
            conn.quit().ok();
            return ProbeOutcome::refused(ProbeFailure::ProtocolError);
        }
    }

    let outcome = match conn.command(Rcpt::new(recipient, vec![])) {
        Ok(response) => match response.code().severity {
            Severity::PositiveCompletion => {
                debug!(mx_host, email, "RCPT accepted");
                ProbeOutcome::accepted()
            }
            Severity::TransientNegativeCompletion => {
                debug!(mx_host, email, code = %response.code(), "RCPT deferred (4xx)");
                ProbeOutcome::refused(ProbeFailure::Temporary)
            }
            Severity::PermanentNegativeCompletion => {
                debug!(mx_host, email, code = %response.code(), "RCPT rejected (5xx)");
                ProbeOutcome::refused(ProbeFailure::Rejected)
            }
            Severity::PositiveIntermediate => {
                debug!(mx_host, email, code = %response.code(), "unexpected intermediate RCPT response");
                ProbeOutcome::refused(ProbeFailure::ProtocolError)
            }
        },
        // lettre surfaces negative completions as errors too.
        Err(e) if e.is_permanent() => {
            debug!(mx_host, email, error = %e, "RCPT rejected (5xx)");
            ProbeOutcome::refused(ProbeFailure::Rejected)
        }
        Err(e) if e.is_transient() => {
            debug!(mx_host, email, error = %e, "RCPT deferred (4xx)");
            ProbeOutcome::refused(ProbeFailure::Temporary)
        }
        Err(e) => {
            debug!(mx_host, email, error = %e, "RCPT failed mid-handshake");
            ProbeOutcome::refused(ProbeFailure::ProtocolError)
        }
    };

    // Never proceed toward DATA; the goal is verification, not an
    // accidental send.
    conn.quit().ok();
    outcome
}

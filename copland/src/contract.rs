//! # Measurement contract
//!
//! Module dedicated to the structural verification of measurement
//! contracts. A contract is an XML artifact whose subcontracts are
//! each signed independently; the signature primitive itself is an
//! external collaborator plugged in through the
//! [`SubcontractVerifier`] trait. Whatever goes wrong, verification
//! answers with a verdict, never with a process error.

use std::fmt;

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::{debug, warn};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// Alias for any boxed error, used by signature backends to report
/// their failures through [`Error::VerifySubcontractSignatureError`].
pub type AnyBoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("measurement contract is not valid UTF-8")]
    DecodeContractError(#[source] std::str::Utf8Error),
    #[error("cannot parse contract XML")]
    ParseContractError(#[source] roxmltree::Error),
    #[error("cannot get contract type attribute")]
    GetContractTypeError,
    #[error("not a measurement contract: {0}")]
    ContractTypeError(String),
    #[error("no subcontracts in measurement contract")]
    NoSubcontractsError,
    #[error("subcontract signature verification failed")]
    VerifySubcontractSignatureError(#[source] AnyBoxedError),
}

/// The outcome of a measurement contract verification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// The 5-byte token written on the output channel.
    pub const fn token(self) -> &'static [u8; 5] {
        match self {
            Self::Pass => b"PASS\0",
            Self::Fail => b"FAIL\0",
        }
    }

    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// The signature primitive applied to each subcontract.
pub trait SubcontractVerifier {
    /// Verifies the signature of one subcontract element.
    fn verify(&self, subcontract: Node<'_, '_>) -> Result<()>;
}

fn check_contract(blob: &[u8], verifier: &dyn SubcontractVerifier) -> Result<()> {
    let text = std::str::from_utf8(blob).map_err(Error::DecodeContractError)?;
    let doc = Document::parse(text).map_err(Error::ParseContractError)?;
    let root = doc.root_element();

    let kind = root.attribute("type").ok_or(Error::GetContractTypeError)?;
    if !kind.eq_ignore_ascii_case("measurement") {
        return Err(Error::ContractTypeError(kind.to_owned()));
    }

    let subcontracts: Vec<Node> = if root.has_tag_name("contract") {
        root.children()
            .filter(Node::is_element)
            .filter(|node| node.has_tag_name("subcontract"))
            .collect()
    } else {
        Vec::new()
    };

    if subcontracts.is_empty() {
        return Err(Error::NoSubcontractsError);
    }

    for (i, subcontract) in subcontracts.into_iter().enumerate() {
        verifier.verify(subcontract).map_err(|err| {
            warn!(subcontract = i, "signature for subcontract failed");
            err
        })?;
    }

    Ok(())
}

/// Verifies the signatures and basic structure of a measurement
/// contract.
///
/// The blob must parse as XML, carry a root `type="measurement"`
/// attribute (case-insensitive) and hold at least one
/// `/contract/subcontract` element; every subcontract must pass the
/// signature primitive. Any failure, structural or cryptographic,
/// yields a [`Verdict::Fail`].
pub fn verify_measurement_contract(blob: &[u8], verifier: &dyn SubcontractVerifier) -> Verdict {
    match check_contract(blob, verifier) {
        Ok(()) => Verdict::Pass,
        Err(err) => {
            debug!(?err, "contract failed verification");
            Verdict::Fail
        }
    }
}

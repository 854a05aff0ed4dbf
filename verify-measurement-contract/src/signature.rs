//! # Subcontract signatures
//!
//! Module dedicated to the signature primitive applied to each
//! subcontract of a measurement contract. A subcontract carries a
//! base64 RSA-SSA-PKCS1-v1_5/SHA-256 signature over its text content
//! (the `<signature>` subtree excluded) concatenated with the
//! scenario nonce. The TPM scheme verifies against the AK public
//! key; the OpenSSL scheme verifies against the RSA subject key of
//! the credential shipped inside the subcontract, after checking that
//! the credential was issued by the trusted CA.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use copland::contract::{self, SubcontractVerifier};
use roxmltree::Node;
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, trace};
use x509_parser::{parse_x509_certificate, pem::parse_x509_pem};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read AK public key {1}")]
    ReadAkPubkeyError(#[source] rsa::pkcs8::spki::Error, PathBuf),
    #[error("cannot read CA certificate {1}")]
    ReadCaCertError(#[source] io::Error, PathBuf),
    #[error("cannot parse CA certificate {1}: {0}")]
    ParseCaCertError(String, PathBuf),
    #[error("cannot create credential directory {1}")]
    CreateCredsDirError(#[source] io::Error, PathBuf),
    #[error("cannot write credential file {1}")]
    WriteCredentialError(#[source] io::Error, PathBuf),
    #[error("missing signature element in subcontract")]
    MissingSignatureError,
    #[error("missing credential element in subcontract")]
    MissingCredentialError,
    #[error("cannot decode subcontract signature")]
    DecodeSignatureError(#[source] base64::DecodeError),
    #[error("cannot parse subcontract credential: {0}")]
    ParseCredentialError(String),
    #[error("credential is not issued by the trusted CA: {0}")]
    CredentialChainError(String),
    #[error("cannot extract RSA key from credential")]
    ExtractCredentialKeyError(#[source] rsa::pkcs8::spki::Error),
    #[error("subcontract signature did not verify")]
    VerifySignatureError(#[source] rsa::Error),
}

impl From<Error> for contract::Error {
    fn from(err: Error) -> Self {
        contract::Error::VerifySubcontractSignatureError(Box::new(err))
    }
}

fn collect_text(node: Node, out: &mut String) {
    for child in node.children() {
        if child.is_element() && child.has_tag_name("signature") {
            continue;
        }

        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
        } else if child.is_element() {
            collect_text(child, out);
        }
    }
}

/// The bytes a subcontract signature covers: the subcontract's text
/// content in document order, excluding the signature subtree,
/// followed by the scenario nonce.
fn signed_payload(subcontract: Node, nonce: &str) -> Vec<u8> {
    let mut payload = String::new();
    collect_text(subcontract, &mut payload);
    payload.push_str(nonce);
    payload.into_bytes()
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .filter(Node::is_element)
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
}

fn verify_with_key(subcontract: Node, nonce: &str, key: &RsaPublicKey) -> Result<()> {
    let sig_b64 = child_text(subcontract, "signature").ok_or(Error::MissingSignatureError)?;
    let sig = BASE64
        .decode(sig_b64.trim())
        .map_err(Error::DecodeSignatureError)?;

    let digest = Sha256::digest(signed_payload(subcontract, nonce));

    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &sig)
        .map_err(Error::VerifySignatureError)
}

/// The TPM signature scheme: every subcontract signature must verify
/// against the AK public key.
pub struct TpmVerifier {
    nonce: String,
    ak_pubkey: RsaPublicKey,
}

impl TpmVerifier {
    pub fn new(nonce: impl ToString, akpubkey: &Path) -> Result<Self> {
        let ak_pubkey = RsaPublicKey::read_public_key_pem_file(akpubkey)
            .map_err(|err| Error::ReadAkPubkeyError(err, akpubkey.to_owned()))?;

        Ok(Self {
            nonce: nonce.to_string(),
            ak_pubkey,
        })
    }
}

impl SubcontractVerifier for TpmVerifier {
    fn verify(&self, subcontract: Node<'_, '_>) -> contract::Result<()> {
        trace!("verifying subcontract signature with the TPM scheme");
        verify_with_key(subcontract, &self.nonce, &self.ak_pubkey).map_err(Into::into)
    }
}

/// The OpenSSL signature scheme: every subcontract ships a PEM
/// credential certificate which must be issued by the trusted CA; the
/// subcontract signature must verify against the credential's RSA
/// subject key.
///
/// Credentials are materialised under the scenario's credential
/// scratch directory before parsing.
pub struct OpenSslVerifier {
    nonce: String,
    ca_der: Vec<u8>,
    creds_dir: PathBuf,
    counter: AtomicUsize,
}

impl OpenSslVerifier {
    pub fn new(nonce: impl ToString, cacert: &Path, workdir: &Path) -> Result<Self> {
        let bytes =
            fs::read(cacert).map_err(|err| Error::ReadCaCertError(err, cacert.to_owned()))?;
        let (_, pem) = parse_x509_pem(&bytes)
            .map_err(|err| Error::ParseCaCertError(err.to_string(), cacert.to_owned()))?;
        pem.parse_x509()
            .map_err(|err| Error::ParseCaCertError(err.to_string(), cacert.to_owned()))?;

        let creds_dir = workdir.join("cred");
        fs::create_dir_all(&creds_dir)
            .map_err(|err| Error::CreateCredsDirError(err, creds_dir.clone()))?;

        Ok(Self {
            nonce: nonce.to_string(),
            ca_der: pem.contents,
            creds_dir,
            counter: AtomicUsize::new(0),
        })
    }

    fn check(&self, subcontract: Node) -> Result<()> {
        let cred_pem = child_text(subcontract, "credential")
            .map(str::trim)
            .ok_or(Error::MissingCredentialError)?;

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let cred_path = self.creds_dir.join(format!("subcontract-{n}.pem"));
        debug!(path = %cred_path.display(), "materializing subcontract credential");
        fs::write(&cred_path, cred_pem)
            .map_err(|err| Error::WriteCredentialError(err, cred_path.clone()))?;

        let (_, pem) = parse_x509_pem(cred_pem.as_bytes())
            .map_err(|err| Error::ParseCredentialError(err.to_string()))?;
        let cred = pem
            .parse_x509()
            .map_err(|err| Error::ParseCredentialError(err.to_string()))?;

        let (_, ca) = parse_x509_certificate(&self.ca_der)
            .map_err(|err| Error::ParseCredentialError(err.to_string()))?;

        cred.verify_signature(Some(ca.public_key()))
            .map_err(|err| Error::CredentialChainError(err.to_string()))?;

        let key = RsaPublicKey::from_public_key_der(cred.public_key().raw)
            .map_err(Error::ExtractCredentialKeyError)?;

        verify_with_key(subcontract, &self.nonce, &key)
    }
}

impl SubcontractVerifier for OpenSslVerifier {
    fn verify(&self, subcontract: Node<'_, '_>) -> contract::Result<()> {
        trace!("verifying subcontract signature with the OpenSSL scheme");
        self.check(subcontract).map_err(Into::into)
    }
}

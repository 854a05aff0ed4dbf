//! This ASP reads the measurement contract from `fd_in`, verifies its
//! signatures and basic structure, and writes the verification result
//! (`PASS` or `FAIL`) to `fd_out`.
//!
//! Usage: `verify_measurement_contract_asp <fd_in> <fd_out> <workdir>
//! <nonce> <cacert> <akpubkey> <verify_tpm>`

mod channel;
mod signature;

use std::{fs::File, os::unix::io::FromRawFd, path::PathBuf, process::ExitCode};

use clap::Parser;
use copland::contract::{verify_measurement_contract, Verdict};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum Error {
    #[error("error reading evidence from channel")]
    ReadContractError(#[source] channel::Error),
    #[error("error writing verification result to channel")]
    WriteVerdictError(#[source] channel::Error),
}

impl Error {
    /// The errno-flavoured exit code reported to the supervisor.
    const fn exit_code(&self) -> u8 {
        // EIO
        5
    }
}

/// Verify the signatures and structure of a measurement contract.
#[derive(Parser)]
#[command(name = "verify_measurement_contract_asp")]
struct Cli {
    /// File descriptor the contract is read from.
    #[arg(value_parser = clap::value_parser!(i32).range(0..))]
    fd_in: i32,

    /// File descriptor the verdict token is written to.
    #[arg(value_parser = clap::value_parser!(i32).range(0..))]
    fd_out: i32,

    /// Working directory of the attestation scenario.
    workdir: PathBuf,

    /// Nonce of the attestation scenario.
    nonce: String,

    /// CA certificate used to check subcontract credentials.
    cacert: PathBuf,

    /// AK public key generated by the TPM.
    akpubkey: PathBuf,

    /// 1 to employ TPM-based signature verification, 0 otherwise.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    verify_tpm: u8,
}

impl Cli {
    /// Runs the configured signature scheme over the contract blob.
    ///
    /// A scheme that cannot even be set up (unreadable key or CA
    /// material) fails the contract rather than the process.
    fn verify(&self, blob: &[u8]) -> Verdict {
        if self.verify_tpm == 1 {
            match signature::TpmVerifier::new(&self.nonce, &self.akpubkey) {
                Ok(verifier) => verify_measurement_contract(blob, &verifier),
                Err(err) => {
                    warn!("cannot set up TPM signature verification: {err}");
                    Verdict::Fail
                }
            }
        } else {
            match signature::OpenSslVerifier::new(&self.nonce, &self.cacert, &self.workdir) {
                Ok(verifier) => verify_measurement_contract(blob, &verifier),
                Err(err) => {
                    warn!("cannot set up OpenSSL signature verification: {err}");
                    Verdict::Fail
                }
            }
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    // Safety: the supervisor hands this process exclusive ownership
    // of both inherited descriptors.
    let mut fd_in = unsafe { tokio::fs::File::from_std(File::from_raw_fd(cli.fd_in)) };
    let mut fd_out = unsafe { tokio::fs::File::from_std(File::from_raw_fd(cli.fd_out)) };

    let blob = match channel::read_sized(&mut fd_in, channel::MAX_RECV_BUF_SZ).await {
        Ok(blob) => blob,
        Err(channel::Error::ReadTimeoutError) => {
            warn!("timeout occurred before read could complete");
            Vec::new()
        }
        Err(err) => return Err(Error::ReadContractError(err)),
    };

    debug!(size = blob.len(), "read measurement contract from channel");

    let verdict = cli.verify(&blob);
    info!(%verdict, "contract verification complete");

    channel::write_sized(&mut fd_out, verdict.token())
        .await
        .map_err(Error::WriteVerdictError)?;

    // Both descriptors are closed on drop.
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

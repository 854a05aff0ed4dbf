//! # Channel
//!
//! Module dedicated to the size-prefixed frame protocol spoken over
//! the ASP's inherited pipes: a big-endian `u32` length followed by
//! the payload. Reads run under a single one-shot deadline; a frame
//! cut short by EOF is an error.

use std::{io, time::Duration};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::trace;

/// How long one read may take before it is abandoned.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// The largest frame the ASP accepts on its input channel.
pub const MAX_RECV_BUF_SZ: u32 = i32::MAX as u32;

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read from channel")]
    ReadError(#[source] io::Error),
    #[error("cannot write to channel")]
    WriteError(#[source] io::Error),
    #[error("timeout occurred before read could complete")]
    ReadTimeoutError,
    #[error("EOF encountered before complete buffer read")]
    UnexpectedEofError,
    #[error("announced buffer size {0} exceeds the maximum {1}")]
    BufferTooLargeError(u32, u32),
    #[error("buffer too large to write to channel")]
    OversizedWriteError,
}

fn map_read_err(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEofError
    } else {
        Error::ReadError(err)
    }
}

async fn read_frame<R>(reader: &mut R, max_size: u32) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut size_buf = [0; 4];
    reader
        .read_exact(&mut size_buf)
        .await
        .map_err(map_read_err)?;

    let size = u32::from_be_bytes(size_buf);
    if size > max_size {
        return Err(Error::BufferTooLargeError(size, max_size));
    }

    let mut buf = vec![0; size as usize];
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;

    trace!(size, "read frame from channel");

    Ok(buf)
}

/// Reads one size-prefixed frame from the channel.
///
/// The whole read, length prefix included, runs under a single
/// [`READ_TIMEOUT`] deadline; on expiry whatever arrived is
/// abandoned and [`Error::ReadTimeoutError`] is returned.
pub async fn read_sized<R>(reader: &mut R, max_size: u32) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    timeout(READ_TIMEOUT, read_frame(reader, max_size))
        .await
        .map_err(|_| Error::ReadTimeoutError)?
}

/// Writes one size-prefixed frame to the channel.
pub async fn write_sized<W>(writer: &mut W, buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(buf.len()).map_err(|_| Error::OversizedWriteError)?;

    writer
        .write_all(&size.to_be_bytes())
        .await
        .map_err(Error::WriteError)?;
    writer.write_all(buf).await.map_err(Error::WriteError)?;
    writer.flush().await.map_err(Error::WriteError)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut tx, mut rx) = tokio::io::duplex(64);

        write_sized(&mut tx, b"hello, world!").await.unwrap();
        let frame = read_sized(&mut rx, MAX_RECV_BUF_SZ).await.unwrap();

        assert_eq!(frame, b"hello, world!");
    }

    #[tokio::test]
    async fn empty_frame_round_trip() {
        let (mut tx, mut rx) = tokio::io::duplex(64);

        write_sized(&mut tx, b"").await.unwrap();
        let frame = read_sized(&mut rx, MAX_RECV_BUF_SZ).await.unwrap();

        assert!(frame.is_empty());
    }

    #[tokio::test]
    async fn short_frame_is_an_error() {
        let (mut tx, mut rx) = tokio::io::duplex(64);

        tx.write_all(&8u32.to_be_bytes()).await.unwrap();
        tx.write_all(b"oops").await.unwrap();
        drop(tx);

        assert!(matches!(
            read_sized(&mut rx, MAX_RECV_BUF_SZ).await,
            Err(Error::UnexpectedEofError)
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut tx, mut rx) = tokio::io::duplex(64);

        tx.write_all(&1024u32.to_be_bytes()).await.unwrap();

        assert!(matches!(
            read_sized(&mut rx, 16).await,
            Err(Error::BufferTooLargeError(1024, 16))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn read_times_out_without_data() {
        let (_tx, mut rx) = tokio::io::duplex(64);

        assert!(matches!(
            read_sized(&mut rx, MAX_RECV_BUF_SZ).await,
            Err(Error::ReadTimeoutError)
        ));
    }
}

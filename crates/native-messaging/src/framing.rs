//! Browser native messaging framing: a little-endian `u32` byte length
//! followed by that many bytes of UTF-8 JSON.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from the browser.
pub const MAX_INCOMING_MESSAGE: usize = 64 * 1024 * 1024;
/// Largest frame browsers accept from a native host.
pub const MAX_OUTGOING_MESSAGE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum FramingError {
    #[error("native messaging I/O failed")]
    Io(#[from] io::Error),
    #[error("stream ended in the middle of a frame")]
    Truncated,
    #[error("incoming message of {len} bytes exceeds the limit of {max} bytes")]
    IncomingTooLarge { len: usize, max: usize },
    #[error("outgoing message of {len} bytes exceeds the limit of {max} bytes")]
    OutgoingTooLarge { len: usize, max: usize },
}

/// Reads one frame. `Ok(None)` means the stream ended cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FramingError::Truncated)
            };
        }
        filled += n;
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_INCOMING_MESSAGE {
        return Err(FramingError::IncomingTooLarge {
            len,
            max: MAX_INCOMING_MESSAGE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FramingError::Truncated
        } else {
            FramingError::Io(err)
        }
    })?;
    Ok(Some(body))
}

/// Writes one frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_OUTGOING_MESSAGE {
        return Err(FramingError::OutgoingTooLarge {
            len: payload.len(),
            max: MAX_OUTGOING_MESSAGE,
        });
    }

    writer
        .write_all(&(payload.len() as u32).to_le_bytes())
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

// src/remote/protocol.rs

//! Newline-delimited JSON frames exchanged with a mounted generator.
//!
//! ```text
//! -> {"op":"list"}
//! <- {"status":"entries","paths":["index.html","css/site.css"]}
//! -> {"op":"read","path":"index.html"}
//! <- {"status":"file","data":[60,104,...]}
//! ```

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from a peer, newline included. File contents are
/// encoded as a JSON array, roughly four bytes per byte of data.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    List,
    Read { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Entries { paths: Vec<String> },
    File { data: Vec<u8> },
    Error { message: String },
}

/// Write one frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(frame).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Read one frame. `Ok(None)` means the peer closed the connection.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_frame_limited(reader, MAX_FRAME_BYTES).await
}

/// [`read_frame`] with an explicit size limit. A longer line is
/// `InvalidData`, and nothing past the limit is buffered.
pub async fn read_frame_limited<R, T>(reader: &mut R, limit: usize) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = (&mut *reader)
            .take(limit as u64 + 1)
            .read_line(&mut line)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if read > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {limit} bytes"),
            ));
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

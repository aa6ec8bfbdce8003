// src/remote/client.rs

use std::net::SocketAddr;

use anyhow::anyhow;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::trace;

use crate::errors::Result;
use crate::remote::protocol::{read_frame, write_frame, Request, Response};
use crate::types::BoxFuture;
use crate::vfs::MountSource;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Parent side of the mount connection. Requests are serialized over the
/// single stream.
pub struct RemoteClient {
    peer: SocketAddr,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient").field("peer", &self.peer).finish()
    }
}

impl RemoteClient {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            peer,
            conn: Mutex::new(Connection {
                reader: BufReader::new(read),
                writer,
            }),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let mut conn = self.conn.lock().await;
        trace!(peer = %self.peer, ?request, "remote request");
        write_frame(&mut conn.writer, &request).await?;
        match read_frame(&mut conn.reader).await? {
            Some(response) => Ok(response),
            None => Err(anyhow!("remote {} closed the connection", self.peer).into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        match self.call(Request::List).await? {
            Response::Entries { paths } => Ok(paths),
            Response::Error { message } => Err(anyhow!("list: {message}").into()),
            other => Err(anyhow!("list: unexpected response {other:?}").into()),
        }
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let request = Request::Read {
            path: path.to_string(),
        };
        match self.call(request).await? {
            Response::File { data } => Ok(data),
            Response::Error { message } => Err(anyhow!("read {path}: {message}").into()),
            other => Err(anyhow!("read {path}: unexpected response {other:?}").into()),
        }
    }
}

impl MountSource for RemoteClient {
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(RemoteClient::list(self))
    }

    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(RemoteClient::read(self, path))
    }
}

// src/remote/serve.rs

//! Child side of a remote mount.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::fs::{is_contained, walk_files, FileSystem};
use crate::remote::process::REMOTEFS_ADDR_ENV;
use crate::remote::protocol::{read_frame, write_frame, Request, Response};
use crate::types::BoxFuture;
use crate::vfs::MountSource;

/// Connect back to the parent named by `DEVLOOP_REMOTEFS_ADDR` and serve
/// `source` until the parent disconnects.
pub async fn serve_from_env(source: &dyn MountSource) -> Result<()> {
    let addr = std::env::var(REMOTEFS_ADDR_ENV)
        .map_err(|_| DevloopError::ConfigError(format!("{REMOTEFS_ADDR_ENV} is not set")))?;
    let stream = TcpStream::connect(&addr).await?;
    info!(%addr, "connected to parent");
    serve_connection(stream, source).await
}

/// Answer requests on `stream` until the peer closes it.
pub async fn serve_connection(stream: TcpStream, source: &dyn MountSource) -> Result<()> {
    let (read, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(request) = read_frame::<_, Request>(&mut reader).await? {
        let response = match request {
            Request::List => match source.list().await {
                Ok(paths) => Response::Entries { paths },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
            Request::Read { path } => match source.read(&path).await {
                Ok(data) => Response::File { data },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
        };
        write_frame(&mut writer, &response).await?;
    }

    debug!("parent closed the connection");
    Ok(())
}

/// Serves the files below a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl DirSource {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self { fs, dir: dir.into() }
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel = Path::new(rel);
        if !is_contained(rel) {
            return Err(anyhow!("path {} escapes the served directory", rel.display()).into());
        }
        Ok(self.dir.join(rel))
    }
}

impl MountSource for DirSource {
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            if !self.fs.is_dir(&self.dir) {
                return Ok(Vec::new());
            }
            Ok(walk_files(self.fs.as_ref(), &self.dir)?)
        })
    }

    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let full = self.resolve(path)?;
            Ok(self.fs.read(&full)?)
        })
    }
}

//! The single backend seat shared by every request

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::path::{self, ROOT};
use super::traits::{BackendEntry, BackendError, Connector, FtpConnection};

type Slot = Option<Box<dyn FtpConnection>>;

/// One command against the connection, replayable after a reconnect
enum Command<'a> {
    List(&'a str),
    Retrieve(&'a str),
    Store(&'a str, &'a [u8]),
    Delete(&'a str),
    EnsureDir(&'a str),
    RemoveDir(&'a str),
}

enum Reply {
    Entries(Vec<BackendEntry>),
    Data(Bytes),
    Done,
}

impl Command<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::List(_) => "LIST",
            Self::Retrieve(_) => "RETR",
            Self::Store(..) => "STOR",
            Self::Delete(_) => "DELE",
            Self::EnsureDir(_) => "MKD",
            Self::RemoveDir(_) => "RMD",
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::List(p)
            | Self::Retrieve(p)
            | Self::Store(p, _)
            | Self::Delete(p)
            | Self::EnsureDir(p)
            | Self::RemoveDir(p) => p,
        }
    }

    async fn run(&self, conn: &mut dyn FtpConnection) -> Result<Reply, BackendError> {
        match *self {
            Self::List(p) => conn.list(p).await.map(Reply::Entries),
            Self::Retrieve(p) => conn.retrieve(p).await.map(Reply::Data),
            Self::Store(p, data) => conn.store(p, data).await.map(|()| Reply::Done),
            Self::Delete(p) => conn.delete(p).await.map(|()| Reply::Done),
            Self::EnsureDir(p) => conn.create_dir_if_absent(p).await.map(|()| Reply::Done),
            Self::RemoveDir(p) => conn.remove_dir(p).await.map(|()| Reply::Done),
        }
    }
}

/// Owns the FTP connection and its reconnect policy.
///
/// Every operation holds the session lock for its whole duration, so
/// concurrent requests reach the backend one round trip at a time.
pub struct BackendSession {
    connector: Arc<dyn Connector>,
    conn: Mutex<Slot>,
}

impl BackendSession {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            conn: Mutex::new(None),
        }
    }

    /// Open the connection unless one is already live
    pub async fn connect(&self) -> Result<(), BackendError> {
        let mut slot = self.conn.lock().await;
        self.connection(&mut slot).await.map(|_| ())
    }

    /// Entries of a directory, without `.` and `..`
    pub async fn list(&self, path: &str) -> Result<Vec<BackendEntry>, BackendError> {
        let path = path::normalize(path);
        let mut slot = self.conn.lock().await;
        match self.execute(&mut slot, &Command::List(&path)).await? {
            Reply::Entries(entries) => Ok(entries
                .into_iter()
                .filter(|e| e.name != "." && e.name != "..")
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// The whole object, read under the session lock. Memory use per request
    /// is the object size.
    pub async fn get(&self, path: &str) -> Result<Bytes, BackendError> {
        let path = path::normalize(path);
        let mut slot = self.conn.lock().await;
        match self.execute(&mut slot, &Command::Retrieve(&path)).await? {
            Reply::Data(data) => Ok(data),
            _ => Ok(Bytes::new()),
        }
    }

    /// Store `data`, creating any missing ancestor directories first
    pub async fn put(&self, path: &str, data: Bytes) -> Result<(), BackendError> {
        let path = path::normalize(path);
        let mut slot = self.conn.lock().await;
        if let Some(parent) = path::parent(&path) {
            self.ensure_dirs(&mut slot, parent).await?;
        }
        self.execute(&mut slot, &Command::Store(&path, &data))
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let path = path::normalize(path);
        let mut slot = self.conn.lock().await;
        self.execute(&mut slot, &Command::Delete(&path))
            .await
            .map(|_| ())
    }

    /// Create a directory and all of its ancestors
    pub async fn create_dir_all(&self, path: &str) -> Result<(), BackendError> {
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Ok(());
        }
        let mut slot = self.conn.lock().await;
        self.ensure_dirs(&mut slot, &path).await
    }

    pub async fn remove_dir(&self, path: &str) -> Result<(), BackendError> {
        let path = path::normalize(path);
        let mut slot = self.conn.lock().await;
        self.execute(&mut slot, &Command::RemoveDir(&path))
            .await
            .map(|_| ())
    }

    /// Send QUIT and drop the connection
    pub async fn close(&self) {
        let mut slot = self.conn.lock().await;
        if let Some(mut conn) = slot.take() {
            match conn.quit().await {
                Ok(()) => info!("Closed FTP connection"),
                Err(e) => debug!(error = %e, "QUIT failed"),
            }
        }
    }

    /// Walk `dir` from the top, listing each ancestor and creating the ones
    /// that do not exist yet.
    async fn ensure_dirs(&self, slot: &mut Slot, dir: &str) -> Result<(), BackendError> {
        for current in path::ancestors(dir) {
            if current == ROOT {
                continue;
            }
            match self.execute(slot, &Command::List(current)).await {
                Ok(_) => debug!(path = %current, "Directory exists"),
                Err(err) => {
                    debug!(path = %current, error = %err, "Creating directory");
                    self.execute(slot, &Command::EnsureDir(current)).await?;
                }
            }
        }
        Ok(())
    }

    async fn connection<'s>(
        &self,
        slot: &'s mut Slot,
    ) -> Result<&'s mut Box<dyn FtpConnection>, BackendError> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.connector.connect().await?,
        };
        Ok(slot.insert(conn))
    }

    /// Run a command, reconnecting and retrying once if it fails transiently.
    /// A second transient failure leaves the session disconnected.
    async fn execute(&self, slot: &mut Slot, command: &Command<'_>) -> Result<Reply, BackendError> {
        let conn = self.connection(slot).await?;
        let err = match command.run(conn.as_mut()).await {
            Err(err) if err.is_transient() => err,
            other => return other,
        };

        warn!(
            command = command.name(),
            path = %command.path(),
            error = %err,
            "Transient FTP failure, reconnecting"
        );
        if let Some(mut stale) = slot.take() {
            let _ = stale.quit().await;
        }

        let conn = self.connection(slot).await?;
        let result = command.run(conn.as_mut()).await;
        if matches!(&result, Err(e) if e.is_transient()) {
            slot.take();
        }
        result
    }
}

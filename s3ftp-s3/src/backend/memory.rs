//! In-memory FTP server
//!
//! Behaves like a small FTP server behind the same traits as the real
//! transport: failures are produced as FTP replies and classified the same
//! way. Faults can be queued per command so reconnect behaviour is testable.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::path::{self, is_root};
use super::traits::{BackendEntry, BackendError, Connector, FtpConnection};

/// Command a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Connect,
    List,
    Retrieve,
    Store,
    Delete,
    MakeDir,
    RemoveDir,
}

#[derive(Default)]
struct Filesystem {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, (Bytes, DateTime<Utc>)>,
}

impl Filesystem {
    fn is_dir(&self, path: &str) -> bool {
        is_root(path) || self.dirs.contains(path)
    }

    fn exists(&self, path: &str) -> bool {
        self.is_dir(path) || self.files.contains_key(path)
    }

    fn parent_is_dir(&self, path: &str) -> bool {
        self.is_dir(path::parent(path).unwrap_or(path::ROOT))
    }

    fn children(&self, dir: &str) -> Vec<BackendEntry> {
        let in_dir = |p: &str| path::parent(p).unwrap_or(path::ROOT) == dir;

        let dirs = self.dirs.iter().filter(|d| in_dir(d.as_str())).map(|d| BackendEntry {
            name: path::base_name(d).to_string(),
            size: 0,
            modified: Utc::now(),
            is_dir: true,
        });
        let files = self
            .files
            .iter()
            .filter(|(f, _)| in_dir(f.as_str()))
            .map(|(f, (data, modified))| file_entry(f, data, *modified));

        dirs.chain(files).collect()
    }
}

fn file_entry(path: &str, data: &Bytes, modified: DateTime<Utc>) -> BackendEntry {
    BackendEntry {
        name: path::base_name(path).to_string(),
        size: data.len() as u64,
        modified,
        is_dir: false,
    }
}

struct Inner {
    fs: Mutex<Filesystem>,
    faults: Mutex<HashMap<FaultPoint, VecDeque<BackendError>>>,
    login: Option<(String, String)>,
    unavailable: AtomicBool,
    connects: AtomicUsize,
    mkdirs: AtomicUsize,
}

/// Shared in-memory server; clones see the same files
#[derive(Clone)]
pub struct MemoryFtp {
    inner: Arc<Inner>,
}

impl Default for MemoryFtp {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFtp {
    /// A server that accepts any login
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A server that only accepts the given login
    pub fn with_login(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::build(Some((user.into(), password.into())))
    }

    fn build(login: Option<(String, String)>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fs: Mutex::new(Filesystem::default()),
                faults: Mutex::new(HashMap::new()),
                login,
                unavailable: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                mkdirs: AtomicUsize::new(0),
            }),
        }
    }

    /// Log in as `user`; the connection is then served by this server
    pub fn login(&self, user: &str, password: &str) -> Result<MemoryConnection, BackendError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("connection refused".to_string()));
        }
        if let Some(err) = self.take_fault(FaultPoint::Connect) {
            return Err(err);
        }
        if let Some((expected_user, expected_password)) = &self.inner.login {
            if expected_user != user || expected_password != password {
                return Err(BackendError::from_reply(530, "Login incorrect."));
            }
        }
        Ok(MemoryConnection {
            server: self.clone(),
            open: true,
        })
    }

    /// Queue `err` as the next result of `point`
    pub fn inject(&self, point: FaultPoint, err: BackendError) {
        self.inner
            .faults
            .lock()
            .entry(point)
            .or_default()
            .push_back(err);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Connection attempts so far, failed ones included
    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Directories actually created
    pub fn mkdirs(&self) -> usize {
        self.inner.mkdirs.load(Ordering::SeqCst)
    }

    /// Place a file, creating its parent directories
    pub fn seed_file(&self, path: &str, data: impl Into<Bytes>) {
        self.seed_file_at(path, data, Utc::now());
    }

    pub fn seed_file_at(&self, path: &str, data: impl Into<Bytes>, modified: DateTime<Utc>) {
        let path = path::normalize(path);
        let mut fs = self.inner.fs.lock();
        if let Some(parent) = path::parent(&path) {
            for dir in path::ancestors(parent) {
                fs.dirs.insert(dir.to_string());
            }
        }
        fs.files.insert(path, (data.into(), modified));
    }

    pub fn seed_dir(&self, path: &str) {
        let path = path::normalize(path);
        if is_root(&path) {
            return;
        }
        let mut fs = self.inner.fs.lock();
        for dir in path::ancestors(&path) {
            fs.dirs.insert(dir.to_string());
        }
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        let path = path::normalize(path);
        self.inner.fs.lock().files.get(&path).map(|(data, _)| data.clone())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.inner.fs.lock().is_dir(&path::normalize(path))
    }

    fn take_fault(&self, point: FaultPoint) -> Option<BackendError> {
        self.inner
            .faults
            .lock()
            .get_mut(&point)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl Connector for MemoryFtp {
    async fn connect(&self) -> Result<Box<dyn FtpConnection>, BackendError> {
        let conn = self.login("anonymous", "")?;
        Ok(Box::new(conn))
    }
}

/// Connector that logs in with fixed credentials
pub struct MemoryConnector {
    server: MemoryFtp,
    user: String,
    password: String,
}

impl MemoryConnector {
    pub fn new(server: MemoryFtp, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server,
            user: user.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn FtpConnection>, BackendError> {
        let conn = self.server.login(&self.user, &self.password)?;
        Ok(Box::new(conn))
    }
}

/// A logged-in session on a [`MemoryFtp`]
pub struct MemoryConnection {
    server: MemoryFtp,
    open: bool,
}

impl MemoryConnection {
    fn begin(&self, point: FaultPoint) -> Result<(), BackendError> {
        if !self.open {
            return Err(BackendError::Transient("connection closed".to_string()));
        }
        match self.server.take_fault(point) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found() -> BackendError {
        BackendError::from_reply(550, "No such file or directory")
    }
}

#[async_trait]
impl FtpConnection for MemoryConnection {
    async fn list(&mut self, path: &str) -> Result<Vec<BackendEntry>, BackendError> {
        self.begin(FaultPoint::List)?;
        let fs = self.server.inner.fs.lock();
        if fs.is_dir(path) {
            return Ok(fs.children(path));
        }
        match fs.files.get(path) {
            Some((data, modified)) => Ok(vec![file_entry(path, data, *modified)]),
            None => Err(Self::not_found()),
        }
    }

    async fn retrieve(&mut self, path: &str) -> Result<Bytes, BackendError> {
        self.begin(FaultPoint::Retrieve)?;
        let fs = self.server.inner.fs.lock();
        match fs.files.get(path) {
            Some((data, _)) => Ok(data.clone()),
            None => Err(Self::not_found()),
        }
    }

    async fn store(&mut self, path: &str, data: &[u8]) -> Result<(), BackendError> {
        self.begin(FaultPoint::Store)?;
        let mut fs = self.server.inner.fs.lock();
        if is_root(path) || fs.is_dir(path) || !fs.parent_is_dir(path) {
            return Err(BackendError::from_reply(553, "Could not create file."));
        }
        fs.files
            .insert(path.to_string(), (Bytes::copy_from_slice(data), Utc::now()));
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<(), BackendError> {
        self.begin(FaultPoint::Delete)?;
        let mut fs = self.server.inner.fs.lock();
        match fs.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(Self::not_found()),
        }
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), BackendError> {
        self.begin(FaultPoint::MakeDir)?;
        let mut fs = self.server.inner.fs.lock();
        if fs.exists(path) {
            return Err(BackendError::from_reply(
                550,
                "Create directory operation failed: File exists",
            ));
        }
        if !fs.parent_is_dir(path) {
            return Err(Self::not_found());
        }
        fs.dirs.insert(path.to_string());
        self.server.inner.mkdirs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_dir(&mut self, path: &str) -> Result<(), BackendError> {
        self.begin(FaultPoint::RemoveDir)?;
        let mut fs = self.server.inner.fs.lock();
        if is_root(path) || !fs.dirs.contains(path) {
            return Err(Self::not_found());
        }
        if !fs.children(path).is_empty() {
            return Err(BackendError::from_reply(550, "Directory not empty"));
        }
        fs.dirs.remove(path);
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BackendError> {
        self.open = false;
        Ok(())
    }
}

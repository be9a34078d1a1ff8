//! FTP transport over suppaftp

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use suppaftp::list::File;
use suppaftp::tokio::AsyncFtpStream;
use suppaftp::types::FileType;
use suppaftp::FtpError;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tracing::{debug, info};

use super::path::is_root;
use super::traits::{BackendEntry, BackendError, Connector, FtpConnection};

const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Where and how to log in
#[derive(Debug, Clone)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl FtpSettings {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Dials a real FTP server
pub struct FtpConnector {
    settings: FtpSettings,
}

impl FtpConnector {
    pub fn new(settings: FtpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self) -> Result<Box<dyn FtpConnection>, BackendError> {
        let address = self.settings.address();
        debug!(address = %address, "Connecting to FTP server");

        let mut stream = match timeout(
            self.settings.connect_timeout,
            AsyncFtpStream::connect(address.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(BackendError::Unavailable(e.to_string())),
            Err(_) => {
                return Err(BackendError::Unavailable(format!(
                    "timed out connecting to {}",
                    address
                )))
            }
        };

        if let Err(e) = stream
            .login(self.settings.user.as_str(), self.settings.password.as_str())
            .await
        {
            let _ = timeout(QUIT_TIMEOUT, stream.quit()).await;
            return Err(BackendError::AuthFailed(e.to_string()));
        }

        stream
            .transfer_type(FileType::Binary)
            .await
            .map_err(classify)?;

        info!(address = %address, user = %self.settings.user, "Connected to FTP server");
        Ok(Box::new(FtpStreamConnection { stream }))
    }
}

struct FtpStreamConnection {
    stream: AsyncFtpStream,
}

#[async_trait]
impl FtpConnection for FtpStreamConnection {
    async fn list(&mut self, path: &str) -> Result<Vec<BackendEntry>, BackendError> {
        let arg = if is_root(path) { None } else { Some(path) };
        let lines = self.stream.list(arg).await.map_err(classify)?;
        Ok(lines.iter().filter_map(|line| parse_line(line)).collect())
    }

    async fn retrieve(&mut self, path: &str) -> Result<Bytes, BackendError> {
        let mut data_stream = self.stream.retr_as_stream(path).await.map_err(classify)?;
        let mut data = Vec::new();
        data_stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| BackendError::from_io(&e))?;
        self.stream
            .finalize_retr_stream(data_stream)
            .await
            .map_err(classify)?;
        Ok(Bytes::from(data))
    }

    async fn store(&mut self, path: &str, data: &[u8]) -> Result<(), BackendError> {
        let mut reader = data;
        let written = self
            .stream
            .put_file(path, &mut reader)
            .await
            .map_err(classify)?;
        debug!(path = %path, bytes = written, "Stored file");
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<(), BackendError> {
        self.stream.rm(path).await.map_err(classify)
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), BackendError> {
        self.stream.mkdir(path).await.map_err(classify)
    }

    async fn remove_dir(&mut self, path: &str) -> Result<(), BackendError> {
        self.stream.rmdir(path).await.map_err(classify)
    }

    async fn quit(&mut self) -> Result<(), BackendError> {
        match timeout(QUIT_TIMEOUT, self.stream.quit()).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(BackendError::Transient("timed out sending QUIT".to_string())),
        }
    }
}

/// Map a suppaftp error onto the backend classification
fn classify(err: FtpError) -> BackendError {
    match err {
        FtpError::ConnectionError(e) => BackendError::from_io(&e),
        FtpError::UnexpectedResponse(response) => BackendError::from_reply(
            response.status.code(),
            &String::from_utf8_lossy(&response.body),
        ),
        other => BackendError::from_text(other.to_string()),
    }
}

/// Whether a LIST line has the field layout of an entry: nine or more
/// fields led by a permission string (UNIX), or four or more led by a
/// `MM-DD-YY` date (DOS). Header lines such as `total 12` match neither.
fn has_entry_shape(line: &str) -> bool {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = fields.first() else {
        return false;
    };

    let unix = fields.len() >= 9
        && first.len() == 10
        && first.starts_with(['-', 'd', 'l', 'b', 'c', 'p', 's']);
    let dos = fields.len() >= 4
        && first.contains('-')
        && first.chars().all(|c| c.is_ascii_digit() || c == '-');
    unix || dos
}

/// Parse one LIST line (UNIX or DOS format)
fn parse_line(line: &str) -> Option<BackendEntry> {
    if !has_entry_shape(line) {
        debug!(line = %line, "Skipping LIST line that is not an entry");
        return None;
    }
    match File::from_str(line) {
        Ok(file) => Some(BackendEntry {
            name: file.name().to_string(),
            size: file.size() as u64,
            modified: DateTime::<Utc>::from(file.modified()),
            is_dir: file.is_directory(),
        }),
        Err(e) => {
            debug!(line = %line, error = %e, "Skipping unparseable LIST line");
            None
        }
    }
}

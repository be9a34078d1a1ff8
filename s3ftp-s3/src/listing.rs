//! Translation of backend directories into S3 listings

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::backend::path::{self, is_root};
use crate::backend::{BackendEntry, BackendError, BackendSession};

/// The one bucket the backend root is exposed as
pub const BUCKET: &str = "default";

/// MD5 of the empty string. No content hashing is done, every object gets it.
pub const EMPTY_ETAG: &str = "\"d41d8cd98f00b204e9800998ecf8427e\"";

pub const STORAGE_CLASS: &str = "STANDARD";

pub const MAX_KEYS: usize = 1000;

/// Prefix and delimiter of a listing call
#[derive(Debug, Clone, Default)]
pub struct ListingRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
}

impl ListingRequest {
    /// An empty delimiter counts as none
    pub fn new(prefix: Option<String>, delimiter: Option<String>) -> Self {
        Self {
            bucket: BUCKET.to_string(),
            prefix: prefix.unwrap_or_default(),
            delimiter: delimiter.filter(|d| !d.is_empty()),
        }
    }
}

/// Which response shape the listing is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStyle {
    /// ListObjects: flat, no grouping
    V1,
    /// ListObjectsV2: grouped by delimiter
    V2,
}

/// An object as clients see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: &'static str,
    pub storage_class: &'static str,
}

#[derive(Debug, Default)]
pub struct Listing {
    pub objects: Vec<VirtualObject>,
    pub common_prefixes: Vec<String>,
}

impl Listing {
    pub fn key_count(&self) -> usize {
        self.objects.len() + self.common_prefixes.len()
    }
}

/// Backend directory a prefix lists: the prefix without its trailing `/`
pub fn directory_for_prefix(prefix: &str) -> String {
    path::normalize(prefix.strip_suffix('/').unwrap_or(prefix))
}

/// Key of an entry found in `dir`
pub fn object_key(dir: &str, entry: &BackendEntry) -> String {
    let mut key = if is_root(dir) {
        entry.name.clone()
    } else {
        format!("{}/{}", dir, entry.name)
    };
    if entry.is_dir {
        key.push('/');
    }
    key
}

/// Turn the entries of `dir` into a listing
pub fn translate(
    request: &ListingRequest,
    dir: &str,
    entries: Vec<BackendEntry>,
    style: ListingStyle,
) -> Listing {
    let delimiter = match style {
        ListingStyle::V2 => request.delimiter.as_deref(),
        ListingStyle::V1 => None,
    };

    let mut listing = Listing::default();
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.name.starts_with('.') {
            continue;
        }
        let key = object_key(dir, &entry);

        if let Some(delimiter) = delimiter {
            let rest = key.strip_prefix(request.prefix.as_str()).unwrap_or(&key);
            if let Some(idx) = rest.find(delimiter) {
                let common_prefix = format!("{}{}", request.prefix, &rest[..idx + delimiter.len()]);
                if seen.insert(common_prefix.clone()) {
                    debug!(prefix = %common_prefix, "Found common prefix");
                    listing.common_prefixes.push(common_prefix);
                }
                continue;
            }
        }

        listing.objects.push(VirtualObject {
            key,
            size: entry.size,
            last_modified: entry.modified,
            etag: EMPTY_ETAG,
            storage_class: STORAGE_CLASS,
        });
    }

    listing
}

/// List the directory a request's prefix names. A directory that does not
/// exist lists as empty.
pub async fn list(
    session: &BackendSession,
    request: &ListingRequest,
    style: ListingStyle,
) -> Result<Listing, BackendError> {
    let dir = directory_for_prefix(&request.prefix);
    debug!(
        path = %dir,
        prefix = %request.prefix,
        delimiter = ?request.delimiter,
        "Listing backend directory"
    );

    match session.list(&dir).await {
        Ok(entries) => Ok(translate(request, &dir, entries, style)),
        Err(err) if err.is_not_found() => {
            debug!(path = %dir, error = %err, "Directory not found, listing is empty");
            Ok(Listing::default())
        }
        Err(err) => Err(err),
    }
}

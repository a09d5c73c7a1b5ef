//! Code Record - content-addressed provenance of the code an execution ran

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a code record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// An in-process function; the payload is its serialized source.
    Function,
    /// A file on disk, invoked with a command.
    File,
}

/// Code Record represents a stored piece of code.
///
/// The `cas_hash` follows the format `sha256:hex_digest` and is computed
/// over the payload, or over `path` and `cmd` when there is none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeRecord {
    name: String,
    kind: CodeKind,
    path: Option<String>,
    cmd: Option<String>,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Vec<u8>>,
}

impl CodeRecord {
    /// Record an in-process function by its source.
    #[must_use]
    pub fn function(name: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        let source = source.into();
        Self {
            name: name.into(),
            kind: CodeKind::Function,
            path: None,
            cmd: None,
            cas_hash: content_hash(&source),
            size_bytes: source.len() as u64,
            created_at: Utc::now(),
            payload: Some(source),
        }
    }

    /// Record a file on disk and the command used to run it.
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<String>, cmd: Option<String>) -> Self {
        let path = path.into();
        let mut identity = path.clone().into_bytes();
        if let Some(cmd) = &cmd {
            identity.push(0);
            identity.extend_from_slice(cmd.as_bytes());
        }
        Self {
            name: name.into(),
            kind: CodeKind::File,
            path: Some(path),
            cmd,
            cas_hash: content_hash(&identity),
            size_bytes: 0,
            created_at: Utc::now(),
            payload: None,
        }
    }

    /// Get the code name (its folder name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the kind of code.
    #[must_use]
    pub const fn kind(&self) -> CodeKind {
        self.kind
    }

    /// Get the file path, for file records.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the invocation command, for file records.
    #[must_use]
    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the stored payload (`code.bin`), if any.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Copy without the payload (the `metadata.json` view).
    #[must_use]
    pub fn metadata(&self) -> Self {
        Self {
            payload: None,
            ..self.clone()
        }
    }

    pub(crate) fn set_payload(&mut self, payload: Option<Vec<u8>>) {
        self.payload = payload;
    }
}

/// `sha256:<hex>` digest of `bytes`.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

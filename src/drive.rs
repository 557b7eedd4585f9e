// Remote collaborators: authentication and the drive holding the batch workbook
// The cloud-backed implementations live outside this crate; LocalAuth and
// LocalFolderDrive stand in for them with a configured operator and a directory tree.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Opaque handle for a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserHandle {
    pub user_id: String,
    pub display_name: String,
}

pub trait AuthProvider: Send + Sync {
    fn is_signed_in(&self) -> bool;

    /// Interactive sign-in; fails when no account is available
    fn sign_in(&self) -> Result<UserHandle>;
}

/// Operator configured up front; signed in whenever a name is present
#[derive(Debug, Clone, Default)]
pub struct LocalAuth {
    operator: Option<String>,
}

impl LocalAuth {
    pub fn new(operator: Option<String>) -> Self {
        LocalAuth {
            operator: operator.filter(|name| !name.trim().is_empty()),
        }
    }
}

impl AuthProvider for LocalAuth {
    fn is_signed_in(&self) -> bool {
        self.operator.is_some()
    }

    fn sign_in(&self) -> Result<UserHandle> {
        let name = self.operator.as_ref().ok_or(Error::NotSignedIn)?;
        Ok(UserHandle {
            user_id: name.trim().to_lowercase().replace(' ', "."),
            display_name: name.trim().to_string(),
        })
    }
}

// ============================================================================
// DRIVE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

pub trait RemoteDrive: Send + Sync {
    fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    /// First file in the folder whose name matches after whitespace normalization
    fn find_file(&self, folder_id: &str, name: &str) -> Result<Option<RemoteFile>> {
        let files = self.list_files(folder_id)?;
        for file in &files {
            debug!(folder_id, name = %file.name, id = %file.id, "found file");
        }
        Ok(files.into_iter().find(|f| file_name_matches(&f.name, name)))
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Upload into `folder_name` (created if absent); returns the new file id
    fn upload(&self, bytes: &[u8], file_name: &str, folder_name: &str) -> Result<String>;
}

/// Collapse whitespace runs, trim and lower-case a file name
pub fn normalize_file_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn file_name_matches(candidate: &str, wanted: &str) -> bool {
    normalize_file_name(candidate) == normalize_file_name(wanted)
}

pub fn mime_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Directory tree standing in for the drive
///
/// Folder ids are subdirectories of the root and file ids are root-relative paths.
#[derive(Debug, Clone)]
pub struct LocalFolderDrive {
    root: PathBuf,
}

impl LocalFolderDrive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFolderDrive { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::Transport(format!("invalid path '{}'", relative)));
        }
        Ok(self.root.join(path))
    }
}

fn file_id(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), name)
    }
}

impl RemoteDrive for LocalFolderDrive {
    fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let dir = self.resolve(folder_id)?;
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::Transport(format!("cannot list folder '{}': {}", folder_id, e)))?;

        let mut files: Vec<RemoteFile> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                RemoteFile {
                    id: file_id(folder_id, &name),
                    mime_type: mime_type_for(&name).to_string(),
                    name,
                }
            })
            .collect();

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(file_id)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::Transport(format!("cannot download '{}': {}", file_id, e)))?;

        debug!(file_id, bytes = bytes.len(), "downloaded file");
        Ok(bytes)
    }

    fn upload(&self, bytes: &[u8], file_name: &str, folder_name: &str) -> Result<String> {
        let folder = self.resolve(folder_name)?;
        std::fs::create_dir_all(&folder)
            .map_err(|e| Error::Transport(format!("cannot create folder '{}': {}", folder_name, e)))?;

        let id = file_id(folder_name, file_name);
        let target = self.resolve(&id)?;
        std::fs::write(&target, bytes)
            .map_err(|e| Error::Transport(format!("cannot upload '{}': {}", file_name, e)))?;

        info!(id = %id, bytes = bytes.len(), "uploaded file");
        Ok(id)
    }
}

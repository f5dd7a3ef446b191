//! Maildir++ mail store
//!
//! Layout:
//! - A folder is a directory with `cur/`, `new/` and `tmp/` sub-directories
//! - Sub-folders live next to the top-level folder as `.Name.Child`
//!   directories
//! - Messages in `cur/` carry an info suffix `:2,FLAGS`; `T` means trashed
//!
//! Folder references are the folder directory paths. Message keys are the
//! unique part of the file name, which survives flag changes.

use crate::source::{FolderType, MailStore, MessageFlags, MessageInfo};
use crate::{CrawlError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MESSAGE_DIRS: &[&str] = &["new", "cur"];
const INFO_SEPARATOR: &str = ":2,";

/// [`MailStore`] over a Maildir++ tree on local disk
#[derive(Debug, Clone, Default)]
pub struct MaildirStore;

impl MaildirStore {
    pub fn new() -> Self {
        Self
    }

    /// The `(root, folder name)` of a folder directory
    ///
    /// The top-level folder has an empty name. A dot directory is only a
    /// sub-folder when its parent is itself a maildir.
    fn split_folder(folder: &Path) -> (PathBuf, String) {
        let name = folder.file_name().map(|n| n.to_string_lossy().into_owned());
        match (name, folder.parent()) {
            (Some(name), Some(parent))
                if name.len() > 1 && name.starts_with('.') && parent.join("cur").is_dir() =>
            {
                (parent.to_path_buf(), name[1..].to_string())
            }
            _ => (folder.to_path_buf(), String::new()),
        }
    }

    fn find_message(folder: &Path, key: &str) -> Option<PathBuf> {
        MESSAGE_DIRS.iter().find_map(|dir| {
            let entries = fs::read_dir(folder.join(dir)).ok()?;
            entries
                .filter_map(|entry| entry.ok())
                .find(|entry| unique_name(&entry.file_name().to_string_lossy()) == key)
                .map(|entry| entry.path())
        })
    }
}

/// The part of a message file name before the info suffix
fn unique_name(file_name: &str) -> &str {
    file_name.split(':').next().unwrap_or(file_name)
}

/// Parses the flags of a `cur/` file name; `new/` messages have none
fn parse_flags(file_name: &str) -> MessageFlags {
    let mut flags = MessageFlags::default();
    let Some((_, letters)) = file_name.split_once(INFO_SEPARATOR) else {
        return flags;
    };
    for c in letters.chars() {
        match c {
            'S' => flags.seen = true,
            'R' => flags.answered = true,
            'F' => flags.flagged = true,
            'D' => flags.draft = true,
            'T' => flags.deleted = true,
            _ => {}
        }
    }
    flags
}

impl MailStore for MaildirStore {
    fn folder_type(&self, folder: &str) -> Result<FolderType> {
        let path = Path::new(folder);
        let metadata = fs::metadata(path).map_err(|e| CrawlError::io(folder, e))?;
        if !metadata.is_dir() {
            return Err(CrawlError::format(folder, "not a maildir folder"));
        }
        if path.join("cur").is_dir() {
            Ok(FolderType::MessagesAndFolders)
        } else {
            Ok(FolderType::Folders)
        }
    }

    fn list_messages(&self, folder: &str) -> Result<Vec<MessageInfo>> {
        let mut messages = Vec::new();

        for dir in MESSAGE_DIRS {
            let path = Path::new(folder).join(dir);
            let entries = match fs::read_dir(&path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(CrawlError::io(folder, e)),
            };

            for entry in entries {
                let entry = entry.map_err(|e| CrawlError::io(folder, e))?;
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if file_name.starts_with('.') {
                    continue;
                }
                let key = unique_name(&file_name).to_string();

                // Stat after listing: a message moved or removed by another
                // client in between is gone for this session.
                let (fingerprint, expunged) = match fs::metadata(entry.path()) {
                    Ok(meta) => (format!("{}-{}", key, meta.len()), false),
                    Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), true),
                    Err(e) => return Err(CrawlError::io(folder, e)),
                };

                messages.push(MessageInfo {
                    flags: parse_flags(&file_name),
                    key,
                    fingerprint,
                    expunged,
                });
            }
        }

        messages.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(messages)
    }

    fn list_subfolders(&self, folder: &str) -> Result<Vec<String>> {
        let (root, name) = Self::split_folder(Path::new(folder));
        let prefix = if name.is_empty() {
            ".".to_string()
        } else {
            format!(".{}.", name)
        };

        let mut subfolders: Vec<String> = fs::read_dir(&root)
            .map_err(|e| CrawlError::io(folder, e))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let dir_name = entry.file_name().to_string_lossy().into_owned();
                let rest = dir_name.strip_prefix(&prefix)?;
                // Direct children only: grandchildren belong to the child.
                (!rest.is_empty() && !rest.contains('.'))
                    .then(|| entry.path().to_string_lossy().into_owned())
            })
            .collect();
        subfolders.sort();
        Ok(subfolders)
    }

    fn read_message(&self, folder: &str, key: &str) -> Result<Vec<u8>> {
        let path = Self::find_message(Path::new(folder), key).ok_or_else(|| {
            CrawlError::io(
                format!("{}/{}", folder, key),
                std::io::Error::new(ErrorKind::NotFound, "message expunged"),
            )
        })?;
        fs::read(&path).map_err(|e| CrawlError::io(path.to_string_lossy(), e))
    }

    fn ids_are_stable(&self) -> bool {
        true
    }
}

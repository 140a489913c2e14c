use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the application blocklist inside the data directory.
pub const APP_BLOCKLIST_FILE: &str = "blocklist.json";
/// File name of the domain blocklist inside the data directory.
pub const WEB_BLOCKLIST_FILE: &str = "web_blocklist.json";

#[derive(Error, Debug)]
pub enum BlocklistError {
    #[error("reading blocklist {path} failed")]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("blocklist {path} is not a JSON array of strings")]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("writing blocklist {path} failed")]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("serializing blocklist failed")]
    Serialize(#[source] serde_json::Error),
    #[error("import data is neither a list nor an exported blocklist")]
    Import(#[source] serde_json::Error),
    #[error("blocklist entries cannot be empty")]
    EmptyEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Document produced by [`Blocklist::export`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistExport {
    pub exported_at: String,
    pub blocked: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    List(Vec<String>),
    Export { blocked: Vec<String> },
}

/// A case-insensitive, deduplicated list of names persisted as a JSON array.
///
/// Every operation re-reads the file, so concurrent readers in other tasks or
/// processes always see the last complete save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocklist {
    path: PathBuf,
}

impl Blocklist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The list of blocked process names in `data_dir`.
    pub fn apps(data_dir: &Path) -> Self {
        Self::new(data_dir.join(APP_BLOCKLIST_FILE))
    }

    /// The list of blocked domains in `data_dir`.
    pub fn web(data_dir: &Path) -> Self {
        Self::new(data_dir.join(WEB_BLOCKLIST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the list. A missing or empty file is an empty list.
    pub fn load(&self) -> Result<Vec<String>, BlocklistError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BlocklistError::Read {
                    source,
                    path: self.path.clone(),
                });
            }
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<String> =
            serde_json::from_str(&data).map_err(|source| BlocklistError::Parse {
                source,
                path: self.path.clone(),
            })?;
        Ok(normalize(entries))
    }

    /// Replaces the list on disk with `entries`, normalized.
    ///
    /// The new content is written to a uniquely named sibling file, restricted
    /// to the owner and renamed over the old one, so concurrent saves never
    /// share a temporary file.
    pub fn save(&self, entries: &[String]) -> Result<(), BlocklistError> {
        let entries = normalize(entries.iter().cloned());
        let data = serde_json::to_string_pretty(&entries).map_err(BlocklistError::Serialize)?;

        let write_err = |source| BlocklistError::Write {
            source,
            path: self.path.clone(),
        };
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(write_err)?;
                parent
            }
            None => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(data.as_bytes()).map_err(write_err)?;
        restrict_to_owner(tmp.path()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|err| write_err(err.error))?;

        log::debug!(
            "Saved {} entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn add(&self, name: &str) -> Result<AddOutcome, BlocklistError> {
        let name = normalize_entry(name).ok_or(BlocklistError::EmptyEntry)?;
        let mut entries = self.load()?;
        if entries.contains(&name) {
            return Ok(AddOutcome::Exists);
        }
        entries.push(name);
        self.save(&entries)?;
        Ok(AddOutcome::Added)
    }

    pub fn remove(&self, name: &str) -> Result<RemoveOutcome, BlocklistError> {
        let Some(name) = normalize_entry(name) else {
            return Ok(RemoveOutcome::NotFound);
        };
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|entry| *entry != name);
        if entries.len() == before {
            return Ok(RemoveOutcome::NotFound);
        }
        self.save(&entries)?;
        Ok(RemoveOutcome::Removed)
    }

    pub fn clear(&self) -> Result<(), BlocklistError> {
        self.save(&[])
    }

    pub fn export(&self, exported_at: DateTime<Utc>) -> Result<BlocklistExport, BlocklistError> {
        Ok(BlocklistExport {
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            blocked: self.load()?,
        })
    }

    /// Merges a JSON array, or a document produced by [`Blocklist::export`],
    /// into the list. Returns the number of new entries.
    pub fn import(&self, data: &str) -> Result<usize, BlocklistError> {
        let incoming = match serde_json::from_str(data).map_err(BlocklistError::Import)? {
            ImportDocument::List(blocked) | ImportDocument::Export { blocked } => blocked,
        };

        let mut entries = self.load()?;
        let before = entries.len();
        entries.extend(incoming);
        let entries = normalize(entries);
        let added = entries.len() - before;
        if added > 0 {
            self.save(&entries)?;
        }
        Ok(added)
    }
}

fn normalize_entry(entry: &str) -> Option<String> {
    let entry = entry.trim().to_lowercase();
    (!entry.is_empty()).then_some(entry)
}

/// Lowercases, drops blanks and duplicates, keeps first-seen order.
fn normalize(entries: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in entries.into_iter().filter_map(|e| normalize_entry(&e)) {
        if !out.contains(&entry) {
            out.push(entry);
        }
    }
    out
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> (tempfile::TempDir, Blocklist) {
        let dir = tempfile::tempdir().unwrap();
        let list = Blocklist::apps(dir.path());
        (dir, list)
    }

    #[test]
    fn missing_file_is_empty() {
        let (_dir, list) = list();
        assert!(list.load().unwrap().is_empty());
    }

    #[test]
    fn add_is_case_insensitive() {
        let (_dir, list) = list();
        assert_eq!(list.add("Chrome.exe").unwrap(), AddOutcome::Added);
        assert_eq!(list.add("chrome.EXE").unwrap(), AddOutcome::Exists);
        assert_eq!(list.add("steam").unwrap(), AddOutcome::Added);
        assert_eq!(list.load().unwrap(), vec!["chrome.exe", "steam"]);
        assert!(matches!(list.add("  "), Err(BlocklistError::EmptyEntry)));
    }

    #[test]
    fn remove_reports_missing_entries() {
        let (_dir, list) = list();
        list.add("discord").unwrap();
        assert_eq!(list.remove("DISCORD").unwrap(), RemoveOutcome::Removed);
        assert_eq!(list.remove("discord").unwrap(), RemoveOutcome::NotFound);
        assert!(list.load().unwrap().is_empty());
    }

    #[test]
    fn load_normalizes_hand_edited_files() {
        let (_dir, list) = list();
        fs::write(list.path(), r#"["Steam", "steam", "", " Discord "]"#).unwrap();
        assert_eq!(list.load().unwrap(), vec!["steam", "discord"]);
    }

    #[test]
    fn corrupted_file_is_a_parse_error() {
        let (_dir, list) = list();
        fs::write(list.path(), "{not json").unwrap();
        assert!(matches!(list.load(), Err(BlocklistError::Parse { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, list) = list();
        list.add("steam").unwrap();
        let mode = fs::metadata(list.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_saves_leave_one_complete_list() {
        let (dir, list) = list();
        let writers: Vec<_> = (0..8)
            .map(|n| {
                let list = list.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        list.save(&[format!("app{n}"), "steam".to_string()]).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let saved = list.load().unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].starts_with("app"));
        assert_eq!(saved[1], "steam");

        let files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from(APP_BLOCKLIST_FILE)]);
    }

    #[test]
    fn clear_empties_the_list() {
        let (_dir, list) = list();
        list.add("steam").unwrap();
        list.clear().unwrap();
        assert!(list.load().unwrap().is_empty());
        assert_eq!(fs::read_to_string(list.path()).unwrap(), "[]");
    }

    #[test]
    fn export_then_import_merges() {
        let (_dir, source) = list();
        source.add("steam").unwrap();
        source.add("discord").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let exported = source.export(at).unwrap();
        assert_eq!(exported.exported_at, "2024-05-01T10:00:00Z");

        let (_other_dir, target) = list();
        target.add("Discord").unwrap();
        let document = serde_json::to_string(&exported).unwrap();
        assert_eq!(target.import(&document).unwrap(), 1);
        assert_eq!(target.load().unwrap(), vec!["discord", "steam"]);

        assert_eq!(target.import(r#"["STEAM", "spotify"]"#).unwrap(), 1);
        assert_eq!(target.load().unwrap(), vec!["discord", "steam", "spotify"]);
        assert!(matches!(
            target.import(r#"{"foo": 1}"#),
            Err(BlocklistError::Import(_))
        ));
    }
}

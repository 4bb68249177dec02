//! Per-directory profiles persisted to `command_profiles.json`.
//!
//! The store maps a working directory to its recent commands and the packaging
//! parameters last used there. The whole map is rewritten after every change.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::package::{PackageSettings, PackagingParameters};

/// Default file name of the profile store, relative to the current directory.
pub const DEFAULT_PROFILES_FILE: &str = "command_profiles.json";

/// Resolves a user-supplied directory to the absolute path used as its profile key.
///
/// Relative paths, `.` components, symlinks and trailing separators all collapse
/// to the same key.
pub fn resolve_directory(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        bail!("no directory given");
    }
    let resolved = fs::canonicalize(trimmed)
        .with_context(|| format!("not a directory: {}", trimmed))?;
    if !resolved.is_dir() {
        bail!("not a directory: {}", trimmed);
    }
    Ok(strip_verbatim_prefix(resolved.to_string_lossy().into_owned()))
}

/// `canonicalize` on Windows yields `\\?\C:\...`; keep the plain drive form.
fn strip_verbatim_prefix(path: String) -> String {
    match path.strip_prefix(r"\\?\") {
        Some(rest) if !rest.starts_with("UNC\\") => rest.to_string(),
        _ => path,
    }
}

/// Everything remembered about one working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    /// Recent commands, newest first, without duplicates.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Packaging parameter values; absent until the form is first changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_settings: Option<PackageSettings>,
}

/// Mapping from directory path to its profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileStore {
    profiles: BTreeMap<String, DirectoryProfile>,
}

impl ProfileStore {
    /// Loads the store from `path`.
    ///
    /// A missing or unreadable file yields an empty store; startup never fails here.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %err, "failed to read profiles, starting empty");
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to parse profiles, starting empty");
                Self::default()
            }
        }
    }

    /// Overwrites `path` with the full store as indented JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize profiles")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), directories = self.len(), "saved profiles");
        Ok(())
    }

    /// Registers `dir` with an empty profile. Returns `true` if it was new.
    pub fn ensure_directory(&mut self, dir: &str) -> bool {
        if self.profiles.contains_key(dir) {
            return false;
        }
        self.profiles.insert(dir.to_string(), DirectoryProfile::default());
        true
    }

    /// Puts `command` at the front of `dir`'s history.
    ///
    /// Blank commands, commands already in the history and unknown directories are
    /// left alone; returns whether the history changed.
    pub fn record_command(&mut self, dir: &str, command: &str) -> bool {
        let command = command.trim();
        if command.is_empty() {
            return false;
        }
        let Some(profile) = self.profiles.get_mut(dir) else {
            return false;
        };
        if profile.commands.iter().any(|existing| existing == command) {
            return false;
        }
        profile.commands.insert(0, command.to_string());
        true
    }

    /// Replaces `dir`'s packaging settings with every value in `params`.
    pub fn record_package_settings(&mut self, dir: &str, params: &PackagingParameters) -> bool {
        let Some(profile) = self.profiles.get_mut(dir) else {
            return false;
        };
        profile.package_settings = Some(params.to_settings());
        true
    }

    pub fn contains(&self, dir: &str) -> bool {
        self.profiles.contains_key(dir)
    }

    /// Recent commands for `dir`, newest first.
    pub fn commands(&self, dir: &str) -> &[String] {
        self.profiles
            .get(dir)
            .map(|profile| profile.commands.as_slice())
            .unwrap_or(&[])
    }

    pub fn package_settings(&self, dir: &str) -> Option<&PackageSettings> {
        self.profiles.get(dir)?.package_settings.as_ref()
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::SettingValue;

    #[test]
    fn resolve_directory_returns_one_absolute_key() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let plain = resolve_directory(&work.to_string_lossy()).unwrap();
        assert!(Path::new(&plain).is_absolute());

        let trailing = format!("{}/", work.to_string_lossy());
        assert_eq!(resolve_directory(&trailing).unwrap(), plain);
        let dotted = work.join(".").to_string_lossy().into_owned();
        assert_eq!(resolve_directory(&dotted).unwrap(), plain);

        let here = resolve_directory(".").unwrap();
        assert!(Path::new(&here).is_absolute());
    }

    #[test]
    fn resolve_directory_rejects_files_missing_and_blank() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(resolve_directory(&file.to_string_lossy()).is_err());
        assert!(resolve_directory(&tmp.path().join("gone").to_string_lossy()).is_err());
        assert!(resolve_directory("   ").is_err());
    }

    #[test]
    fn verbatim_prefix_is_dropped_for_drive_paths_only() {
        assert_eq!(strip_verbatim_prefix(r"\\?\C:\UE5".to_string()), r"C:\UE5");
        assert_eq!(
            strip_verbatim_prefix(r"\\?\UNC\server\share".to_string()),
            r"\\?\UNC\server\share"
        );
        assert_eq!(strip_verbatim_prefix("/repo".to_string()), "/repo");
    }

    fn store_with(dir: &str) -> ProfileStore {
        let mut store = ProfileStore::default();
        store.ensure_directory(dir);
        store
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProfileStore::load(&tmp.path().join("nope.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn load_corrupt_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("profiles.json");
        fs::write(&path, "{\"/repo\": {\"commands\": [\"ls\"").unwrap();
        assert!(ProfileStore::load(&path).is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(ProfileStore::load(&path).is_empty());
    }

    #[test]
    fn ensured_directory_round_trips_as_empty_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("profiles.json");
        let mut store = ProfileStore::load(&path);
        assert!(store.ensure_directory("/repo"));
        assert!(!store.ensure_directory("/repo"));
        store.save(&path).unwrap();

        let reloaded = ProfileStore::load(&path);
        assert!(reloaded.contains("/repo"));
        assert!(reloaded.commands("/repo").is_empty());
        assert!(reloaded.package_settings("/repo").is_none());
        reloaded.save(&path).unwrap();
        assert_eq!(ProfileStore::load(&path), reloaded);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("package_settings"));
    }

    #[test]
    fn record_command_is_idempotent() {
        let mut store = store_with("/repo");
        assert!(store.record_command("/repo", "make"));
        assert!(store.record_command("/repo", "make test"));
        assert!(!store.record_command("/repo", "make test"));
        assert_eq!(store.commands("/repo"), ["make test", "make"]);
    }

    #[test]
    fn record_command_keeps_position_of_existing_entry() {
        let mut store = store_with("/repo");
        store.record_command("/repo", "a");
        store.record_command("/repo", "b");
        assert!(!store.record_command("/repo", " a "));
        assert_eq!(store.commands("/repo"), ["b", "a"]);
    }

    #[test]
    fn record_command_ignores_blank_and_unknown() {
        let mut store = store_with("/repo");
        assert!(!store.record_command("/repo", ""));
        assert!(!store.record_command("/repo", "   "));
        assert!(store.commands("/repo").is_empty());
        assert!(!store.record_command("/elsewhere", "ls"));
        assert!(!store.contains("/elsewhere"));
    }

    #[test]
    fn record_package_settings_overwrites_whole_map() {
        let mut store = store_with("/repo");
        let mut params = PackagingParameters::default();
        params.project = "/repo/Game.uproject".to_string();
        assert!(store.record_package_settings("/repo", &params));
        params.stage = false;
        store.record_package_settings("/repo", &params);

        let settings = store.package_settings("/repo").unwrap();
        assert_eq!(settings.len(), 17);
        assert_eq!(settings.get("Stage"), Some(&SettingValue::Flag(false)));
        assert!(!store.record_package_settings("/nowhere", &params));
    }

    #[test]
    fn save_then_load_preserves_order_and_types() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("profiles.json");
        let mut store = store_with("/repo");
        store.ensure_directory("/other");
        store.record_command("/repo", "first");
        store.record_command("/repo", "second");
        let mut params = PackagingParameters::default();
        params.platform = "PS5".to_string();
        params.compressed = false;
        store.record_package_settings("/other", &params);
        store.save(&path).unwrap();

        let reloaded = ProfileStore::load(&path);
        assert_eq!(reloaded, store);
        assert_eq!(reloaded.commands("/repo"), ["second", "first"]);
        let settings = reloaded.package_settings("/other").unwrap();
        assert_eq!(settings.get("Compressed"), Some(&SettingValue::Flag(false)));
        assert_eq!(settings.get("Platform"), Some(&SettingValue::Text("PS5".to_string())));
    }

    #[test]
    fn reads_file_written_by_earlier_versions() {
        let raw = r#"{
  "D:/UE5": {
    "commands": ["git status"],
    "package_settings": {
      "Project": "D:/UE5/Game/Game.uproject",
      "NoXGE": false,
      "Legacy": "kept"
    }
  },
  "D:/Tools": {
    "commands": []
  }
}"#;
        let store: ProfileStore = serde_json::from_str(raw).unwrap();
        assert_eq!(store.directories().collect::<Vec<_>>(), ["D:/Tools", "D:/UE5"]);
        let settings = store.package_settings("D:/UE5").unwrap();
        assert_eq!(settings.get("Legacy"), Some(&SettingValue::Text("kept".to_string())));
        assert!(store.package_settings("D:/Tools").is_none());

        let mut params = PackagingParameters::default();
        params.apply_settings(settings);
        assert!(!params.no_xge);
        assert_eq!(params.project, "D:/UE5/Game/Game.uproject");
    }
}

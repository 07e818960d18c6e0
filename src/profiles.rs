//! Named overclock profiles persisted as one JSON object
//!
//! ```json
//! {
//!     "Default": {
//!         "fan_speed": 60,
//!         "core_clock": 150,
//!         "mem_clock": 750
//!     }
//! }
//! ```

use crate::{NvOcError, NvResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const DEFAULT_PROFILE: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub fan_speed: u32,
    pub core_clock: i32,
    pub mem_clock: i32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            fan_speed: 60,
            core_clock: 150,
            mem_clock: 750,
        }
    }
}

impl Profile {
    /// Build a profile from one stored entry, tolerating hand-edited values.
    ///
    /// Missing or non-numeric fields fall back to 30 % / 0 / 0; numbers are
    /// rounded, and the fan speed is clamped to 0..=100. Returns `None` if
    /// the entry is not an object at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let number = |key: &str| fields.get(key).and_then(Value::as_f64).map(f64::round);

        Some(Self {
            fan_speed: number("fan_speed").map_or(30, |v| v.clamp(0.0, 100.0) as u32),
            core_clock: number("core_clock").map_or(0, |v| v as i32),
            mem_clock: number("mem_clock").map_or(0, |v| v as i32),
        })
    }
}

/// Every profile by name. After `load` the "Default" entry is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileStore {
    profiles: BTreeMap<String, Profile>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
        Self { profiles }
    }
}

impl ProfileStore {
    /// Load the store, creating it with only "Default" when the file is
    /// absent, unreadable or corrupt. Never fails.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("'{}' not found. Creating with default profile.", path.display());
            return Self::recreate(path);
        }

        match Self::read(path) {
            Ok(mut store) => {
                store
                    .profiles
                    .entry(DEFAULT_PROFILE.to_string())
                    .or_default();
                info!("Successfully loaded profiles from '{}'.", path.display());
                store
            }
            Err(e) => {
                error!("Error reading '{}': {}. Loading default profile.", path.display(), e);
                Self::recreate(path)
            }
        }
    }

    /// Parse the file entry by entry. Only a file that is not a JSON object
    /// is an error; entries that are not objects are dropped with a warning.
    fn read(path: &Path) -> NvResult<Self> {
        let content = fs::read_to_string(path)?;
        let entries: BTreeMap<String, Value> = serde_json::from_str(&content)?;

        let mut profiles = BTreeMap::new();
        for (name, value) in entries {
            match Profile::from_value(&value) {
                Some(profile) => {
                    profiles.insert(name, profile);
                }
                None => warn!("Ignoring profile '{}': expected an object, found {}.", name, value),
            }
        }
        Ok(Self { profiles })
    }

    fn recreate(path: &Path) -> Self {
        let store = Self::default();
        if let Err(e) = store.save(path) {
            error!("Error writing '{}': {}.", path.display(), e);
        }
        store
    }

    /// Write the whole store, pretty-printed with 4-space indentation
    pub fn save(&self, path: &Path) -> NvResult<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;

        fs::write(path, buf)?;
        info!("Profiles saved to '{}'.", path.display());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Insert or overwrite. No name protection at this layer.
    pub fn insert(&mut self, name: impl Into<String>, profile: Profile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        self.profiles.remove(name)
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}

/// Store plus its file, enforcing name rules for user-initiated changes
pub struct ProfileManager {
    path: PathBuf,
    store: ProfileStore,
}

impl ProfileManager {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = ProfileStore::load(&path);
        Self { path, store }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn get(&self, name: &str) -> NvResult<Profile> {
        self.store
            .get(name)
            .copied()
            .ok_or_else(|| NvOcError::ProfileNotFound(name.to_string()))
    }

    fn check_name(name: &str) -> NvResult<&str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NvOcError::InvalidProfileName(
                "Profile name cannot be empty.".into(),
            ));
        }
        if name == DEFAULT_PROFILE {
            return Err(NvOcError::ProtectedProfile(name.to_string()));
        }
        Ok(name)
    }

    /// Save (or overwrite) a profile and persist the whole store.
    ///
    /// The in-memory store only changes once the file write succeeded.
    pub fn save_profile(&mut self, name: &str, profile: Profile) -> NvResult<String> {
        let name = Self::check_name(name)?.to_string();
        let mut updated = self.store.clone();
        updated.insert(name.clone(), profile);
        updated.save(&self.path)?;
        self.store = updated;
        Ok(name)
    }

    pub fn delete_profile(&mut self, name: &str) -> NvResult<()> {
        let name = Self::check_name(name)?;
        if !self.store.contains(name) {
            return Err(NvOcError::ProfileNotFound(name.to_string()));
        }
        let mut updated = self.store.clone();
        updated.remove(name);
        updated.save(&self.path)?;
        self.store = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        let store = ProfileStore::load(&path);
        assert_eq!(store, ProfileStore::default());
        assert_eq!(store.names(), vec!["Default"]);
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ProfileStore::load(&path);
        assert_eq!(store, ProfileStore::default());

        let on_disk: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            serde_json::json!({"Default": {"fan_speed": 60, "core_clock": 150, "mem_clock": 750}})
        );
    }

    #[test]
    fn test_default_injected_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, r#"{"Quiet": {"fan_speed": 35, "core_clock": 0, "mem_clock": 0}}"#).unwrap();

        let store = ProfileStore::load(&path);
        assert_eq!(store.names(), vec!["Default", "Quiet"]);
        assert_eq!(store.get("Default"), Some(&Profile::default()));
    }

    #[test]
    fn test_malformed_entries_do_not_discard_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{
                "Default": {"fan_speed": 60, "core_clock": 150, "mem_clock": 750},
                "Gaming": {"fan_speed": 80, "core_clock": 120, "mem_clock": 600},
                "Quiet": {"fan_speed": 35, "core_clock": -50},
                "Float": {"fan_speed": 70.0, "core_clock": 99.6, "mem_clock": 0},
                "Loud": {"fan_speed": -5, "core_clock": 0, "mem_clock": 0},
                "Broken": "not a profile"
            }"#,
        )
        .unwrap();

        let store = ProfileStore::load(&path);
        assert_eq!(store.names(), vec!["Default", "Float", "Gaming", "Loud", "Quiet"]);
        assert_eq!(
            store.get("Gaming"),
            Some(&Profile {
                fan_speed: 80,
                core_clock: 120,
                mem_clock: 600
            })
        );
        assert_eq!(
            store.get("Quiet"),
            Some(&Profile {
                fan_speed: 35,
                core_clock: -50,
                mem_clock: 0
            })
        );
        assert_eq!(store.get("Float").map(|p| (p.fan_speed, p.core_clock)), Some((70, 100)));
        assert_eq!(store.get("Loud").map(|p| p.fan_speed), Some(0));

        // The file is left alone, valid entries included
        assert!(fs::read_to_string(&path).unwrap().contains("\"Gaming\""));
    }

    #[test]
    fn test_non_object_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert_eq!(ProfileStore::load(&path), ProfileStore::default());
    }

    #[test]
    fn test_save_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        ProfileStore::default().save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n    \"Default\": {\n        \"fan_speed\": 60,"));
    }

    #[test]
    fn test_manager_rejects_protected_and_empty_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ProfileManager::load(dir.path().join("profiles.json"));
        let before = manager.store().clone();

        let custom = Profile {
            fan_speed: 100,
            core_clock: 0,
            mem_clock: 0,
        };
        assert!(matches!(
            manager.save_profile("Default", custom),
            Err(NvOcError::ProtectedProfile(_))
        ));
        assert!(matches!(
            manager.delete_profile("Default"),
            Err(NvOcError::ProtectedProfile(_))
        ));
        assert!(matches!(
            manager.save_profile("   ", custom),
            Err(NvOcError::InvalidProfileName(_))
        ));
        assert_eq!(manager.store(), &before);
    }

    #[test]
    fn test_manager_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let mut manager = ProfileManager::load(&path);

        manager.save_profile(" Gaming ", Profile::default()).unwrap();
        assert!(manager.store().contains("Gaming"));

        manager.delete_profile("Gaming").unwrap();
        assert!(!ProfileStore::load(&path).contains("Gaming"));
        assert!(matches!(
            manager.delete_profile("Gaming"),
            Err(NvOcError::ProfileNotFound(_))
        ));
    }
}

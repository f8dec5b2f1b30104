use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::traits::preference_store::PreferenceStore;

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    String(String),
}

type Namespaces = HashMap<String, HashMap<String, PreferenceValue>>;

/// In-memory preference store. Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: Arc<RwLock<Namespaces>>,
}

impl MemoryPreferences {
    pub fn set(&self, namespace: &str, key: &str, value: PreferenceValue) {
        self.values
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn set_bool(&self, namespace: &str, key: &str, value: bool) {
        self.set(namespace, key, PreferenceValue::Bool(value));
    }

    pub fn set_string(&self, namespace: &str, key: &str, value: &str) {
        self.set(namespace, key, PreferenceValue::String(value.to_string()));
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Option<PreferenceValue> {
        self.values.write().get_mut(namespace)?.remove(key)
    }

    fn get(&self, namespace: &str, key: &str) -> Option<PreferenceValue> {
        self.values.read().get(namespace)?.get(key).cloned()
    }

    fn replace_all(&self, values: Namespaces) {
        *self.values.write() = values;
    }

    /// Sorted copy for stable serialization.
    fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, PreferenceValue>> {
        self.values
            .read()
            .iter()
            .map(|(ns, keys)| {
                let keys = keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                (ns.clone(), keys)
            })
            .collect()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, namespace: &str, key: &str, default: bool) -> bool {
        match self.get(namespace, key) {
            Some(PreferenceValue::Bool(value)) => value,
            _ => default,
        }
    }

    fn get_string(&self, namespace: &str, key: &str) -> Option<String> {
        match self.get(namespace, key)? {
            PreferenceValue::String(value) => Some(value),
            PreferenceValue::Bool(_) => None,
        }
    }
}

/// Read a preferences file shaped `{ namespace: { key: bool | string } }`.
pub fn read_preferences(path: &Path) -> Result<MemoryPreferences, CaptureError> {
    let json = fs::read_to_string(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read preferences: {}", e)))?;
    let values: Namespaces = serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse preferences: {}", e)))?;

    let preferences = MemoryPreferences::default();
    preferences.replace_all(values);
    Ok(preferences)
}

/// Write preferences as pretty-printed JSON, creating parent directories.
pub fn write_preferences(preferences: &MemoryPreferences, path: &Path) -> Result<(), CaptureError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
    }
    let json = serde_json::to_string_pretty(&preferences.snapshot())
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize preferences: {}", e)))?;
    fs::write(path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write preferences: {}", e)))?;
    Ok(())
}

/// Preference store backed by a JSON file.
///
/// A missing or unreadable file is treated as empty, so every read falls
/// back to its default.
#[derive(Debug, Clone)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: MemoryPreferences,
}

impl JsonFilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load_or_empty(&path);
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, replacing the cached values.
    pub fn reload(&self) {
        let fresh = load_or_empty(&self.path);
        self.values.replace_all(fresh.values.read().clone());
    }

    /// Update one value and persist the whole file.
    pub fn set(&self, namespace: &str, key: &str, value: PreferenceValue) -> Result<(), CaptureError> {
        self.values.set(namespace, key, value);
        write_preferences(&self.values, &self.path)
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get_bool(&self, namespace: &str, key: &str, default: bool) -> bool {
        self.values.get_bool(namespace, key, default)
    }

    fn get_string(&self, namespace: &str, key: &str) -> Option<String> {
        self.values.get_string(namespace, key)
    }
}

fn load_or_empty(path: &Path) -> MemoryPreferences {
    if !path.exists() {
        return MemoryPreferences::default();
    }
    match read_preferences(path) {
        Ok(preferences) => preferences,
        Err(e) => {
            log::warn!("Ignoring preferences at {}: {}", path.display(), e);
            MemoryPreferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{PREFER_USB_CAMERA_KEY, USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY};

    #[test]
    fn wrong_type_reads_as_default() {
        let preferences = MemoryPreferences::default();
        preferences.set_string(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, "yes");
        preferences.set_bool(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY, true);

        assert!(!preferences.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
        assert_eq!(preferences.get_string(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY), None);
        assert!(preferences.get_bool("other", PREFER_USB_CAMERA_KEY, true));
    }

    #[test]
    fn clones_share_values() {
        let preferences = MemoryPreferences::default();
        let shared = preferences.clone();
        preferences.set_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, true);

        assert!(shared.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
        assert_eq!(
            shared.remove(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY),
            Some(PreferenceValue::Bool(true))
        );
        assert!(!preferences.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
    }

    #[test]
    fn reads_host_preferences_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(
            &path,
            r#"{ "usb_camera": { "prefer_usb_camera": true, "usb_device_name": "/dev/bus/usb/001/004" } }"#,
        )
        .unwrap();

        let preferences = read_preferences(&path).unwrap();
        assert!(preferences.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
        assert_eq!(
            preferences.get_string(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY),
            Some("/dev/bus/usb/001/004".to_string())
        );
    }

    #[test]
    fn write_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = JsonFilePreferences::open(&path);
        store
            .set(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, PreferenceValue::Bool(true))
            .unwrap();

        let reopened = JsonFilePreferences::open(&path);
        assert!(reopened.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
    }

    #[test]
    fn missing_or_corrupt_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFilePreferences::open(dir.path().join("absent.json"));
        assert!(!missing.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));

        let corrupt_path = dir.path().join("corrupt.json");
        fs::write(&corrupt_path, "{ not json").unwrap();
        let corrupt = JsonFilePreferences::open(&corrupt_path);
        assert_eq!(corrupt.get_string(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY), None);
        assert!(read_preferences(&corrupt_path).is_err());
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let store = JsonFilePreferences::open(&path);
        assert!(!store.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));

        fs::write(&path, r#"{ "usb_camera": { "prefer_usb_camera": true } }"#).unwrap();
        store.reload();
        assert!(store.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false));
    }
}

/// Read access to persisted, namespaced key-value preferences.
///
/// Reads are best-effort: a missing namespace, missing key, or a value of
/// the wrong type yields the default.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, namespace: &str, key: &str, default: bool) -> bool;

    fn get_string(&self, namespace: &str, key: &str) -> Option<String>;
}

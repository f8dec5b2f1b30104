pub mod preferences;

pub use preferences::{read_preferences, write_preferences, JsonFilePreferences, MemoryPreferences, PreferenceValue};

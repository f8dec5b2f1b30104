use crate::traits::uvc::{UvcLibrary, REQUIRED_LIBRARY_TYPES};

/// Pre-flight check that every library type the bridge binds to is loadable.
///
/// Runs before any bridge state is created; a `false` here means the external
/// backend is simply unavailable on this runtime.
pub fn is_supported(library: &dyn UvcLibrary) -> bool {
    let missing: Vec<&str> = REQUIRED_LIBRARY_TYPES
        .iter()
        .copied()
        .filter(|type_name| !library.is_type_available(type_name))
        .collect();

    if missing.is_empty() {
        return true;
    }
    log::warn!("USB UVC library is not supported on this runtime; missing {:?}", missing);
    false
}

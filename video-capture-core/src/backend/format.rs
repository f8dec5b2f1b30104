use crate::models::device::Resolution;

use super::BackendAdapter;

/// The supported size closest to `target` by `|dw| + |dh|`.
///
/// Ties keep the earlier entry, so the backend's own ordering decides.
pub fn closest_supported_size(supported: &[Resolution], target: Resolution) -> Option<Resolution> {
    supported
        .iter()
        .copied()
        .min_by_key(|size| size.distance_to(&target))
}

/// Resolution a freshly selected adapter should be started with.
///
/// Sensor backends snap to their closest supported size. The USB bridge
/// takes the target as-is; the helper reports the real preview size once the
/// device connects.
pub fn negotiate_resolution(adapter: &BackendAdapter, target: Resolution) -> Resolution {
    let supported = match adapter {
        BackendAdapter::Legacy(legacy) => legacy.supported_sizes(),
        BackendAdapter::Modern(modern) => modern.supported_sizes(),
        BackendAdapter::ExternalUsb(_) => return target,
    };

    match closest_supported_size(&supported, target) {
        Some(actual) => {
            if actual != target {
                log::debug!("Negotiated capture size {} for requested {}", actual, target);
            }
            actual
        }
        None => target,
    }
}

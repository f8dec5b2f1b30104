/// External USB bridge state machine.
///
/// State transitions:
/// ```text
/// idle → initializing → waiting_for_permission → connected → streaming
///   ↑                                                            │
///   └──────────────────────── stopping ←─────────────────────────┘
/// ```
/// Any state may move to `Stopping`. A denied permission leaves the bridge in
/// `WaitingForPermission` until the host retries or stops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    Idle,
    Initializing,
    WaitingForPermission,
    Connected,
    Streaming,
    Stopping,
}

impl BridgeState {
    /// Whether library callbacks should still be acted upon.
    pub fn accepts_callbacks(&self) -> bool {
        !matches!(self, Self::Idle | Self::Stopping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_ignored_outside_a_live_session() {
        assert!(!BridgeState::Idle.accepts_callbacks());
        assert!(!BridgeState::Stopping.accepts_callbacks());
        assert!(BridgeState::WaitingForPermission.accepts_callbacks());
        assert!(BridgeState::Streaming.accepts_callbacks());
    }
}

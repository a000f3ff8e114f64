use crate::tunnel::TunnelStatus;

/// **VALUE**: Raw platform values map onto the status enum and back.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the numbering that turns
/// `connected` into `reasserting` or `connecting` into `connected`.
#[test]
fn given_raw_values_when_converted_then_map_to_known_statuses() {
    let expected = [
        (0, TunnelStatus::Invalid),
        (1, TunnelStatus::Disconnected),
        (2, TunnelStatus::Connecting),
        (3, TunnelStatus::Connected),
        (4, TunnelStatus::Reasserting),
        (5, TunnelStatus::Disconnecting),
    ];

    for (raw, status) in expected {
        assert_eq!(TunnelStatus::from(raw), status);
        assert_eq!(status.raw_value(), raw);
    }
}

#[test]
fn given_unrecognized_raw_value_when_converted_then_kept_as_unknown() {
    let status = TunnelStatus::from(99);

    assert_eq!(status, TunnelStatus::Unknown(99));
    assert_eq!(status.raw_value(), 99);
    assert_eq!(status.to_string(), "unknown(99)");
    assert!(!status.is_down());
}

#[test]
fn given_statuses_when_checked_then_only_invalid_disconnected_disconnecting_are_down() {
    assert!(TunnelStatus::Invalid.is_down());
    assert!(TunnelStatus::Disconnected.is_down());
    assert!(TunnelStatus::Disconnecting.is_down());
    assert!(!TunnelStatus::Connecting.is_down());
    assert!(!TunnelStatus::Connected.is_down());
    assert!(!TunnelStatus::Reasserting.is_down());
}

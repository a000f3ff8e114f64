// Unit tests for command-line parsing

use crate::args::{ProbeArgs, ReplyMode, StatusArg, Transition, parse_transition};

use tunnel_core::TunnelStatus;
use tunnel_core::tunnel::ReplyBehavior;

use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

#[test]
fn given_no_flags_when_parsed_then_defaults_describe_a_connected_echo_probe() {
    // GIVEN / WHEN
    let args = ProbeArgs::try_parse_from(["tunnel-probe"]).unwrap();

    // THEN
    assert_eq!(args.status, StatusArg::Connected);
    assert_eq!(args.launched_ago, Duration::ZERO);
    assert!(args.transitions.is_empty());
    assert_eq!(args.timeout, None);
    assert_eq!(args.background_budget, None);
    assert_eq!(args.reply, ReplyMode::Echo);
    assert_eq!(args.message, "ping");
    assert!(args.config_dir.is_none());
    assert!(!args.verbose);
}

#[test]
fn given_full_command_line_when_parsed_then_every_flag_is_applied() {
    // GIVEN
    let argv = [
        "tunnel-probe",
        "--status",
        "connecting",
        "--launched-ago",
        "1s 500ms",
        "--transition",
        "connected@2s",
        "--transition",
        "disconnecting@4s",
        "--timeout",
        "3s",
        "--background-budget",
        "30s",
        "--reply",
        "silent",
        "--reply-delay",
        "250ms",
        "--message",
        "stats",
        "-v",
    ];

    // WHEN
    let args = ProbeArgs::try_parse_from(argv).unwrap();

    // THEN
    assert_eq!(args.status, StatusArg::Connecting);
    assert_eq!(args.launched_ago, Duration::from_millis(1_500));
    assert_eq!(
        args.transitions,
        vec![
            Transition {
                status: TunnelStatus::Connected,
                after: Duration::from_secs(2),
            },
            Transition {
                status: TunnelStatus::Disconnecting,
                after: Duration::from_secs(4),
            },
        ]
    );
    assert_eq!(args.timeout, Some(Duration::from_secs(3)));
    assert_eq!(args.background_budget, Some(Duration::from_secs(30)));
    assert_eq!(args.reply, ReplyMode::Silent);
    assert_eq!(args.reply_delay, Duration::from_millis(250));
    assert_eq!(args.message, "stats");
    assert_eq!(args.log_level(), LevelFilter::Trace);
}

#[test]
fn given_unparseable_duration_when_parsed_then_clap_rejects_it() {
    let result = ProbeArgs::try_parse_from(["tunnel-probe", "--timeout", "soon"]);

    assert!(result.is_err());
}

/// **VALUE**: Raw numeric statuses can be scripted.
///
/// **WHY THIS MATTERS**: It is the only way to exercise how the operation
/// treats statuses the tunnel does not define.
#[test]
fn given_numeric_status_when_transition_parsed_then_maps_to_raw_status() {
    let transition = parse_transition("42@1s").unwrap();

    assert_eq!(transition.status, TunnelStatus::Unknown(42));
    assert_eq!(transition.after, Duration::from_secs(1));
}

#[test]
fn given_known_numeric_status_when_transition_parsed_then_maps_to_named_status() {
    let transition = parse_transition("3@0s").unwrap();

    assert_eq!(transition.status, TunnelStatus::Connected);
}

#[test]
fn given_mixed_case_status_when_transition_parsed_then_is_accepted() {
    let transition = parse_transition("Reasserting @ 2s").unwrap();

    assert_eq!(transition.status, TunnelStatus::Reasserting);
    assert_eq!(transition.after, Duration::from_secs(2));
}

#[test]
fn given_malformed_transitions_when_parsed_then_each_is_rejected() {
    for value in ["connected", "sleeping@2s", "connected@later", "@2s"] {
        assert!(
            parse_transition(value).is_err(),
            "'{value}' should be rejected"
        );
    }
}

#[test]
fn given_reply_modes_then_each_maps_to_loopback_behavior() {
    assert_eq!(ReplyMode::Echo.behavior(), ReplyBehavior::Echo);
    assert_eq!(ReplyMode::Empty.behavior(), ReplyBehavior::Respond(None));
    assert_eq!(ReplyMode::Silent.behavior(), ReplyBehavior::NoReply);
    assert!(matches!(
        ReplyMode::Reject.behavior(),
        ReplyBehavior::Reject(_)
    ));
}

use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every tunnel IPC error ends with a location. If capture breaks,
/// a timeout and a tunnel-down failure raised from different call sites look identical.
///
/// **BUG THIS CATCHES**: Would catch if file path extraction or line/column capture breaks.
#[test]
#[track_caller]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN: Current caller location
    // WHEN: Creating ErrorLocation from caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert_eq!(location.line, 10, "Should capture correct line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **BUG THIS CATCHES**: Would catch if Display drops the brackets or one of the fields.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::caller();

    // WHEN: Formatting as string
    let formatted = location.to_string();

    // THEN: Should produce "[file:line:column]" format
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(formatted.contains("error_location.rs"));
    assert!(formatted.contains(&location.line.to_string()));
    assert_eq!(
        formatted.matches(':').count(),
        2,
        "Should have exactly 2 colons"
    );
}

/// **VALUE**: Verifies that `ErrorLocation::caller()` reports the caller of a
/// `#[track_caller]` helper, not the helper itself.
///
/// **WHY THIS MATTERS**: Error constructors in tunnel-core are `#[track_caller]` helpers.
/// Without propagation every error would point at the constructor body.
#[test]
fn given_track_caller_helper_when_capturing_location_then_each_call_site_is_distinct() {
    // GIVEN: A helper that captures its caller
    #[track_caller]
    fn capture_location() -> ErrorLocation {
        ErrorLocation::caller()
    }

    // WHEN: Capturing location from two consecutive call sites
    let first = capture_location();
    let second = capture_location();

    // THEN: Same file, sequential lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line, "Lines should be sequential");
}

//! Property test for the SSE parser's round-trip law:
//! `parse(format(event)) == event` for any event the parser can legally
//! emit.

use mcp_endpoint_rt::sse::{SseEvent, SseParser};
use proptest::prelude::*;

/// Field values restricted to a single line with no control characters —
/// the universe `format()`/`feed_line()` actually round-trip. A `data`
/// value may still span multiple lines; `format()` re-splits on `\n`.
fn single_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.!?/_-]{0,24}"
}

fn arb_event() -> impl Strategy<Value = SseEvent> {
    (
        prop_oneof![Just("message".to_string()), single_line()],
        proptest::option::of(single_line()),
        proptest::collection::vec(single_line(), 1..4),
        proptest::option::of(0u64..100_000),
    )
        .prop_map(|(event_type, id, data_lines, retry)| SseEvent {
            event_type: if event_type.is_empty() { "message".to_string() } else { event_type },
            id: id.filter(|s| !s.is_empty()),
            data: data_lines.join("\n"),
            retry,
        })
}

proptest! {
    #[test]
    fn format_then_parse_round_trips(event in arb_event()) {
        let wire = event.format();
        let mut parser = SseParser::new();
        let mut emitted = None;
        for line in wire.split('\n') {
            if let Some(e) = parser.feed_line(line) {
                emitted = Some(e);
            }
        }
        let emitted = emitted.expect("format() always terminates with a blank line that flushes the event");
        prop_assert_eq!(emitted.event_type, event.event_type);
        prop_assert_eq!(emitted.id, event.id);
        prop_assert_eq!(emitted.data, event.data);
        prop_assert_eq!(emitted.retry, event.retry);
    }

    /// `eventType` and `id` persist on the parser across a second event
    /// that supplies only `data`, matching the WHATWG EventSource model.
    #[test]
    fn event_type_and_id_persist_across_a_bare_data_event(event in arb_event(), second_data in proptest::collection::vec(single_line(), 1..3)) {
        let mut parser = SseParser::new();
        for line in event.format().split('\n') {
            parser.feed_line(line);
        }

        let mut second = None;
        for line in second_data.join("\n").split('\n') {
            if let Some(e) = parser.feed_line(&format!("data: {line}")) {
                second = Some(e);
            }
        }
        if let Some(e) = parser.feed_line("") {
            second = Some(e);
        }

        let second = second.expect("a blank line after data always flushes");
        prop_assert_eq!(second.event_type, event.event_type);
        prop_assert_eq!(second.id, event.id);
    }
}

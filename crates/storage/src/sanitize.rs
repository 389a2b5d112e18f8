//! Bounds on what is sent back to the query service

use model::{Trace, Value};

const ELLIPSIS: &str = "...";

/// Truncate string span tags longer than `max_len` bytes to `max_len - 3`
/// bytes (backing off to a char boundary) followed by `...`
pub fn sanitize_trace(trace: &mut Trace, max_len: usize) {
    for span in &mut trace.spans {
        for tag in &mut span.tags {
            if let Value::Str(value) = &mut tag.value {
                truncate_value(value, max_len);
            }
        }
    }
}

fn truncate_value(value: &mut String, max_len: usize) {
    if value.len() <= max_len {
        return;
    }
    let mut end = max_len.saturating_sub(ELLIPSIS.len());
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
    value.push_str(ELLIPSIS);
}

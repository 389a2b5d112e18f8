//! Quoting of user-supplied values
//!
//! Values never become identifiers; they are only ever emitted inside a quoted
//! literal, with the quote character and backslash escaped.

/// `'value'`
pub fn single(value: &str) -> String {
    quote(value, '\'')
}

/// `"value"`
pub fn double(value: &str) -> String {
    quote(value, '"')
}

fn quote(value: &str, q: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(q);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            c if c == q => {
                out.push(q);
                out.push(q);
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

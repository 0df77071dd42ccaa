use ryu::Buffer;
use std::cell::RefCell;

/// Shortest round-trip rendering of a score; integral values drop the `.0`.
#[inline]
pub fn fmt_f64(buf: &mut Buffer, score: f64) -> &str {
    if !score.is_finite() {
        return if score.is_nan() {
            "nan"
        } else if score > 0.0 {
            "inf"
        } else {
            "-inf"
        };
    }
    let formatted = buf.format_finite(score);
    formatted.strip_suffix(".0").unwrap_or(formatted)
}

thread_local! {
    static FMT_BUF: RefCell<Buffer> = RefCell::new(Buffer::new());
}

#[inline]
pub fn with_fmt_buf<F, R>(f: F) -> R
where
    F: FnOnce(&mut Buffer) -> R,
{
    FMT_BUF.with(|b| f(&mut b.borrow_mut()))
}

/// Owned rendering of a score using the thread-local buffer.
pub fn score_string(score: f64) -> String {
    with_fmt_buf(|b| fmt_f64(b, score).to_owned())
}

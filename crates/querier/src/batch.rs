/// Default maximum number of spans per streamed chunk
pub const DEFAULT_SPAN_BATCH_SIZE: usize = 1000;

/// Split `items` into consecutive chunks of at most `max` items, preserving
/// order. A `max` of zero means [`DEFAULT_SPAN_BATCH_SIZE`].
pub fn batch<T>(items: Vec<T>, max: usize) -> Vec<Vec<T>> {
    let max = if max == 0 { DEFAULT_SPAN_BATCH_SIZE } else { max };

    let mut chunks = Vec::with_capacity(items.len().div_ceil(max));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(max).collect());
    }
    chunks
}

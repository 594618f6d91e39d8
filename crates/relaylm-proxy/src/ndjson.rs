//! Newline-delimited JSON line splitting.
//!
//! Ollama streams one JSON document per line. Network chunks do not respect
//! line boundaries, so bytes are buffered until a full line is available.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use relaylm_core::{BackendError, LineStream};

/// State threaded through the `unfold` stream.
struct LineState<S> {
    stream: S,
    buf: BytesMut,
    exhausted: bool,
}

/// Split a byte stream into trimmed, non-empty lines.
///
/// A trailing line without a final newline is still yielded once the
/// upstream ends. After an upstream error the stream yields that error and
/// then ends.
pub fn ndjson_lines<S>(byte_stream: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, BackendError>> + Send + 'static,
{
    let state = LineState {
        stream: byte_stream.boxed(),
        buf: BytesMut::new(),
        exhausted: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            // Try to extract a complete line from the buffer.
            if let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end);
                if let Some(text) = decode_line(&line) {
                    return Some((Ok(text), st));
                }
                continue;
            }

            if st.exhausted {
                if st.buf.is_empty() {
                    return None;
                }
                let rest = st.buf.split();
                return decode_line(&rest).map(|text| (Ok(text), st));
            }

            // Need more data from upstream.
            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.exhausted = true;
                    st.buf.clear();
                    return Some((Err(e), st));
                }
                None => st.exhausted = true,
            }
        }
    })
    .boxed()
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Find the next newline in the buffer, returning the position after it.
fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, BackendError>> + Send {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(lines: LineStream) -> Vec<Result<String, BackendError>> {
        lines.collect().await
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let lines = collect(ndjson_lines(chunks(vec![
            "{\"response\":\"a\"}\n{\"resp",
            "onse\":\"b\"}\n",
        ])))
        .await;

        assert_eq!(
            lines,
            vec![
                Ok(r#"{"response":"a"}"#.to_string()),
                Ok(r#"{"response":"b"}"#.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_tail_flushed() {
        let lines = collect(ndjson_lines(chunks(vec!["\n\r\n{\"a\":1}\n\n", "{\"b\":2}"]))).await;
        assert_eq!(
            lines,
            vec![Ok(r#"{"a":1}"#.to_string()), Ok(r#"{"b":2}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"partial")),
            Err(BackendError::Unreachable("connection reset".into())),
            Ok(Bytes::from_static(b"{\"never\":true}\n")),
        ]);

        let lines = collect(ndjson_lines(upstream)).await;
        assert_eq!(
            lines,
            vec![
                Ok(r#"{"a":1}"#.to_string()),
                Err(BackendError::Unreachable("connection reset".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_upstream() {
        let lines = collect(ndjson_lines(chunks(vec![]))).await;
        assert!(lines.is_empty());
    }
}

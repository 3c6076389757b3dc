use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::event::LogEvent;
use crate::observer::ObserverSlot;

/// Matches the level tag of the server's main thread, e.g. `[Server thread/WARN]`
static SERVER_THREAD_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Server thread/(\w+)\]").expect("server thread pattern is valid")
});

/// Longest accepted output line, excluding the line break
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Standard stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Turn one output line into an event
///
/// Stderr is always `error`. Stdout lines follow their server thread level
/// tag, and untagged lines are `log`.
pub fn classify(kind: StreamKind, text: String) -> LogEvent {
    if kind == StreamKind::Stderr {
        return LogEvent::Error { text };
    }
    let level = SERVER_THREAD_LEVEL
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    match level.as_deref() {
        Some("ERROR") => LogEvent::Error { text },
        Some("WARN") => LogEvent::Warn { text },
        _ => LogEvent::Log { text },
    }
}

/// Read one line into `buf`, returning the bytes read (0 at end of stream)
///
/// A line longer than [`MAX_LINE_BYTES`] is an `InvalidData` error.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (MAX_LINE_BYTES + 1) as u64;
    let read = reader.take(limit).read_until(b'\n', buf).await?;
    if read > MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("line exceeds {MAX_LINE_BYTES} bytes"),
        ));
    }
    Ok(read)
}

/// Read `stream` line by line until end of stream, forwarding each line
///
/// Invalid UTF-8 is replaced rather than ending the reader. A read error,
/// including an overlong line, is logged and stops this stream only.
pub fn spawn_reader<R>(stream: R, kind: StreamKind, observers: Arc<ObserverSlot>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match read_line(&mut reader, &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if kind == StreamKind::Stderr {
                        tracing::warn!(target: "mcpanel::server", "{line}");
                    }
                    observers.emit(classify(kind, line));
                }
                Err(err) => {
                    tracing::warn!(stream = ?kind, error = %err, "failed to read server output");
                    break;
                }
            }
        }
        tracing::debug!(stream = ?kind, "server output closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[12:00:00] [Server thread/WARN]: low disk", "warn")]
    #[case("[Server thread/WARN]: low disk", "warn")]
    #[case("[Server thread/ERROR]: boom", "error")]
    #[case("[Server thread/INFO]: Done (3.2s)!", "log")]
    #[case("Starting minecraft server version 1.21", "log")]
    #[case("[Worker-Main-1/WARN]: other thread", "log")]
    fn classify_stdout_follows_server_thread_level(#[case] line: &str, #[case] expected: &str) {
        let event = classify(StreamKind::Stdout, line.to_string());
        assert_eq!(event.kind(), expected);
        assert_eq!(event.text(), Some(line));
    }

    #[rstest]
    #[case("Exception in thread \"main\" java.lang.Error")]
    #[case("[Server thread/INFO]: looks harmless")]
    #[case("")]
    fn classify_stderr_is_always_error(#[case] line: &str) {
        assert_eq!(classify(StreamKind::Stderr, line.to_string()).kind(), "error");
    }

    #[tokio::test]
    async fn spawn_reader_forwards_lines_in_order() {
        let observers = Arc::new(ObserverSlot::new());
        let mut handle = observers.attach();
        let input: &[u8] = b"first\r\n[Server thread/WARN]: second\nno trailing newline";

        spawn_reader(input, StreamKind::Stdout, observers.clone())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = handle.events.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                LogEvent::Log {
                    text: "first".into()
                },
                LogEvent::Warn {
                    text: "[Server thread/WARN]: second".into()
                },
                LogEvent::Log {
                    text: "no trailing newline".into()
                },
            ]
        );
    }

    /// Yields its data once, then fails every later read
    struct FailingReader {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    std::task::Poll::Ready(Ok(()))
                }
                None => std::task::Poll::Ready(Err(std::io::Error::other("pipe broke"))),
            }
        }
    }

    fn drain(handle: &mut crate::observer::ObserverHandle) -> Vec<LogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = handle.events.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn spawn_reader_stops_after_read_error() {
        let observers = Arc::new(ObserverSlot::new());
        let mut handle = observers.attach();
        let reader = FailingReader {
            data: Some(b"before failure\n"),
        };

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            spawn_reader(reader, StreamKind::Stdout, observers.clone()),
        )
        .await
        .expect("reader should end on error")
        .unwrap();

        assert_eq!(
            drain(&mut handle),
            vec![LogEvent::Log {
                text: "before failure".into()
            }]
        );
    }

    #[tokio::test]
    async fn spawn_reader_stops_on_overlong_line() {
        let observers = Arc::new(ObserverSlot::new());
        let mut handle = observers.attach();
        let mut input = b"short\n".to_vec();
        input.extend(std::iter::repeat_n(b'x', MAX_LINE_BYTES + 10));
        input.extend_from_slice(b"\nafter\n");

        spawn_reader(std::io::Cursor::new(input), StreamKind::Stdout, observers.clone())
            .await
            .unwrap();

        assert_eq!(
            drain(&mut handle),
            vec![LogEvent::Log {
                text: "short".into()
            }]
        );
    }

    #[tokio::test]
    async fn spawn_reader_accepts_line_at_limit() {
        let observers = Arc::new(ObserverSlot::new());
        let mut handle = observers.attach();
        let mut input = vec![b'y'; MAX_LINE_BYTES];
        input.push(b'\n');

        spawn_reader(std::io::Cursor::new(input), StreamKind::Stdout, observers.clone())
            .await
            .unwrap();

        let events = drain(&mut handle);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text().map(str::len), Some(MAX_LINE_BYTES));
    }

    #[tokio::test]
    async fn spawn_reader_replaces_invalid_utf8() {
        let observers = Arc::new(ObserverSlot::new());
        let mut handle = observers.attach();
        let input: &[u8] = b"bad \xff byte\n";

        spawn_reader(input, StreamKind::Stderr, observers.clone())
            .await
            .unwrap();

        let event = handle.events.try_recv().unwrap();
        assert_eq!(event.kind(), "error");
        assert_eq!(event.text(), Some("bad \u{fffd} byte"));
    }
}

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use hauler_model::JobId;

/// How worker stderr is relayed into the supervisor's log.
#[derive(Debug, Clone, Copy)]
pub struct StderrLogConfig {
    /// Max line length before truncation.
    pub max_line_length: usize,
    /// Log lines at WARN level (false = DEBUG).
    pub warn: bool,
}

impl Default for StderrLogConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            warn: true,
        }
    }
}

/// Cut `line` to at most `max` bytes on a char boundary, marking the cut.
pub(crate) fn truncate_line(line: &str, max: usize) -> String {
    if line.len() <= max {
        return line.to_string();
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &line[..end])
}

/// Read the next `\n`-terminated line, replacing invalid UTF-8 instead of failing.
///
/// Partial input stays in `buf` when the future is dropped, so the call is safe to race in
/// `select!` as long as the same `buf` is passed again. Returns `None` at end of input.
pub(crate) async fn read_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let n = reader.read_until(b'\n', buf).await?;
    if n == 0 && buf.is_empty() {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Ok(Some(line))
}

pub(crate) async fn relay_stderr<R>(job_id: JobId, reader: R, cfg: StderrLogConfig)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        let line = match read_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(job = job_id, error = %e, "worker stderr closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let line = truncate_line(&line, cfg.max_line_length);
        if cfg.warn {
            warn!(target: "hauler_exec::worker_stderr", job = job_id, "{line}");
        } else {
            debug!(target: "hauler_exec::worker_stderr", job = job_id, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(truncate_line("hello", 10), "hello");
    }

    #[test]
    fn long_lines_are_cut_on_char_boundary() {
        assert_eq!(truncate_line("abcdef", 3), "abc…");
        // 'é' is two bytes; a cut inside it backs off to the previous boundary.
        assert_eq!(truncate_line("aé", 2), "a…");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let input: &[u8] = b"caf\xe9\r\nok\nlast";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        let first = read_line_lossy(&mut reader, &mut buf).await.unwrap();
        assert_eq!(first.as_deref(), Some("caf\u{fffd}"));
        let second = read_line_lossy(&mut reader, &mut buf).await.unwrap();
        assert_eq!(second.as_deref(), Some("ok"));
        let third = read_line_lossy(&mut reader, &mut buf).await.unwrap();
        assert_eq!(third.as_deref(), Some("last"));
        assert_eq!(read_line_lossy(&mut reader, &mut buf).await.unwrap(), None);
    }
}

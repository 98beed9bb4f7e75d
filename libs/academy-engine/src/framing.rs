/// Output Channel Framing
///
/// The wrapped child buffers the learner's stdout/stderr internally and, once
/// the learner code has finished or raised, prints both buffers on its real
/// stdout between sentinel markers:
///
/// ```text
/// __STDOUT_START__<stdout>__STDOUT_END____STDERR_START__<stderr>__STDERR_END__
/// ```
///
/// Stdout runs up to the last `STDOUT_END` that is directly followed by
/// `STDERR_START`; stderr runs up to the last `STDERR_END`. A missing pair
/// (the child died before printing) yields an empty string for that stream.

pub const STDOUT_START: &str = "__STDOUT_START__";
pub const STDOUT_END: &str = "__STDOUT_END__";
pub const STDERR_START: &str = "__STDERR_START__";
pub const STDERR_END: &str = "__STDERR_END__";

/// The two streams recovered from a framed stdout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramedOutput {
    pub stdout: String,
    pub stderr: String,
    /// False when neither marker pair was found
    pub complete: bool,
}

/// Recover learner stdout and stderr from the child's raw stdout
pub fn unframe(raw: &str) -> FramedOutput {
    let Some(start) = raw.find(STDOUT_START) else {
        return FramedOutput::default();
    };
    let body = &raw[start + STDOUT_START.len()..];
    let separator = format!("{}{}", STDOUT_END, STDERR_START);

    // Both blocks close at their last marker so learner text cannot cut either short
    let stderr_close = body.rfind(STDERR_END);
    let searched = &body[..stderr_close.unwrap_or(body.len())];

    let (stdout, stderr) = match searched.rfind(&separator) {
        Some(sep) => {
            let open = sep + separator.len();
            (Some(&body[..sep]), stderr_close.map(|close| &body[open..close]))
        }
        None => (body.rfind(STDOUT_END).map(|close| &body[..close]), None),
    };

    FramedOutput {
        complete: stdout.is_some() && stderr.is_some(),
        stdout: stdout.unwrap_or_default().to_string(),
        stderr: stderr.unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stdout: &str, stderr: &str) -> String {
        format!(
            "{}{}{}{}{}{}",
            STDOUT_START, stdout, STDOUT_END, STDERR_START, stderr, STDERR_END
        )
    }

    #[test]
    fn test_unframe_both_streams() {
        let framed = unframe(&frame("hello\nworld\n", "warning: x\n"));
        assert_eq!(framed.stdout, "hello\nworld\n");
        assert_eq!(framed.stderr, "warning: x\n");
        assert!(framed.complete);
    }

    #[test]
    fn test_unframe_preserves_whitespace_exactly() {
        let framed = unframe(&frame("  42  \n\n", ""));
        assert_eq!(framed.stdout, "  42  \n\n");
        assert_eq!(framed.stderr, "");
    }

    #[test]
    fn test_unframe_missing_markers_defaults_empty() {
        let framed = unframe("Traceback (most recent call last):\n  ImportError");
        assert_eq!(framed, FramedOutput::default());
    }

    #[test]
    fn test_unframe_truncated_stderr_block() {
        let raw = format!("{}out{}{}partial", STDOUT_START, STDOUT_END, STDERR_START);
        let framed = unframe(&raw);
        assert_eq!(framed.stdout, "out");
        assert_eq!(framed.stderr, "");
        assert!(!framed.complete);
    }

    #[test]
    fn test_unframe_ignores_noise_outside_frames() {
        let raw = format!("noise before{}trailing", frame("a", "b"));
        let framed = unframe(&raw);
        assert_eq!(framed.stdout, "a");
        assert_eq!(framed.stderr, "b");
    }

    #[test]
    fn test_stderr_containing_end_marker_text() {
        let framed = unframe(&frame("", &format!("printed {} early", STDERR_END)));
        assert_eq!(framed.stderr, format!("printed {} early", STDERR_END));
    }

    #[test]
    fn test_stdout_containing_end_marker_text() {
        let printed = format!("before {} after\n", STDOUT_END);
        let framed = unframe(&frame(&printed, "err"));
        assert_eq!(framed.stdout, printed);
        assert_eq!(framed.stderr, "err");
        assert!(framed.complete);
    }

    #[test]
    fn test_stdout_containing_whole_separator() {
        let printed = format!("{}{}not stderr", STDOUT_END, STDERR_START);
        let framed = unframe(&frame(&printed, ""));
        assert_eq!(framed.stdout, printed);
        assert_eq!(framed.stderr, "");
    }
}

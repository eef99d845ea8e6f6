use std::io::Write;
use std::sync::Arc;

use crate::downloader::ProgressFn;

const MIB: f64 = 1024.0 * 1024.0;

/// Prints a single, rewriting progress line per download to stdout.
///
/// Concurrent downloads share the terminal line, so the label is always
/// included.
pub fn default_progress_fn() -> ProgressFn {
    Arc::new(|label: &str, current: u64, total: u64, mib_per_sec: f64, complete: bool| {
        let line = format_line(label, current, total, mib_per_sec);
        let mut out = std::io::stdout().lock();
        if complete {
            let _ = writeln!(out, "\r\x1b[K{line}");
        } else {
            let _ = write!(out, "\r\x1b[K{line}");
            let _ = out.flush();
        }
    })
}

fn format_line(label: &str, current: u64, total: u64, mib_per_sec: f64) -> String {
    if total > 0 {
        format!(
            "downloading {}... {:.1} MiB of {:.1} MiB ({:.2} MiB/s)",
            label,
            current as f64 / MIB,
            total as f64 / MIB,
            mib_per_sec
        )
    } else {
        format!(
            "downloading {}... {:.1} MiB ({:.2} MiB/s)",
            label,
            current as f64 / MIB,
            mib_per_sec
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_omits_unknown_total() {
        assert_eq!(
            format_line("a.jar", 1024 * 1024, 0, 1.5),
            "downloading a.jar... 1.0 MiB (1.50 MiB/s)"
        );
        assert_eq!(
            format_line("a.jar", 1024 * 1024, 2 * 1024 * 1024, 0.0),
            "downloading a.jar... 1.0 MiB of 2.0 MiB (0.00 MiB/s)"
        );
    }
}

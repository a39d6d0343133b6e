//! Logging helpers

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Width used for banner blocks
pub const BANNER_WIDTH: usize = 60;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` when verbose, `info` when
/// not. Calling it twice is harmless: the second install is ignored.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init();
}

/// Render lines centred inside a `=` border, e.g.
///
/// ```text
/// ==========
/// ==  Hi  ==
/// ==========
/// ```
pub fn heading_block<S: AsRef<str>>(lines: &[S], width: usize) -> String {
    const BORDER: &str = "==";
    // border plus one space on each side
    let chrome = (BORDER.len() + 1) * 2;
    let rule = "=".repeat(width);

    let mut out = vec![rule.clone()];
    for line in lines {
        let line = line.as_ref();
        let free = width.saturating_sub(line.chars().count() + chrome);
        let left = free / 2;
        let right = free - left;
        out.push(format!(
            "{} {}{}{} {}",
            BORDER,
            " ".repeat(left),
            line,
            " ".repeat(right),
            BORDER
        ));
    }
    out.push(rule);
    out.join("\n")
}

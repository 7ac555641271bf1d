use tracing_subscriber::EnvFilter;

/// All workspace crate targets that should receive log output.
const CRATE_TARGETS: &[&str] = &[
    "boreas",
    "boreas_adjust",
    "boreas_group",
    "boreas_mbcn",
    "boreas_quantile",
    "boreas_stats",
];

/// Filter directive for a verbosity level.
///
/// Mapping:
/// - 0 -> warn
/// - 1 -> info
/// - 2 -> debug
/// - 3+ -> trace
fn default_filter(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    CRATE_TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing for all workspace crates.
///
/// `RUST_LOG` overrides `verbosity` if set. Calling this again after a
/// subscriber is installed is a no-op.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert!(default_filter(0).contains("boreas_adjust=warn"));
        assert!(default_filter(2).contains("boreas_mbcn=debug"));
        assert!(default_filter(7).starts_with("boreas=trace"));
    }

    #[test]
    fn init_twice_is_harmless() {
        init(1);
        init(3);
    }
}

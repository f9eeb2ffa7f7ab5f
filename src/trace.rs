use tracing_subscriber::{
    fmt::format::FmtSpan,
    prelude::*,
    EnvFilter,
};

use util::bootstrap;

/// Overrides the default directives entirely when set.
const FILTER_ENV: &str = "GSLINK_LOG";

/// The binary and the link-layer crates underneath it, outermost first.
const LINK_TARGETS: [&str; 4] = ["gslink", "gslink_runtime", "gslink_codec", "gslink_message"];

pub fn init(verbosity: u8) {
    // span close events carry the timing of each exchange
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);

    let stderr_layer = {
        cfg_if::cfg_if! {
            if #[cfg(debug_assertions)] {
                stderr_layer.pretty()
            } else {
                stderr_layer.json()
            }
        }
    };

    let level_filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));
    bootstrap!("enabling tracing with filter directive: {}", level_filter);

    tracing_subscriber::registry().with(level_filter).with(stderr_layer).init();
}

/// Everything else stays at the base level; `-v` raises only the link crates.
fn directives(verbosity: u8) -> String {
    let (base, link) = match (cfg!(debug_assertions), verbosity) {
        (_, 2..=u8::MAX) => ("info", "trace"),
        (true, _) | (false, 1) => ("info", "debug"),
        (false, 0) => ("warn", "info"),
    };

    std::iter::once(base.to_owned())
        .chain(LINK_TARGETS.iter().map(|target| format!("{}={}", target, link)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verbosity_raises_link_crates() {
        assert!(directives(2).ends_with("gslink_message=trace"));
        assert!(directives(2).starts_with("info,gslink=trace,gslink_runtime=trace"));
        assert_eq!(directives(1).split(',').count(), LINK_TARGETS.len() + 1);

        for directive in [directives(0), directives(1), directives(5)] {
            assert!(directive.parse::<EnvFilter>().is_ok(), "{}", directive);
        }
    }
}

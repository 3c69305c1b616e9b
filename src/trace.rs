use std::str::FromStr;

use tracing_subscriber::{
    fmt::format::FmtSpan,
    prelude::*,
    EnvFilter,
};

use util::bootstrap;

pub fn init(pretty: bool) -> eyre::Result<()> {
    let level_filter = mk_level_filter()?;
    bootstrap!("enabling tracing with filter directive: {}", level_filter);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let s = tracing_subscriber::registry();

    if pretty {
        s.with(stderr_layer.pretty().with_filter(level_filter)).init();
    } else {
        s.with(
            stderr_layer
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE)
                .with_filter(level_filter),
        )
        .init();
    }

    Ok(())
}

fn mk_level_filter() -> eyre::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let default_str = {
        cfg_if::cfg_if! {
            if #[cfg(not(debug_assertions))] {
                "warn,roplink=info,roplink_net=info,roplink_runtime=info,roplink_codec=info,roplink_message=info,roplink_util=info"
            } else {
                "info,roplink=debug,roplink_net=debug,roplink_runtime=debug,roplink_codec=debug,roplink_message=debug,roplink_util=debug"
            }
        }
    };

    Ok(EnvFilter::from_str(default_str)?)
}

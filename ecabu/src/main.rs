//! ecabu command line

use ecabu::{Cli, Options, log_filter, run};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let invocation = match Cli::parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                log_filter(invocation.cli.verbose, &invocation.cli.debug).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = Options::from_invocation(invocation)
        .map_err(ecabu::EcabuError::from)
        .and_then(|options| run(&options));

    if let Err(err) = result {
        tracing::error!("{}", err);
        std::process::exit(err.exit_code());
    }
}

use super::{server, Action};
use crate::cli::telemetry;
use anyhow::Result;

pub(super) async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
    };

    // flush pending spans whether or not the action succeeded
    telemetry::shutdown_tracer();

    result
}

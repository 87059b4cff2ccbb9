//! Command dispatch: bridges CLI args -> reconcilers -> output formatting.

pub mod apply;
pub mod destroy;
pub mod get;
pub mod plan;
pub mod validate;

mod session;

pub use session::Session;

use zenform_core::HttpStore;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: &Session<'_, HttpStore>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Plan(args) => plan::handle(session, &args.manifest, global).await,
        Command::Apply(args) => apply::handle(session, &args.manifest, global).await,
        Command::Destroy(args) => destroy::handle(session, &args.manifest, global).await,
        Command::Import(args) => get::import(session, &args, global).await,
        Command::Get(args) => get::handle(session, &args, global).await,
        // Validate never needs a connection and is handled before dispatch
        Command::Validate(args) => validate::handle(&args.manifest, global),
    }
}

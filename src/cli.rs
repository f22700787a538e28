//! CLI domain: parse, route, output, and presentation only.
//! No progress orchestration; a single route table dispatches to the runtime.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_handlers_json, format_handlers_text, format_run_json, format_run_text, RunSummary,
};
pub use route::{RunContext, RunRequest};

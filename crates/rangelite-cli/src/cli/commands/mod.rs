//! CLI command handlers, one per file.

mod fetch;
mod report_name;
mod rewrite;

pub use fetch::{run_fetch, FetchOverrides};
pub use report_name::run_report_name;
pub use rewrite::{run_rewrite, RewriteArgs};

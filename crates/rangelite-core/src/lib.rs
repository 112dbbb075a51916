pub mod audit;
pub mod compositor;
pub mod config;
pub mod fetch;
pub mod intercept;
pub mod logging;
pub mod matcher;
pub mod page;
pub mod rewrite;
pub mod session;

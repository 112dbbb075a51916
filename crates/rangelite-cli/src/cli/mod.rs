//! CLI for rangelite.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rangelite_core::config;
use std::path::PathBuf;

use commands::{run_fetch, run_report_name, run_rewrite, FetchOverrides, RewriteArgs};

/// Top-level CLI for rangelite.
#[derive(Debug, Parser)]
#[command(name = "rangelite")]
#[command(about = "rangelite: range-probed, partially fetched, reflected page images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Probe, partially fetch and composite a single image.
    Fetch {
        /// Direct HTTP/HTTPS image URL.
        url: String,

        /// Share of the image's bytes to fetch, in (0, 1]. Overrides config.
        #[arg(long, value_name = "F")]
        fraction: Option<f64>,

        /// Embed the fetched bytes as-is instead of compositing a reflection.
        #[arg(long)]
        no_reflect: bool,

        /// Fetch the original URL instead of the rewritten one.
        #[arg(long)]
        no_rewrite: bool,

        /// Where to write the resulting image (default: reflection.<ext> in the current dir).
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// Print an image URL after rule-based rewriting.
    Rewrite {
        url: String,

        /// Target width (default from config).
        #[arg(long)]
        width: Option<u32>,

        /// Target height (default from config).
        #[arg(long)]
        height: Option<u32>,

        /// Target quality (default from config).
        #[arg(long)]
        quality: Option<u32>,

        /// Target format token, e.g. webp (default from config).
        #[arg(long)]
        format: Option<String>,

        /// Use the extended CDN rule table instead of the reduced one.
        #[arg(long)]
        extended: bool,
    },

    /// Print the navigation URL and report file name for a domain.
    ReportName {
        /// Domain or host path, e.g. example.com or localhost.
        domain: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                url,
                fraction,
                no_reflect,
                no_rewrite,
                out,
            } => {
                let overrides = FetchOverrides {
                    fraction,
                    no_reflect,
                    no_rewrite,
                };
                run_fetch(cfg, &url, overrides, out.as_deref()).await?;
            }
            CliCommand::Rewrite {
                url,
                width,
                height,
                quality,
                format,
                extended,
            } => {
                let args = RewriteArgs {
                    width,
                    height,
                    quality,
                    format,
                    extended,
                };
                run_rewrite(&cfg, &url, args);
            }
            CliCommand::ReportName { domain } => run_report_name(&domain),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

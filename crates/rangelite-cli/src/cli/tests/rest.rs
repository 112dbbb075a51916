//! Tests for rewrite and report-name subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_rewrite_defaults() {
    match parse(&["rangelite", "rewrite", "https://example.com/a.jpg?width=900"]) {
        CliCommand::Rewrite {
            url,
            width,
            height,
            quality,
            format,
            extended,
        } => {
            assert_eq!(url, "https://example.com/a.jpg?width=900");
            assert!(width.is_none());
            assert!(height.is_none());
            assert!(quality.is_none());
            assert!(format.is_none());
            assert!(!extended);
        }
        _ => panic!("expected Rewrite"),
    }
}

#[test]
fn cli_parse_rewrite_params() {
    match parse(&[
        "rangelite",
        "rewrite",
        "https://example.com/a.jpg",
        "--width",
        "320",
        "--height",
        "240",
        "--quality",
        "70",
        "--format",
        "avif",
        "--extended",
    ]) {
        CliCommand::Rewrite {
            width,
            height,
            quality,
            format,
            extended,
            ..
        } => {
            assert_eq!(width, Some(320));
            assert_eq!(height, Some(240));
            assert_eq!(quality, Some(70));
            assert_eq!(format.as_deref(), Some("avif"));
            assert!(extended);
        }
        _ => panic!("expected Rewrite with params"),
    }
}

#[test]
fn cli_parse_report_name() {
    match parse(&["rangelite", "report-name", "localhost"]) {
        CliCommand::ReportName { domain } => assert_eq!(domain, "localhost"),
        _ => panic!("expected ReportName"),
    }
}

#[test]
fn cli_parse_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["rangelite", "add", "https://example.com/"]).is_err());
}

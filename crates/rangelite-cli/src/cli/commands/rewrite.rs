//! `rangelite rewrite <url>` – print the rewritten URL.

use rangelite_core::config::{LiteConfig, RuleSetKind};
use rangelite_core::rewrite::{RewriteValues, RuleSet};

/// Per-run rewrite parameters; unset ones come from config.
#[derive(Debug, Clone, Default)]
pub struct RewriteArgs {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u32>,
    pub format: Option<String>,
    pub extended: bool,
}

pub fn rewritten(cfg: &LiteConfig, url: &str, args: &RewriteArgs) -> String {
    let targets = cfg.rewrite_targets();
    let values = RewriteValues {
        width: args.width.unwrap_or(targets.width),
        height: args.height.unwrap_or(targets.height),
        quality: args.quality.unwrap_or(targets.quality),
        format: args.format.as_deref().unwrap_or(&targets.format),
    };
    let kind = if args.extended {
        RuleSetKind::Extended
    } else {
        cfg.rule_set
    };
    RuleSet::for_kind(kind).rewrite(url, &values)
}

pub fn run_rewrite(cfg: &LiteConfig, url: &str, args: RewriteArgs) {
    println!("{}", rewritten(cfg, url, &args));
}

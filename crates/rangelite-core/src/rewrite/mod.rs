//! URL rewrite rule engine.
//!
//! Many image servers encode the delivered size, quality and format in the
//! URL. Rewriting those parameters towards the displayed size lets the server
//! do part of the byte reduction. Rules run in table order and compose: each
//! one sees the URL produced by the previous rule, and replaces only its first
//! match. A URL no rule matches is returned verbatim.

mod rules;

pub use rules::{ParamKind, RewriteRule, RewriteValues};

use crate::config::{RewriteTargets, RuleSetKind};
use once_cell::sync::Lazy;

static REDUCED_SET: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(rules::REDUCED));
static EXTENDED_SET: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(rules::EXTENDED));

/// Ordered rewrite table, grouped by parameter kind.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    fn compile(table: &[(ParamKind, &'static str)]) -> Self {
        let rules = table
            .iter()
            .map(|(kind, template)| {
                RewriteRule::compile(*kind, template).expect("built-in rewrite template compiles")
            })
            .collect();
        Self { rules }
    }

    pub fn reduced() -> &'static RuleSet {
        &REDUCED_SET
    }

    pub fn extended() -> &'static RuleSet {
        &EXTENDED_SET
    }

    pub fn for_kind(kind: RuleSetKind) -> &'static RuleSet {
        match kind {
            RuleSetKind::Reduced => Self::reduced(),
            RuleSetKind::Extended => Self::extended(),
        }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Applies every rule in order to the accumulated URL.
    pub fn rewrite(&self, url: &str, values: &RewriteValues<'_>) -> String {
        let mut current = url.to_string();
        for rule in &self.rules {
            let next = rule.apply(&current, values);
            if next != current {
                tracing::trace!(template = rule.template(), "rewrite rule matched");
                current = next.into_owned();
            }
        }
        current
    }

    /// Rewrites with the parameters from config.
    pub fn rewrite_with_targets(&self, url: &str, targets: &RewriteTargets) -> String {
        self.rewrite(
            url,
            &RewriteValues {
                width: targets.width,
                height: targets.height,
                quality: targets.quality,
                format: &targets.format,
            },
        )
    }
}

/// Rewrites `url` with the reduced table.
pub fn rewrite(url: &str, width: u32, height: u32, quality: u32, format: &str) -> String {
    RuleSet::reduced().rewrite(
        url,
        &RewriteValues {
            width,
            height,
            quality,
            format,
        },
    )
}

//! Rule templates and their compiled regex form.

use regex::{Captures, Regex};
use std::borrow::Cow;

/// Parameter a rule rewrites. Tables are ordered width, height, quality, format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKind {
    Width,
    Height,
    Quality,
    Format,
}

/// One (pattern, replacement-template) pair.
///
/// The template uses `%w`, `%h`, `%q`, `%f` placeholders. The pattern is the
/// template with literal text escaped, numeric placeholders matching `[0-9]+`
/// and `%f` matching `[a-z]+`. A template that starts with a word character
/// only matches at a parameter boundary, so `h=%h` never matches inside
/// `width=`. Group 1 holds the boundary character and is kept on replace.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pub kind: ParamKind,
    template: &'static str,
    pattern: Regex,
}

impl RewriteRule {
    pub(crate) fn compile(kind: ParamKind, template: &'static str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&template_to_pattern(template))?;
        Ok(Self {
            kind,
            template,
            pattern,
        })
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Replaces the first match in `url`, keeping the boundary before it.
    pub(crate) fn apply<'u>(&self, url: &'u str, values: &RewriteValues<'_>) -> Cow<'u, str> {
        let rendered = self.render(values);
        self.pattern
            .replace(url, |caps: &Captures<'_>| format!("{}{}", &caps[1], rendered))
    }

    /// Template with every placeholder substituted.
    pub(crate) fn render(&self, values: &RewriteValues<'_>) -> String {
        self.template
            .replace("%w", &values.width.to_string())
            .replace("%h", &values.height.to_string())
            .replace("%q", &values.quality.to_string())
            .replace("%f", values.format)
    }
}

/// Concrete parameter values for one rewrite call.
#[derive(Debug, Clone, Copy)]
pub struct RewriteValues<'a> {
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub format: &'a str,
}

fn template_to_pattern(template: &str) -> String {
    let mut out = String::with_capacity(template.len() * 2 + 24);
    match template.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '%' => out.push_str("(^|[^A-Za-z0-9_])"),
        _ => out.push_str("()"),
    }
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let class = match chars.peek() {
                Some('w') | Some('h') | Some('q') => Some("[0-9]+"),
                Some('f') => Some("[a-z]+"),
                _ => None,
            };
            if let Some(class) = class {
                chars.next();
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(class);
                continue;
            }
        }
        literal.push(c);
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Query-parameter table the measurements actually ran with.
pub(crate) const REDUCED: &[(ParamKind, &str)] = &[
    (ParamKind::Width, "width=%w"),
    (ParamKind::Height, "height=%h"),
    (ParamKind::Quality, "quality=%q"),
    (ParamKind::Format, "format=%f"),
];

/// Path and query conventions observed across image CDNs.
pub(crate) const EXTENDED: &[(ParamKind, &str)] = &[
    (ParamKind::Width, "width=%w"),
    (ParamKind::Width, "w=%w"),
    (ParamKind::Width, "w_%w"),
    (ParamKind::Width, "Cw=%w"),
    (ParamKind::Width, "_x%w"),
    (ParamKind::Width, "sWidth%w"),
    (ParamKind::Width, "sWidth=%w"),
    (ParamKind::Width, "im_w=%w"),
    (ParamKind::Width, "nuevoancho=%w"),
    (ParamKind::Width, "resize/%w/"),
    (ParamKind::Width, "downsize=%w"),
    (ParamKind::Width, "/scale_crop/%w/"),
    (ParamKind::Width, "SL%w"),
    (ParamKind::Width, "m=%w"),
    (ParamKind::Width, "s=%w"),
    (ParamKind::Width, "/%w/%h"),
    (ParamKind::Width, "%w,%h"),
    (ParamKind::Width, "resize/%wx%h/"),
    (ParamKind::Height, "height=%h"),
    (ParamKind::Height, "h=%h"),
    (ParamKind::Height, "h_%h"),
    (ParamKind::Height, "Ch=%h"),
    (ParamKind::Height, "sHeight%h"),
    (ParamKind::Height, "sHeight=%h"),
    (ParamKind::Height, "nuevoalto=%h"),
    (ParamKind::Quality, "q_%q"),
    (ParamKind::Quality, "quality=%q"),
    (ParamKind::Quality, "c%q"),
    (ParamKind::Format, "format=%f"),
    (ParamKind::Format, "auto=%f"),
    (ParamKind::Format, "f_%f"),
    (ParamKind::Format, "f=%f"),
    (ParamKind::Format, "fmt_%f"),
    (ParamKind::Format, "fmt=%f"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_escapes_literals() {
        assert_eq!(template_to_pattern("width=%w"), "(^|[^A-Za-z0-9_])width=[0-9]+");
        assert_eq!(template_to_pattern("format=%f"), "(^|[^A-Za-z0-9_])format=[a-z]+");
        assert_eq!(
            template_to_pattern("resize/%wx%h/"),
            "(^|[^A-Za-z0-9_])resize/[0-9]+x[0-9]+/"
        );
        assert_eq!(template_to_pattern("%w,%h"), "(^|[^A-Za-z0-9_])[0-9]+,[0-9]+");
        assert_eq!(template_to_pattern("/%w/%h"), "()/[0-9]+/[0-9]+");
        assert_eq!(template_to_pattern("_x%w"), "()_x[0-9]+");
    }

    #[test]
    fn lone_percent_stays_literal() {
        assert_eq!(template_to_pattern("a%zb"), "(^|[^A-Za-z0-9_])a%zb");
    }

    #[test]
    fn short_names_match_only_at_parameter_boundary() {
        let values = RewriteValues {
            width: 320,
            height: 240,
            quality: 70,
            format: "webp",
        };
        let rule = RewriteRule::compile(ParamKind::Height, "h=%h").unwrap();
        assert_eq!(rule.apply("a.jpg?width=1200", &values), "a.jpg?width=1200");
        assert_eq!(rule.apply("a.jpg?w=5&h=800", &values), "a.jpg?w=5&h=240");
        assert_eq!(rule.apply("h=800", &values), "h=240");

        let rule = RewriteRule::compile(ParamKind::Quality, "c%q").unwrap();
        assert_eq!(rule.apply("/pic80.jpg", &values), "/pic80.jpg");
        assert_eq!(rule.apply("/c80/pic.jpg", &values), "/c70/pic.jpg");
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let rule = RewriteRule::compile(ParamKind::Width, "resize/%wx%h/").unwrap();
        let values = RewriteValues {
            width: 320,
            height: 240,
            quality: 80,
            format: "webp",
        };
        assert_eq!(rule.render(&values), "resize/320x240/");
    }

    #[test]
    fn tables_are_grouped_by_kind() {
        for table in [REDUCED, EXTENDED] {
            let kinds: Vec<ParamKind> = table.iter().map(|(k, _)| *k).collect();
            let mut sorted = kinds.clone();
            sorted.sort();
            assert_eq!(kinds, sorted);
        }
    }

    #[test]
    fn every_template_compiles() {
        for (kind, template) in REDUCED.iter().chain(EXTENDED.iter()) {
            assert!(RewriteRule::compile(*kind, template).is_ok(), "{}", template);
        }
    }
}

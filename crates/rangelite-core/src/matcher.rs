//! DOM binding matcher.
//!
//! Scans every element of the live page once and binds those whose resolved
//! image source, or whose computed `background-image` URL, equals one of the
//! candidate URLs (the record's URL followed by its redirect hops). Elements
//! inserted after the scan are missed; that is not an error.

use crate::page::{DriverError, ElementId, PageDriver};
use once_cell::sync::Lazy;
use regex::Regex;

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(["']?([^"']*)["']?\)"#).expect("css url regex compiles"));

/// How the page shows the image through an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// `<img>` whose `src`/`srcset` carry the image.
    PlainImage,
    /// Any element whose CSS `background-image` references the image.
    BackgroundImage,
}

/// Back-reference from an image record to a live element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub element: ElementId,
    pub kind: BindingKind,
}

/// URL of the first `url(...)` in a computed `background-image` value.
/// Returns `None` for `none` and for values without a URL (e.g. gradients).
pub fn css_url(value: &str) -> Option<&str> {
    if value == "none" {
        return None;
    }
    CSS_URL
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

/// Every element currently showing one of `candidates`, in document order.
///
/// An element that disappears mid-scan is skipped. Failing to enumerate the
/// page at all is returned to the caller.
pub async fn find_bindings(
    driver: &dyn PageDriver,
    candidates: &[String],
) -> Result<Vec<Binding>, DriverError> {
    let is_candidate = |s: &str| candidates.iter().any(|c| c == s);
    let mut bindings = Vec::new();

    for element in driver.query_all_elements().await? {
        match driver.current_src(element).await {
            Ok(Some(src)) if is_candidate(src.as_str()) => bindings.push(Binding {
                element,
                kind: BindingKind::PlainImage,
            }),
            Ok(_) => {}
            Err(DriverError::UnknownElement(_)) => continue,
            Err(e) => return Err(e),
        }

        match driver.computed_background_image(element).await {
            Ok(value) => {
                if css_url(&value).is_some_and(is_candidate) {
                    bindings.push(Binding {
                        element,
                        kind: BindingKind::BackgroundImage,
                    });
                }
            }
            Err(DriverError::UnknownElement(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(bindings)
}

//! Rendering-engine capability interface.
//!
//! The live page is owned by the rendering engine; the core only holds
//! [`ElementId`] back-references into it and talks to it through
//! [`PageDriver`]. Decoding, rasterising and encoding images happen
//! in-process (see `compositor`), so the driver only needs element queries
//! and mutations.

mod static_page;

pub use static_page::{StaticElement, StaticPage};

use async_trait::async_trait;
use thiserror::Error;

/// Opaque reference to a live element. Valid only for the page that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Page-driver failure.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The element no longer exists (e.g. removed by page script).
    #[error("element {0:?} is not attached to the page")]
    UnknownElement(ElementId),
    /// The engine could not run the query or mutation.
    #[error("page driver: {0}")]
    Engine(String),
}

/// Element query and mutation surface of the live page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Every element currently in the document, in document order.
    async fn query_all_elements(&self) -> Result<Vec<ElementId>, DriverError>;

    /// The element's resolved image source (`currentSrc`), if it has one.
    async fn current_src(&self, element: ElementId) -> Result<Option<String>, DriverError>;

    /// Computed `background-image` value, e.g. `url("https://x.test/a.jpg")` or `none`.
    async fn computed_background_image(&self, element: ElementId) -> Result<String, DriverError>;

    async fn set_attribute(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), DriverError>;

    /// Sets an inline style property, e.g. `background-image`.
    async fn set_style(
        &self,
        element: ElementId,
        property: &str,
        value: &str,
    ) -> Result<(), DriverError>;
}

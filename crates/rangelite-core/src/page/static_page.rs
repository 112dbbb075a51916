//! In-memory page: a flat element set implementing [`PageDriver`].

use super::{DriverError, ElementId, PageDriver};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One element of a [`StaticPage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Inline style properties.
    pub style: BTreeMap<String, String>,
    /// `background-image` coming from stylesheets; inline style wins over it.
    pub sheet_background: Option<String>,
}

impl StaticElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_sheet_background(mut self, value: impl Into<String>) -> Self {
        self.sheet_background = Some(value.into());
        self
    }

    fn current_src(&self) -> Option<String> {
        if self.tag == "img" {
            self.attributes.get("src").cloned()
        } else {
            None
        }
    }

    fn computed_background(&self) -> String {
        self.style
            .get("background-image")
            .or(self.sheet_background.as_ref())
            .cloned()
            .unwrap_or_else(|| "none".to_string())
    }
}

#[derive(Debug, Default)]
struct PageState {
    elements: BTreeMap<ElementId, StaticElement>,
    next_id: u64,
    mutations: u64,
}

/// Thread-safe in-memory element set. Sources are stored already resolved.
#[derive(Debug, Default)]
pub struct StaticPage {
    state: Mutex<PageState>,
}

impl StaticPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, element: StaticElement) -> ElementId {
        let mut state = self.state.lock().unwrap();
        let id = ElementId(state.next_id);
        state.next_id += 1;
        state.elements.insert(id, element);
        id
    }

    /// Adds `<img src=src>`.
    pub fn insert_img(&self, src: &str) -> ElementId {
        self.insert(StaticElement::new("img").with_attribute("src", src))
    }

    /// Adds an element whose stylesheet gives it `background-image: url("url")`.
    pub fn insert_background(&self, tag: &str, url: &str) -> ElementId {
        self.insert(StaticElement::new(tag).with_sheet_background(format!("url(\"{}\")", url)))
    }

    pub fn remove(&self, id: ElementId) -> Option<StaticElement> {
        self.state.lock().unwrap().elements.remove(&id)
    }

    pub fn element(&self, id: ElementId) -> Option<StaticElement> {
        self.state.lock().unwrap().elements.get(&id).cloned()
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.element(id).and_then(|e| e.attributes.get(name).cloned())
    }

    pub fn style(&self, id: ElementId, property: &str) -> Option<String> {
        self.element(id).and_then(|e| e.style.get(property).cloned())
    }

    /// Number of successful attribute/style writes so far.
    pub fn mutation_count(&self) -> u64 {
        self.state.lock().unwrap().mutations
    }

    fn with_element<T>(
        &self,
        id: ElementId,
        f: impl FnOnce(&mut StaticElement) -> T,
    ) -> Result<T, DriverError> {
        let mut state = self.state.lock().unwrap();
        let element = state
            .elements
            .get_mut(&id)
            .ok_or(DriverError::UnknownElement(id))?;
        Ok(f(element))
    }
}

#[async_trait]
impl PageDriver for StaticPage {
    async fn query_all_elements(&self) -> Result<Vec<ElementId>, DriverError> {
        Ok(self.state.lock().unwrap().elements.keys().copied().collect())
    }

    async fn current_src(&self, element: ElementId) -> Result<Option<String>, DriverError> {
        self.with_element(element, |e| e.current_src())
    }

    async fn computed_background_image(&self, element: ElementId) -> Result<String, DriverError> {
        self.with_element(element, |e| e.computed_background())
    }

    async fn set_attribute(
        &self,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), DriverError> {
        self.with_element(element, |e| {
            e.attributes.insert(name.to_string(), value.to_string());
        })?;
        self.state.lock().unwrap().mutations += 1;
        Ok(())
    }

    async fn set_style(
        &self,
        element: ElementId,
        property: &str,
        value: &str,
    ) -> Result<(), DriverError> {
        self.with_element(element, |e| {
            e.style.insert(property.to_string(), value.to_string());
        })?;
        self.state.lock().unwrap().mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn img_exposes_current_src() {
        let page = StaticPage::new();
        let img = page.insert_img("https://x.test/a.jpg");
        let div = page.insert(StaticElement::new("DIV").with_attribute("src", "ignored"));
        assert_eq!(
            page.current_src(img).await.unwrap().as_deref(),
            Some("https://x.test/a.jpg")
        );
        assert_eq!(page.current_src(div).await.unwrap(), None);
        assert_eq!(page.query_all_elements().await.unwrap(), vec![img, div]);
    }

    #[tokio::test]
    async fn inline_background_overrides_sheet() {
        let page = StaticPage::new();
        let div = page.insert_background("div", "https://x.test/bg.png");
        assert_eq!(
            page.computed_background_image(div).await.unwrap(),
            "url(\"https://x.test/bg.png\")"
        );
        page.set_style(div, "background-image", "url(\"data:x\")")
            .await
            .unwrap();
        assert_eq!(
            page.computed_background_image(div).await.unwrap(),
            "url(\"data:x\")"
        );
        assert_eq!(page.mutation_count(), 1);
    }

    #[tokio::test]
    async fn plain_element_has_no_background() {
        let page = StaticPage::new();
        let p = page.insert(StaticElement::new("p"));
        assert_eq!(page.computed_background_image(p).await.unwrap(), "none");
    }

    #[tokio::test]
    async fn removed_element_is_unknown() {
        let page = StaticPage::new();
        let img = page.insert_img("https://x.test/a.jpg");
        page.remove(img);
        assert!(matches!(
            page.set_attribute(img, "src", "x").await,
            Err(DriverError::UnknownElement(id)) if id == img
        ));
        assert_eq!(page.mutation_count(), 0);
    }
}

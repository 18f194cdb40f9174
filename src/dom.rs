use crate::script::ScriptSpec;
use kuchiki::NodeRef;
use kuchiki::traits::*;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("script element construction failed: {0}")]
    BuildScript(String),
}

/// Opaque reference to a script element appended through a [`ScriptDom`].
/// Only the session that appended an element can remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptHandle(u64);

/// Seam between the mount controller and whatever document the host renders
/// into. Server-rendered hosts and tests use [`HtmlPage`]; browser-backed
/// hosts (webview bridges, wasm frontends) supply their own implementation.
pub trait ScriptDom {
    /// True when a script element with this resolved source URL, or one
    /// carrying the injection marker, is already in the document.
    fn find_widget_script(&self, src: &Url, marker: &str) -> bool;

    /// Appends the described script element to the document body.
    fn append_script(&self, spec: &ScriptSpec) -> Result<ScriptHandle, DomError>;

    /// Removes a previously appended element. Returns false when the handle
    /// is unknown, e.g. already removed.
    fn remove_script(&self, handle: &ScriptHandle) -> bool;

    /// Number of script elements currently in the document.
    fn script_count(&self) -> usize;
}

/// In-memory HTML document backing [`ScriptDom`].
///
/// Holds a parsed page, appends script elements to its `<body>`, and
/// serializes back to HTML for server-rendered hosts.
pub struct HtmlPage {
    document: NodeRef,
    injected: RefCell<HashMap<u64, NodeRef>>,
    next_handle: Cell<u64>,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
            injected: RefCell::new(HashMap::new()),
            next_handle: Cell::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::parse("<!DOCTYPE html><html><head></head><body></body></html>")
    }

    pub fn to_html(&self) -> String {
        self.document.to_string()
    }

    fn body(&self) -> NodeRef {
        self.document
            .select_first("body")
            .map(|body| body.as_node().clone())
            .unwrap_or_else(|_| self.document.clone())
    }
}

impl ScriptDom for HtmlPage {
    fn find_widget_script(&self, src: &Url, marker: &str) -> bool {
        let Ok(scripts) = self.document.select("script") else {
            return false;
        };
        for script in scripts {
            let attributes = script.attributes.borrow();
            if attributes.get(marker).is_some() {
                return true;
            }
            if attributes.get("src") == Some(src.as_str()) {
                return true;
            }
        }
        false
    }

    fn append_script(&self, spec: &ScriptSpec) -> Result<ScriptHandle, DomError> {
        let node = build_script_node(spec)?;
        node.detach();
        self.body().append(node.clone());

        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        self.injected.borrow_mut().insert(id, node);
        Ok(ScriptHandle(id))
    }

    fn remove_script(&self, handle: &ScriptHandle) -> bool {
        match self.injected.borrow_mut().remove(&handle.0) {
            Some(node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    fn script_count(&self) -> usize {
        self.document
            .select("script")
            .map(|scripts| scripts.count())
            .unwrap_or(0)
    }
}

/// Builds the element by formatting the tag and parsing it back out, so the
/// HTML parser owns attribute handling end to end.
fn build_script_node(spec: &ScriptSpec) -> Result<NodeRef, DomError> {
    let mut tag = format!("<script src=\"{}\" async defer", escape_attr(spec.src.as_str()));
    for (name, value) in &spec.attributes {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        tag.push_str(&escape_attr(value));
        tag.push('"');
    }
    tag.push_str("></script>");

    let parsed = kuchiki::parse_html().one(tag);
    let script = parsed
        .select_first("script")
        .map_err(|_| DomError::BuildScript("parsed tag lost its script element".to_string()))?;
    Ok(script.as_node().clone())
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetConfig;

    fn sample_spec() -> ScriptSpec {
        let mut config = WidgetConfig::new("abc123");
        config.greeting_message = Some("Hi & welcome".into());
        ScriptSpec::for_config(&config, None)
    }

    #[test]
    fn appends_into_the_body() {
        let page = HtmlPage::parse("<html><body><p>content</p></body></html>");
        let spec = sample_spec();
        page.append_script(&spec).unwrap();

        assert_eq!(page.script_count(), 1);
        let html = page.to_html();
        assert!(html.contains("data-site-id=\"abc123\""));
        assert!(html.contains("data-bubblav-widget=\"true\""));
        assert!(html.contains("src=\"https://www.bubblav.com/widget.js\""));
        assert!(html.contains("data-greeting-message=\"Hi &amp; welcome\""));
    }

    #[test]
    fn removal_only_works_once() {
        let page = HtmlPage::empty();
        let handle = page.append_script(&sample_spec()).unwrap();
        assert!(page.remove_script(&handle));
        assert_eq!(page.script_count(), 0);
        assert!(!page.remove_script(&handle));
    }

    #[test]
    fn duplicate_probe_matches_marker_and_src() {
        let page = HtmlPage::empty();
        let spec = sample_spec();
        assert!(!page.find_widget_script(&spec.src, crate::script::MARKER_ATTR));
        page.append_script(&spec).unwrap();
        assert!(page.find_widget_script(&spec.src, crate::script::MARKER_ATTR));

        // A tag some other integration wrote by hand still counts, via src.
        let plain = HtmlPage::parse(
            "<html><body><script src=\"https://www.bubblav.com/widget.js\"></script></body></html>",
        );
        assert!(plain.find_widget_script(&spec.src, crate::script::MARKER_ATTR));
    }

    #[test]
    fn foreign_scripts_are_ignored() {
        let page = HtmlPage::parse(
            "<html><body><script src=\"https://cdn.example/app.js\"></script></body></html>",
        );
        let spec = sample_spec();
        assert!(!page.find_widget_script(&spec.src, crate::script::MARKER_ATTR));
        assert_eq!(page.script_count(), 1);
    }
}

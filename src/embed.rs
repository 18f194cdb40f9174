use crate::config::WidgetConfig;
use crate::dom::HtmlPage;
use crate::mount::{ActivationOutcome, MountController};
use crate::sdk::SdkRegistry;
use anyhow::bail;
use std::rc::Rc;
use std::sync::Arc;

/// Embeds the widget script tag into a server-rendered page.
///
/// One-shot counterpart of driving a [`MountController`] by hand: parses
/// the page, injects the configured tag before `</body>`, and serializes
/// the result. A page that already carries the widget tag comes back
/// unchanged.
pub fn inject_into_html(html: &str, config: &WidgetConfig) -> anyhow::Result<String> {
    let page = Rc::new(HtmlPage::parse(html));
    let registry = Arc::new(SdkRegistry::new());
    let mut controller = MountController::new(page.clone(), registry);

    match controller.activate(config) {
        ActivationOutcome::Injected(_) | ActivationOutcome::AlreadyPresent => Ok(page.to_html()),
        outcome => bail!("widget injection failed: {outcome:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ScriptDom;

    #[test]
    fn injects_the_tag_into_a_rendered_page() {
        let html = "<html><head><title>Shop</title></head><body><main>hello</main></body></html>";
        let rendered = inject_into_html(html, &WidgetConfig::new("abc123")).unwrap();

        assert!(rendered.contains("<main>hello</main>"));
        assert!(rendered.contains("data-site-id=\"abc123\""));
    }

    #[test]
    fn re_injection_leaves_the_page_unchanged() {
        let html = "<html><body></body></html>";
        let once = inject_into_html(html, &WidgetConfig::new("abc123")).unwrap();
        let twice = inject_into_html(&once, &WidgetConfig::new("abc123")).unwrap();

        let page = HtmlPage::parse(&twice);
        assert_eq!(page.script_count(), 1);
    }
}

use crate::attrs;
use crate::config::WidgetConfig;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Production location of the vendor widget bundle.
pub const DEFAULT_WIDGET_URL: &str = "https://www.bubblav.com/widget.js";

/// Path of the widget bundle on whichever origin serves it.
pub const WIDGET_SCRIPT_PATH: &str = "/widget.js";

/// Attribute carrying the site identifier to the vendor script.
pub const SITE_ID_ATTR: &str = "data-site-id";

/// Marker attribute identifying script elements this crate injected, used
/// for duplicate detection across mount sessions.
pub const MARKER_ATTR: &str = "data-bubblav-widget";

/// Resolves the widget script URL.
///
/// With no override this is [`DEFAULT_WIDGET_URL`]. An override keeps only
/// its origin and gets [`WIDGET_SCRIPT_PATH`] appended; relative overrides
/// resolve against `page_origin` first. Anything that does not parse down
/// to a real origin falls back to the default URL.
pub fn widget_script_url(api_url: Option<&str>, page_origin: Option<&Url>) -> Url {
    let default_url = Url::parse(DEFAULT_WIDGET_URL).expect("default widget URL parses");
    let Some(api_url) = api_url else {
        return default_url;
    };

    let parsed = match Url::parse(api_url) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            page_origin.and_then(|base| base.join(api_url).ok())
        }
        Err(_) => None,
    };

    match parsed.as_ref().and_then(script_url_on_origin) {
        Some(url) => url,
        None => {
            debug!(api_url, "api url override is not usable; serving the default widget url");
            default_url
        }
    }
}

fn script_url_on_origin(url: &Url) -> Option<Url> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Url::parse(&origin.ascii_serialization())
        .ok()?
        .join(WIDGET_SCRIPT_PATH)
        .ok()
}

/// Fully resolved description of the element a mount will append: source
/// URL plus every attribute the vendor contract requires.
#[derive(Debug, Clone)]
pub struct ScriptSpec {
    pub src: Url,
    pub attributes: BTreeMap<String, String>,
}

impl ScriptSpec {
    pub fn for_config(config: &WidgetConfig, page_origin: Option<&Url>) -> Self {
        let src = widget_script_url(config.api_url.as_deref(), page_origin);
        let mut attributes = attrs::data_attributes(config);
        attributes.insert(SITE_ID_ATTR.to_string(), config.site_id.clone());
        attributes.insert(MARKER_ATTR.to_string(), "true".to_string());
        Self { src, attributes }
    }
}

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// Site identifiers longer than this are almost certainly copy-paste
/// accidents; the real format is owned by the BubblaV dashboard.
pub const MAX_SITE_ID_LEN: usize = 100;

/// Viewport corner the chat bubble anchors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    BottomLeft,
    BottomRight,
}

/// Configuration handed to the widget script through element attributes.
///
/// Only `site_id` is required. Field names serialize in camelCase, the
/// spelling the vendor script reads back out of its `data-*` attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Site identifier from the BubblaV dashboard.
    pub site_id: String,
    /// Custom API endpoint; the widget script URL is derived from its origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Bubble button color (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubble_color: Option<String>,
    /// Bubble icon color (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubble_icon_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_position: Option<WidgetPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_position: Option<WidgetPosition>,
    /// Show or hide the powered-by branding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powered_by_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    /// Greeting shown when the widget opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textbox_placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_action_buttons: Option<bool>,
}

impl WidgetConfig {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            ..Self::default()
        }
    }

    /// Reads the widget configuration from `BUBBLAV_*` environment
    /// variables. `BUBBLAV_SITE_ID` is required, everything else optional.
    pub fn from_env() -> anyhow::Result<Self> {
        let site_id = std::env::var("BUBBLAV_SITE_ID").context("BUBBLAV_SITE_ID is not set")?;

        let desktop_position = std::env::var("BUBBLAV_DESKTOP_POSITION")
            .ok()
            .map(|v| parse_position(&v))
            .transpose()
            .context("failed to parse BUBBLAV_DESKTOP_POSITION")?;
        let mobile_position = std::env::var("BUBBLAV_MOBILE_POSITION")
            .ok()
            .map(|v| parse_position(&v))
            .transpose()
            .context("failed to parse BUBBLAV_MOBILE_POSITION")?;

        Ok(Self {
            site_id,
            api_url: std::env::var("BUBBLAV_API_URL").ok(),
            bubble_color: std::env::var("BUBBLAV_BUBBLE_COLOR").ok(),
            bubble_icon_color: std::env::var("BUBBLAV_BUBBLE_ICON_COLOR").ok(),
            desktop_position,
            mobile_position,
            powered_by_visible: env_flag("BUBBLAV_POWERED_BY_VISIBLE"),
            bot_name: std::env::var("BUBBLAV_BOT_NAME").ok(),
            greeting_message: std::env::var("BUBBLAV_GREETING_MESSAGE").ok(),
            textbox_placeholder: std::env::var("BUBBLAV_TEXTBOX_PLACEHOLDER").ok(),
            show_action_buttons: env_flag("BUBBLAV_SHOW_ACTION_BUTTONS"),
        })
    }
}

/// Advisory check on the site identifier. The vendor defines the real
/// format, so callers only warn on failure and proceed anyway.
pub fn site_id_looks_valid(site_id: &str) -> bool {
    !site_id.is_empty() && site_id.len() < MAX_SITE_ID_LEN
}

fn parse_position(value: &str) -> anyhow::Result<WidgetPosition> {
    match value {
        "bottom-left" => Ok(WidgetPosition::BottomLeft),
        "bottom-right" => Ok(WidgetPosition::BottomRight),
        other => bail!("unknown widget position {other:?} (expected bottom-left or bottom-right)"),
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_and_skips_absent_fields() {
        let mut config = WidgetConfig::new("abc123");
        config.bubble_color = Some("#3b82f6".into());
        config.desktop_position = Some(WidgetPosition::BottomRight);

        let value = serde_json::to_value(&config).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields["siteId"], "abc123");
        assert_eq!(fields["bubbleColor"], "#3b82f6");
        assert_eq!(fields["desktopPosition"], "bottom-right");
        assert!(!fields.contains_key("botName"));
        assert!(!fields.contains_key("apiUrl"));
    }

    #[test]
    fn site_id_bounds() {
        assert!(site_id_looks_valid("abc123"));
        assert!(!site_id_looks_valid(""));
        assert!(!site_id_looks_valid(&"x".repeat(MAX_SITE_ID_LEN)));
        assert!(site_id_looks_valid(&"x".repeat(MAX_SITE_ID_LEN - 1)));
    }

    #[test]
    fn parses_positions() {
        assert_eq!(
            parse_position("bottom-left").unwrap(),
            WidgetPosition::BottomLeft
        );
        assert!(parse_position("top-left").is_err());
    }
}

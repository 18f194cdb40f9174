use crate::config::WidgetConfig;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Namespace prefix shared with the vendor script.
const DATA_PREFIX: &str = "data-";

/// Serialized spelling of the site id field, carried separately as
/// `data-site-id` rather than through the generic mapping.
const SITE_ID_FIELD: &str = "siteId";

/// Maps the configuration record to the `data-*` attribute pairs the vendor
/// script reads. Absent fields emit nothing; present fields map to exactly
/// one attribute each. Output order is deterministic.
pub fn data_attributes(config: &WidgetConfig) -> BTreeMap<String, String> {
    let Ok(Value::Object(fields)) = serde_json::to_value(config) else {
        return BTreeMap::new();
    };
    fields
        .into_iter()
        .filter(|(key, _)| key != SITE_ID_FIELD)
        .filter_map(|(key, value)| {
            attribute_value(&value).map(|value| (data_attribute_name(&key), value))
        })
        .collect()
}

/// Converts a camelCase field identifier to its namespaced attribute name:
/// `bubbleColor` becomes `data-bubble-color`. Hyphen-separated lowercase
/// input is a fixed point of the conversion itself.
pub fn data_attribute_name(field: &str) -> String {
    let uppercase = Regex::new(r"([A-Z])").unwrap();
    let kebab = uppercase.replace_all(field, "-$1").to_lowercase();
    format!("{DATA_PREFIX}{kebab}")
}

fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetPosition;

    #[test]
    fn maps_present_fields_only() {
        let mut config = WidgetConfig::new("abc123");
        config.bubble_color = Some("#3b82f6".into());
        config.powered_by_visible = Some(false);
        config.mobile_position = Some(WidgetPosition::BottomLeft);

        let attrs = data_attributes(&config);
        assert_eq!(attrs["data-bubble-color"], "#3b82f6");
        assert_eq!(attrs["data-powered-by-visible"], "false");
        assert_eq!(attrs["data-mobile-position"], "bottom-left");
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn site_id_is_not_part_of_the_generic_mapping() {
        let config = WidgetConfig::new("abc123");
        assert!(data_attributes(&config).is_empty());
    }

    #[test]
    fn api_url_rides_along_as_an_attribute() {
        let mut config = WidgetConfig::new("abc123");
        config.api_url = Some("https://custom.example/api/chat".into());
        let attrs = data_attributes(&config);
        assert_eq!(attrs["data-api-url"], "https://custom.example/api/chat");
    }

    #[test]
    fn attribute_names_are_kebab_case_fixed_points() {
        assert_eq!(data_attribute_name("bubbleColor"), "data-bubble-color");
        assert_eq!(data_attribute_name("showActionButtons"), "data-show-action-buttons");
        // Re-kebabing an already converted name (sans prefix) changes nothing.
        assert_eq!(data_attribute_name("bubble-color"), "data-bubble-color");
    }

    #[test]
    fn formatter_is_stable_under_reapplication() {
        let mut config = WidgetConfig::new("abc123");
        config.greeting_message = Some("Hi there".into());
        assert_eq!(data_attributes(&config), data_attributes(&config));
    }
}

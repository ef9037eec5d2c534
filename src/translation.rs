//! Localized names for the CCU's built-in rooms and functions
//!
//! The CCU names its factory rooms and functions with keys such as
//! `roomKitchen` or `funcHeating`; the web UI shows them translated. Unknown
//! keys and strings pass through unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en", alias = "english")]
    English,
    #[serde(rename = "de", alias = "german")]
    German,
}

const ENGLISH: &[(&str, &str)] = &[
    ("roombathroom", "Bathroom"),
    ("roombedroom", "Bedroom"),
    ("roomkitchen", "Kitchen"),
    ("roomlivingroom", "Living room"),
    ("funcbutton", "Button"),
    ("funccentral", "Central"),
    ("funcclimatecontrol", "Climate control"),
    ("funcenergy", "Energy"),
    ("funcheating", "Heating"),
    ("funclock", "Lock"),
    ("funcsecurity", "Security"),
    ("funcweather", "Weather"),
];

const GERMAN: &[(&str, &str)] = &[
    ("roombathroom", "Badezimmer"),
    ("roombedroom", "Schlafzimmer"),
    ("roomkitchen", "Küche"),
    ("roomlivingroom", "Wohnzimmer"),
    ("funcbutton", "Taster"),
    ("funccentral", "Zentrale"),
    ("funcclimatecontrol", "Klima"),
    ("funcenergy", "Energiemanagement"),
    ("funcheating", "Heizung"),
    ("funclock", "Verschluss"),
    ("funcsecurity", "Sicherheit"),
    ("funcweather", "Wetter"),
];

/// Key/display-string table with identity fallback in both directions.
#[derive(Debug, Clone)]
pub struct Translator {
    table: Vec<(String, String)>,
}

impl Translator {
    pub fn new(language: Language) -> Self {
        let table = match language {
            Language::English => ENGLISH,
            Language::German => GERMAN,
        };
        Self::from_table(table.iter().copied())
    }

    /// Build a translator from custom `(key, display)` pairs. Keys are
    /// matched case-insensitively.
    pub fn from_table<K, V>(table: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let table = table
            .into_iter()
            .map(|(key, value)| (key.into().to_lowercase(), value.into()))
            .collect();
        Self { table }
    }

    /// Map a key to its display string, or return the key unchanged.
    pub fn translate(&self, key: &str) -> String {
        let lookup = key.to_lowercase();
        self.table
            .iter()
            .find(|(k, _)| *k == lookup)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Map a display string back to its key, or return it unchanged.
    ///
    /// Display strings are compared case-insensitively, since callers look
    /// names up in normalized (lowercase) form.
    pub fn inverse_translate(&self, value: &str) -> String {
        let lookup = value.to_lowercase();
        self.table
            .iter()
            .find(|(_, v)| v.to_lowercase() == lookup)
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| value.to_string())
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_known_key() {
        let en = Translator::new(Language::English);
        assert_eq!(en.translate("roomKitchen"), "Kitchen");
        assert_eq!(en.translate("funcheating"), "Heating");

        let de = Translator::new(Language::German);
        assert_eq!(de.translate("roomKitchen"), "Küche");
    }

    #[test]
    fn test_translate_identity_fallback() {
        let en = Translator::default();
        assert_eq!(en.translate("Garage"), "Garage");
        assert_eq!(en.inverse_translate("garage"), "garage");
    }

    #[test]
    fn test_inverse_translate() {
        let en = Translator::new(Language::English);
        assert_eq!(en.inverse_translate("Living room"), "roomlivingroom");
        assert_eq!(en.inverse_translate("living room"), "roomlivingroom");

        let de = Translator::new(Language::German);
        assert_eq!(de.inverse_translate("küche"), "roomkitchen");
    }

    #[test]
    fn test_custom_table() {
        let t = Translator::from_table([("roomGarage", "Garage")]);
        assert_eq!(t.translate("ROOMGARAGE"), "Garage");
        assert_eq!(t.inverse_translate("garage"), "roomgarage");
    }

    #[test]
    fn test_language_serde() {
        let lang: Language = serde_json::from_str("\"de\"").unwrap();
        assert_eq!(lang, Language::German);
        assert_eq!(serde_json::to_string(&Language::English).unwrap(), "\"en\"");
    }
}

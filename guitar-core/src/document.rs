//! Persistent JSON documents: device configuration and user presets.
//!
//! Both documents are JSON objects whose layout is owned by the
//! configuration tool. The firmware only interprets the few keys it needs
//! and otherwise preserves the documents as opaque maps.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::resources::{FileStore, HardwareError, StorageError};
use crate::types::{GuitarButtons, LedRole, Rgb, CONFIG_PATH, USER_PRESETS_PATH};

/// Preset whose colours drive the button LEDs.
pub const ACTIVE_PRESET_KEY: &str = "NewUserPreset1";

/// Config flag enabling the tilt wave effect.
pub const TILT_WAVE_ENABLED_KEY: &str = "tilt_wave_enabled";

/// A JSON object document.
pub type Document = Map<String, Value>;

/// Parse `text` as a JSON object.
pub fn parse_document(text: &str) -> Result<Document, serde_json::Error> {
    serde_json::from_str(text)
}

/// Read and parse the document at `path`; any failure yields an empty object.
pub fn read_document_or_empty(files: &mut dyn FileStore, path: &str) -> Document {
    match files.read_to_string(path) {
        Ok(text) => parse_document(&text).unwrap_or_else(|_| {
            warn!("Document {} is not a JSON object, starting empty", path);
            Document::new()
        }),
        Err(e) => {
            debug!("Document {} unreadable ({}), starting empty", path, e);
            Document::new()
        }
    }
}

/// Serialize `doc` and store it at `path` with a trailing newline.
pub fn write_document(
    files: &mut dyn FileStore,
    path: &str,
    doc: &Document,
) -> Result<(), EngineError> {
    let mut text = serde_json::to_string(doc)?;
    text.push('\n');
    files.write(path, &text)?;
    Ok(())
}

/// Merge `incoming` into `existing`; keys in `incoming` win.
pub fn merge(existing: &mut Document, incoming: Document) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

/// In-memory view of `/config.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceConfig {
    doc: Document,
}

impl DeviceConfig {
    #[must_use]
    pub fn new(doc: Document) -> Self {
        Self { doc }
    }

    /// Load the config from storage, falling back to an empty config.
    pub fn load(files: &mut dyn FileStore) -> Self {
        Self::new(read_document_or_empty(files, CONFIG_PATH))
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Strip index configured for `role`'s LED.
    #[must_use]
    pub fn led_index(&self, role: LedRole) -> Option<usize> {
        self.doc
            .get(role.led_key())
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
    }

    /// Pin name assigned to a button key.
    #[must_use]
    pub fn pin_for(&self, key: &str) -> Option<&str> {
        self.doc.get(key).and_then(Value::as_str)
    }

    pub fn set_pin(&mut self, key: &str, pin: &str) {
        self.doc
            .insert(key.to_string(), Value::String(pin.to_string()));
    }

    /// Known button keys with a pin assignment, paired with the assigned pin.
    pub fn button_pins(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        GuitarButtons::KEYS
            .into_iter()
            .filter_map(|(key, _)| self.pin_for(key).map(|pin| (key, pin)))
    }

    /// Resolve every button pin to a GPIO number with `resolve`.
    ///
    /// Buttons with an unusable or already taken pin are skipped; the rest
    /// are still assigned. The first skipped button's error is returned too.
    pub fn assign_buttons(
        &self,
        mut resolve: impl FnMut(&str) -> Option<usize>,
    ) -> (Vec<(&'static str, usize)>, Result<(), HardwareError>) {
        let mut assigned: Vec<(&'static str, usize)> = Vec::new();
        let mut outcome = Ok(());
        for (key, pin) in self.button_pins() {
            let error = match resolve(pin) {
                None => HardwareError::UnknownPin,
                Some(number) if assigned.iter().any(|&(_, taken)| taken == number) => {
                    HardwareError::PinInUse
                }
                Some(number) => {
                    assigned.push((key, number));
                    continue;
                }
            };
            warn!("Button {} skipped, pin {}: {}", key, pin, error);
            if outcome.is_ok() {
                outcome = Err(error);
            }
        }
        (assigned, outcome)
    }

    pub fn button_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.button_pins().map(|(key, _)| key)
    }

    /// Tilt wave is enabled unless the config turns it off.
    #[must_use]
    pub fn tilt_wave_enabled(&self) -> bool {
        self.doc
            .get(TILT_WAVE_ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn set_tilt_wave_enabled(&mut self, enabled: bool) {
        self.doc
            .insert(TILT_WAVE_ENABLED_KEY.to_string(), Value::Bool(enabled));
    }
}

/// Persist a detected pin assignment into the config document at `path`.
///
/// A missing document is created; a document that exists but does not
/// parse is left untouched and reported.
pub fn save_pin(
    files: &mut dyn FileStore,
    path: &str,
    button: &str,
    pin: &str,
) -> Result<(), EngineError> {
    let mut doc = match files.read_to_string(path) {
        Ok(text) => parse_document(&text)?,
        Err(StorageError::NotFound) => Document::new(),
        Err(e) => return Err(e.into()),
    };
    doc.insert(button.to_string(), Value::String(pin.to_string()));
    write_document(files, path, &doc)
}

/// Cache of `/user_presets.json` and the active preset's colours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPresets {
    document: Document,
    active: Document,
}

impl UserPresets {
    #[must_use]
    pub fn new(document: Document) -> Self {
        let mut presets = Self::default();
        presets.replace(document);
        presets
    }

    pub fn load(files: &mut dyn FileStore) -> Self {
        Self::new(read_document_or_empty(files, USER_PRESETS_PATH))
    }

    /// Replace the cached document and refresh the active preset view.
    pub fn replace(&mut self, document: Document) {
        self.active = document
            .get(ACTIVE_PRESET_KEY)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        self.document = document;
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn active(&self) -> &Document {
        &self.active
    }

    /// Colour stored under `key` in the active preset.
    #[must_use]
    pub fn active_color(&self, key: &str) -> Option<Rgb> {
        self.active
            .get(key)
            .and_then(Value::as_str)
            .and_then(Rgb::from_hex)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapStore(BTreeMap<String, String>);

    impl FileStore for MapStore {
        fn read_to_string(&mut self, path: &str) -> Result<String, StorageError> {
            self.0.get(path).cloned().ok_or(StorageError::NotFound)
        }

        fn write(&mut self, path: &str, contents: &str) -> Result<(), StorageError> {
            self.0.insert(path.to_string(), contents.to_string());
            Ok(())
        }
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_led_index_lookup() {
        let config = DeviceConfig::new(doc(json!({
            "GREEN_FRET_led": 3,
            "RED_FRET_led": "x",
        })));
        assert_eq!(config.led_index(LedRole::GreenFret), Some(3));
        assert_eq!(config.led_index(LedRole::RedFret), None);
        assert_eq!(config.led_index(LedRole::StrumUp), None);
    }

    #[test]
    fn test_button_pins_only_known_keys() {
        let config = DeviceConfig::new(doc(json!({
            "GREEN_FRET": "GP10",
            "START": "GP2",
            "WHAMMY": "GP27",
        })));
        let pins: std::vec::Vec<_> = config.button_pins().collect();
        assert_eq!(pins, [("GREEN_FRET", "GP10"), ("START", "GP2")]);
    }

    fn gpio(name: &str) -> Option<usize> {
        name.strip_prefix("GP")
            .and_then(|n| n.parse().ok())
            .filter(|&n| n < 22)
    }

    #[test]
    fn test_assign_buttons_skips_bad_pins_only() {
        let config = DeviceConfig::new(doc(json!({
            "GREEN_FRET": "GP26",
            "RED_FRET": "GP11",
            "YELLOW_FRET": "GP11",
            "START": "GP2",
            "STRUM_UP": "pin7",
        })));
        let (assigned, outcome) = config.assign_buttons(gpio);
        assert_eq!(assigned, [("RED_FRET", 11), ("START", 2)]);
        assert_eq!(outcome, Err(HardwareError::UnknownPin));

        let config = DeviceConfig::new(doc(json!({"GREEN_FRET": "GP1", "RED_FRET": "GP1"})));
        let (assigned, outcome) = config.assign_buttons(gpio);
        assert_eq!(assigned, [("GREEN_FRET", 1)]);
        assert_eq!(outcome, Err(HardwareError::PinInUse));

        let (assigned, outcome) = DeviceConfig::default().assign_buttons(gpio);
        assert!(assigned.is_empty());
        assert_eq!(outcome, Ok(()));
    }

    #[test]
    fn test_rewritten_documents_have_sorted_keys() {
        let mut files = MapStore::default();
        files
            .0
            .insert("/config.json".to_string(), "{\"b\": 1, \"a\": 2}\n".to_string());
        save_pin(&mut files, "/config.json", "GREEN_FRET", "GP3").unwrap();
        assert_eq!(
            files.0.get("/config.json").map(String::as_str),
            Some("{\"GREEN_FRET\":\"GP3\",\"a\":2,\"b\":1}\n")
        );
    }

    #[test]
    fn test_tilt_wave_flag_defaults_on() {
        let mut config = DeviceConfig::default();
        assert!(config.tilt_wave_enabled());
        config.set_tilt_wave_enabled(false);
        assert!(!config.tilt_wave_enabled());
    }

    #[test]
    fn test_merge_new_values_win() {
        let mut existing = doc(json!({"a": 1, "b": 2}));
        merge(&mut existing, doc(json!({"b": 3, "c": 4})));
        assert_eq!(Value::Object(existing), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let incoming = doc(json!({"NewUserPreset1": {"green-fret-pressed": "#00FF00"}}));
        let mut once = doc(json!({"Other": {}}));
        merge(&mut once, incoming.clone());
        let mut twice = once.clone();
        merge(&mut twice, incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_user_presets_active_view() {
        let presets = UserPresets::new(doc(json!({
            "NewUserPreset1": {"red-fret-pressed": "#FF0000", "red-fret-released": "bad"},
        })));
        assert_eq!(
            presets.active_color("red-fret-pressed"),
            Some(Rgb::new(255, 0, 0))
        );
        assert_eq!(presets.active_color("red-fret-released"), None);

        let empty = UserPresets::new(doc(json!({"NewUserPreset1": 5})));
        assert!(empty.active().is_empty());
    }

    #[test]
    fn test_save_pin_creates_and_updates() {
        let mut store = MapStore::default();
        save_pin(&mut store, CONFIG_PATH, "GREEN_FRET", "GP10").unwrap();
        save_pin(&mut store, CONFIG_PATH, "RED_FRET", "GP11").unwrap();

        let saved = parse_document(&store.0[CONFIG_PATH]).unwrap();
        assert_eq!(
            Value::Object(saved),
            json!({"GREEN_FRET": "GP10", "RED_FRET": "GP11"})
        );
    }

    #[test]
    fn test_save_pin_rejects_corrupt_config() {
        let mut store = MapStore::default();
        store.0.insert(CONFIG_PATH.to_string(), "{oops".to_string());
        assert!(matches!(
            save_pin(&mut store, CONFIG_PATH, "GREEN_FRET", "GP10"),
            Err(EngineError::Json(_))
        ));
        assert_eq!(store.0[CONFIG_PATH], "{oops");
    }

    #[test]
    fn test_read_document_or_empty() {
        let mut store = MapStore::default();
        assert!(read_document_or_empty(&mut store, "/missing.json").is_empty());
        store.0.insert("/list.json".to_string(), "[1,2]".to_string());
        assert!(read_document_or_empty(&mut store, "/list.json").is_empty());
    }
}

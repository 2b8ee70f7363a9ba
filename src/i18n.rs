// i18n.rs
//
// Runtime UI strings:
// - built-in English table, always available
// - optional overrides from assets/i18n/<lang>.json ({ "key": "value" })
// - lookup: tr("key") / tr_with("key", &[("name", ...)]) with {name} placeholders

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_LANG: &str = "en";

/// Languages offered in the UI: (code, native name).
pub const LANGUAGES: [(&str, &str); 5] = [
    ("en", "English"),
    ("zh-Hans", "简体中文"),
    ("ja", "日本語"),
    ("fr", "Français"),
    ("ru", "Русский"),
];

const BUILTIN_EN: &[(&str, &str)] = &[
    ("app.title", "Panorama Sphere"),
    ("menu.file", "File"),
    ("menu.open_image", "Open panorama…"),
    ("menu.exit", "Exit"),
    ("menu.view", "View"),
    ("menu.language", "Language"),
    ("view.reset", "Reset view"),
    ("view.show_status", "Show status bar"),
    ("file.filter.images", "Images"),
    ("navbar.autorotate", "Automatic rotation"),
    ("navbar.zoom_in", "Zoom in"),
    ("navbar.zoom_out", "Zoom out"),
    ("navbar.fullscreen", "Fullscreen"),
    ("status.loading", "Loading…"),
    ("status.longitude", "Longitude"),
    ("status.latitude", "Latitude"),
    ("error.load_failed", "Could not load panorama: {err}"),
    ("error.unsupported", "This system cannot display panoramas: {err}"),
    ("font.not_found", "no UI font with wide glyph coverage found, using egui defaults"),
    ("font.using", "UI font: {path}"),
];

#[derive(Debug, Clone)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn builtin() -> HashMap<String, String> {
    BUILTIN_EN
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring malformed translation file {:?}: {}", path, e);
            None
        }
    }
}

/// assets/i18n/<lang>.json next to the executable, then in the working dir.
fn find_lang_file(lang: &str) -> Option<PathBuf> {
    let file = format!("{}.json", lang);
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|e| e.parent().map(Path::to_path_buf));
    exe_dir
        .into_iter()
        .chain(std::iter::once(PathBuf::new()))
        .map(|d| d.join("assets").join("i18n").join(&file))
        .find(|p| p.exists())
}

/// Builds the table for `lang`: English defaults overlaid with the file.
pub fn table_for(lang: &str) -> HashMap<String, String> {
    let mut map = builtin();
    if let Some(overrides) = find_lang_file(lang).and_then(|p| load_json_map(&p)) {
        map.extend(overrides);
    }
    map
}

/// Initialize global i18n. Later calls switch the language.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let i = I18n {
        map: table_for(&lang),
        lang,
    };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

/// Localized text for `key`; before `init` only the built-in table is used.
/// Unknown keys come back unchanged.
pub fn tr(key: &str) -> String {
    if let Some(v) = I18N.get().and_then(|l| l.read().ok()).and_then(|i| i.map.get(key).cloned()) {
        return v;
    }
    BUILTIN_EN
        .iter()
        .find(|(k, _)| *k == key)
        .map_or_else(|| key.to_string(), |(_, v)| v.to_string())
}

/// Localized text with `{name}` placeholders substituted.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{}}}", k), v);
    }
    s
}

/// `--lang` wins over the `PANORAMA_LANG` environment variable.
pub fn resolve_lang(cli_lang: Option<&str>) -> String {
    if let Some(l) = cli_lang {
        return l.to_string();
    }
    match std::env::var("PANORAMA_LANG") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => DEFAULT_LANG.to_string(),
    }
}

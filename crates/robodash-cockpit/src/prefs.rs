//! Persistence of [`ThemePrefs`] and the [`ThemeController`] shared by all
//! browser connections.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use robodash_types::DashError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::theme::{Theme, ThemePrefs, normalize_hex};

/// Key/value persistence of the theme preferences.
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences; defaults when nothing was saved yet.
    fn load(&self) -> Result<ThemePrefs, DashError>;
    fn save(&self, prefs: &ThemePrefs) -> Result<(), DashError>;
}

/// JSON file on disk.
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self) -> Result<ThemePrefs, DashError> {
        if !self.path.exists() {
            return Ok(ThemePrefs::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| DashError::Config(format!("cannot read {}: {e}", self.path.display())))?;
        serde_json::from_str(&raw).map_err(|e| {
            DashError::Parsing(format!("invalid preferences in {}: {e}", self.path.display()))
        })
    }

    fn save(&self, prefs: &ThemePrefs) -> Result<(), DashError> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .map_err(|e| DashError::Config(format!("cannot create {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, json)
            .map_err(|e| DashError::Config(format!("cannot write {}: {e}", self.path.display())))
    }
}

/// Process-local preferences, lost on exit.
#[derive(Default)]
pub struct MemoryPreferences {
    saved: Mutex<Option<ThemePrefs>>,
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<ThemePrefs, DashError> {
        let saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        Ok(saved.clone().unwrap_or_default())
    }

    fn save(&self, prefs: &ThemePrefs) -> Result<(), DashError> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(prefs.clone());
        Ok(())
    }
}

/// Current theme, persisted on every change and broadcast to every
/// connected browser.
pub struct ThemeController {
    store: Box<dyn PreferenceStore>,
    current: watch::Sender<ThemePrefs>,
}

impl ThemeController {
    /// Load stored preferences, falling back to defaults on error.
    pub fn load(store: Box<dyn PreferenceStore>) -> Self {
        let mut prefs = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "using default theme preferences");
            ThemePrefs::default()
        });
        if normalize_hex(&prefs.accent_color).is_none() {
            prefs.accent_color = ThemePrefs::default().accent_color;
        }
        let (current, _) = watch::channel(prefs);
        Self { store, current }
    }

    pub fn current(&self) -> ThemePrefs {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThemePrefs> {
        self.current.subscribe()
    }

    /// Switch theme and, when given, the accent colour (e.g. a swatch).
    pub fn set_theme(&self, theme: Theme, accent: Option<&str>) -> Result<ThemePrefs, DashError> {
        let accent = match accent {
            Some(hex) => Some(
                normalize_hex(hex)
                    .ok_or_else(|| DashError::Parsing(format!("invalid colour '{hex}'")))?,
            ),
            None => None,
        };
        self.update(|prefs| {
            prefs.theme = theme;
            if let Some(accent) = accent {
                prefs.accent_color = accent;
            }
        })
    }

    /// Apply a colour from the picker and remember it.
    pub fn apply_custom_color(&self, hex: &str) -> Result<ThemePrefs, DashError> {
        let hex = normalize_hex(hex)
            .ok_or_else(|| DashError::Parsing(format!("invalid colour '{hex}'")))?;
        info!(accent = %hex, "custom color applied");
        self.update(|prefs| {
            prefs.accent_color = hex.clone();
            prefs.remember_color(&hex);
        })
    }

    fn update(&self, change: impl FnOnce(&mut ThemePrefs)) -> Result<ThemePrefs, DashError> {
        let mut prefs = self.current();
        change(&mut prefs);
        self.store.save(&prefs)?;
        debug!(theme = ?prefs.theme, accent = %prefs.accent_color, "theme saved");
        self.current.send_replace(prefs.clone());
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::DEFAULT_ACCENT;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_and_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let store = FilePreferences::new(dir.path().join("nested").join("prefs.json"));
        assert_eq!(store.load()?, ThemePrefs::default());

        let mut prefs = ThemePrefs::default();
        prefs.theme = Theme::Light;
        prefs.remember_color("#ff0000");
        store.save(&prefs)?;
        assert_eq!(store.load()?, prefs);

        let raw = std::fs::read_to_string(store.path())?;
        assert!(raw.contains("\"accentColor\""));
        assert!(raw.contains("\"recentColors\""));
        Ok(())
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ nope")?;
        assert!(FilePreferences::new(&path).load().is_err());
        let controller = ThemeController::load(Box::new(FilePreferences::new(&path)));
        assert_eq!(controller.current(), ThemePrefs::default());
        Ok(())
    }

    #[test]
    fn custom_colors_are_normalised_and_remembered() {
        let controller = ThemeController::load(Box::new(MemoryPreferences::default()));
        let mut rx = controller.subscribe();
        let prefs = controller.apply_custom_color("#ABC").unwrap();
        assert_eq!(prefs.accent_color, "#aabbcc");
        assert_eq!(prefs.recent_colors, vec!["#aabbcc".to_string()]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().accent_color, "#aabbcc");
        assert!(controller.apply_custom_color("zzz").is_err());
    }

    #[test]
    fn theme_switch_keeps_accent_unless_given() {
        let controller = ThemeController::load(Box::new(MemoryPreferences::default()));
        let prefs = controller.set_theme(Theme::Light, None).unwrap();
        assert_eq!(prefs.accent_color, DEFAULT_ACCENT);
        let prefs = controller.set_theme(Theme::Dark, Some("#10b981")).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.accent_color, "#10b981");
        assert!(prefs.recent_colors.is_empty());
    }
}

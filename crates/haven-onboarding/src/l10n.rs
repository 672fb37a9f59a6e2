//! Message catalogs for onboarding content.
//!
//! A catalog maps an untranslated template (the msgid) to its translation,
//! per language. Templates keep `{name}` placeholders; callers translate
//! first and fill placeholders afterwards, so translators can reorder them.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::settings::SettingsError;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    languages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    /// A catalog with no translations: every lookup returns the msgid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads every `<lang>.json` file in `dir`. Each file is a flat JSON
    /// object of msgid -> translation.
    pub fn load_dir(dir: &Path) -> Result<Self, SettingsError> {
        let mut catalog = Self::default();

        let entries = std::fs::read_dir(dir).map_err(|source| SettingsError::CatalogIo {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| SettingsError::CatalogIo {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(|source| SettingsError::CatalogIo {
                path: path.clone(),
                source,
            })?;
            let messages: HashMap<String, String> =
                serde_json::from_str(&raw).map_err(|source| SettingsError::CatalogParse {
                    path: path.clone(),
                    source,
                })?;

            debug!("Loaded {} translations for '{}'", messages.len(), language);
            catalog.insert(&language, messages);
        }

        info!("Translation catalogs loaded: {} languages", catalog.languages.len());
        Ok(catalog)
    }

    pub fn insert(&mut self, language: &str, messages: HashMap<String, String>) {
        self.languages
            .entry(language.to_string())
            .or_default()
            .extend(messages);
    }

    /// Translations in effect for `language` until the returned value is
    /// dropped. Onboarding content is produced outside any user request, so
    /// callers pick the language explicitly (the recipient's or the realm's).
    pub fn override_language<'a>(&'a self, language: &'a str) -> Localizer<'a> {
        Localizer {
            catalog: self,
            language,
        }
    }

    fn lookup(&self, language: &str, msgid: &str) -> Option<&str> {
        let exact = self.languages.get(language).and_then(|m| m.get(msgid));
        // "pt-BR" falls back to "pt"
        let base = || {
            let (base, _) = language.split_once(['-', '_'])?;
            self.languages.get(base)?.get(msgid)
        };
        exact.or_else(base).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Localizer<'a> {
    catalog: &'a Catalog,
    language: &'a str,
}

impl<'a> Localizer<'a> {
    pub fn language(&self) -> &str {
        self.language
    }

    /// Translate `msgid`, or return it unchanged if no translation exists.
    pub fn gettext(&self, msgid: &str) -> String {
        self.catalog
            .lookup(self.language, msgid)
            .unwrap_or(msgid)
            .to_string()
    }
}

/// Replace `{name}` placeholders in one pass. Unknown placeholders and
/// unmatched braces are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

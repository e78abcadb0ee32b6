use std::collections::HashMap;

use fluent_templates::{
    fluent_bundle::{FluentArgs, FluentValue},
    static_loader, Loader,
};
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

use crate::storage::db::{self, DbConnection};

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
        // Telegram renders the bidi isolation marks literally
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Supported languages (code, human-readable name).
pub static SUPPORTED_LANGS: &[(&str, &str)] = &[("en", "English 🇬🇧"), ("ru", "Русский 🇷🇺")];

/// Language code stored for new users and used when a code is unknown.
pub const DEFAULT_LANG_CODE: &str = "ru";

static DEFAULT_LANG: Lazy<LanguageIdentifier> = Lazy::new(|| DEFAULT_LANG_CODE.parse().unwrap_or_default());

/// Normalizes a language code into a LanguageIdentifier (falls back to default).
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    match is_language_supported(code) {
        Some(supported) => supported.parse().unwrap_or_else(|_| DEFAULT_LANG.clone()),
        None => DEFAULT_LANG.clone(),
    }
}

/// Resolves the language stored for a user, defaulting when the user is unknown.
pub fn user_lang(conn: &DbConnection, user_id: i64) -> LanguageIdentifier {
    match db::get_user_language(conn, user_id) {
        Ok(Some(code)) => lang_from_code(&code),
        Ok(None) => DEFAULT_LANG.clone(),
        Err(e) => {
            log::warn!("Failed to read language for user {}: {}", user_id, e);
            DEFAULT_LANG.clone()
        }
    }
}

/// Resolves the language for a user using a connection pool.
pub fn user_lang_from_pool(db_pool: &db::DbPool, user_id: i64) -> LanguageIdentifier {
    match db::get_connection(db_pool) {
        Ok(conn) => user_lang(&conn, user_id),
        Err(e) => {
            log::warn!("No DB connection to resolve language for {}: {}", user_id, e);
            DEFAULT_LANG.clone()
        }
    }
}

fn missing(lang: &LanguageIdentifier, key: &str) -> String {
    format!("Missing translation: {}.{}", lang.language, key)
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .lookup(lang, key)
        .or_else(|| LOCALES.lookup(&DEFAULT_LANG, key))
        .unwrap_or_else(|| missing(lang, key));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &FluentArgs) -> String {
    let args_map: HashMap<String, FluentValue> = args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

    let text = LOCALES
        .lookup_with_args(lang, key, &args_map)
        .or_else(|| LOCALES.lookup_with_args(&DEFAULT_LANG, key, &args_map))
        .unwrap_or_else(|| missing(lang, key));
    text.replace("\\n", "\n")
}

/// Checks if a language code is supported by the bot.
/// Returns the normalized language code if supported, None otherwise.
pub fn is_language_supported(code: &str) -> Option<&'static str> {
    // "en-US" -> "en"
    let normalized = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();

    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(&normalized))
        .map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_known_translation() {
        let ru = lang_from_code("ru");
        let en = lang_from_code("en");

        assert_eq!(t(&ru, "cancel-operation"), "❎ Операция отменена.");
        assert_eq!(t(&en, "cancel-operation"), "❎ Operation cancelled.");
    }

    #[test]
    fn unknown_language_falls_back_to_default() {
        let es = lang_from_code("es");
        assert_eq!(es.language.as_str(), DEFAULT_LANG_CODE);
        assert_eq!(t(&es, "not-admin"), "⛔ Вы не администратор.");
    }

    #[test]
    fn unknown_key_yields_visible_placeholder() {
        let en = lang_from_code("en");
        assert_eq!(t(&en, "no-such-key"), "Missing translation: en.no-such-key");
    }

    #[test]
    fn interpolates_arguments_without_isolation_marks() {
        let en = lang_from_code("en");
        let mut args = FluentArgs::new();
        args.set("total", "42");
        assert_eq!(t_args(&en, "user-count", &args), "👥 Total users: 42");
    }

    #[test]
    fn converts_newlines() {
        let en = lang_from_code("en");
        let mut args = FluentArgs::new();
        args.set("success", "3");
        args.set("failed", "1");
        let text = t_args(&en, "broadcast-complete", &args);

        assert!(text.contains('\n'));
        assert!(!text.contains("\\n"));
    }

    #[test]
    fn test_is_language_supported() {
        assert_eq!(is_language_supported("en"), Some("en"));
        assert_eq!(is_language_supported("ru"), Some("ru"));
        assert_eq!(is_language_supported("en-GB"), Some("en"));
        assert_eq!(is_language_supported("RU"), Some("ru"));
        assert_eq!(is_language_supported("de"), None);
        assert_eq!(is_language_supported("unknown"), None);
    }
}

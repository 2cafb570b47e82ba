//! Client locale lookups.
//!
//! The remote command service wants the client's CCSID and national language
//! version (NLV). Both are derived from `LANG`, searching from the most
//! specific locale to the most general (`en_US.UTF-8` -> `en_US` -> `en`).

use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// CCSID used when the locale has no mapping (US English EBCDIC)
pub const DEFAULT_CCSID: u32 = 37;

/// NLV used when the locale has no mapping (English)
pub const DEFAULT_NLV: &str = "2924";

fn locale_table() -> &'static HashMap<&'static str, (u32, &'static str)> {
    static TABLE: OnceLock<HashMap<&'static str, (u32, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| HashMap::from([("en", (37, "2924"))]))
}

fn lookup(lang: Option<&str>) -> Option<(u32, &'static str)> {
    let mut locale = lang?.trim();
    // Drop any codeset or modifier suffix before searching.
    if let Some(pos) = locale.find(['.', '@']) {
        locale = &locale[..pos];
    }

    while !locale.is_empty() {
        if let Some(entry) = locale_table().get(locale) {
            return Some(*entry);
        }
        match locale.rfind('_') {
            Some(pos) => locale = &locale[..pos],
            None => break,
        }
        debug!(locale, "Locale to search is now");
    }
    None
}

/// CCSID for `lang`, falling back to [`DEFAULT_CCSID`].
pub fn ccsid_for(lang: Option<&str>) -> u32 {
    lookup(lang).map(|(ccsid, _)| ccsid).unwrap_or(DEFAULT_CCSID)
}

/// NLV for `lang`, falling back to [`DEFAULT_NLV`].
pub fn nlv_for(lang: Option<&str>) -> &'static str {
    lookup(lang).map(|(_, nlv)| nlv).unwrap_or(DEFAULT_NLV)
}

/// CCSID for the current process locale.
pub fn ccsid() -> u32 {
    ccsid_for(std::env::var("LANG").ok().as_deref())
}

/// NLV for the current process locale.
pub fn nlv() -> &'static str {
    nlv_for(std::env::var("LANG").ok().as_deref())
}

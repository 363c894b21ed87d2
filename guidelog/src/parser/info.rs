//! Info event normalisation and coalescing.
//!
//! The guiding application writes several near-identical lines for what is one
//! logical event (repeated "star lost", a lock position change immediately
//! followed by the dither that caused it, a parameter nudged several times in a
//! row). These are folded into a single [`InfoEntry`] here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{GuideSession, InfoEntry};

const SETTLING_PREFIX: &str = "SETTLING STATE CHANGE, ";
const PARAM_CHANGE_PREFIX: &str = "Guiding parameter change, ";
const DITHER: &str = "DITHER";
const DITHER_DETAIL: &str = ", new lock pos";
const SET_LOCK_POS: &str = "SET LOCK POS";

static TRAILING_ZEROES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[0-9]+?(0+)$").expect("valid trailing zero pattern"));

/// Strip boilerplate and numeric noise from raw annotation text.
pub(crate) fn normalize(raw: &str) -> String {
    let mut text = raw
        .strip_prefix(SETTLING_PREFIX)
        .or_else(|| raw.strip_prefix(PARAM_CHANGE_PREFIX))
        .unwrap_or(raw);

    if text.starts_with(DITHER) {
        if let Some(pos) = text.find(DITHER_DETAIL) {
            text = &text[..pos];
        }
    }

    if text.ends_with("00") {
        if let Some(zeroes) = TRAILING_ZEROES.captures(text).and_then(|c| c.get(1)) {
            text = &text[..zeroes.start()];
        }
    }

    text.to_string()
}

/// Record an annotation anchored before the next frame of `session`.
pub(crate) fn add_info(session: &mut GuideSession, raw: &str) {
    let entry = InfoEntry {
        idx: session.entries.len(),
        repeats: 1,
        info: normalize(raw),
    };

    if let Some(prev) = session.infos.last_mut() {
        // repeated events such as star lost
        if entry.info == prev.info
            && entry.idx >= prev.idx
            && entry.idx <= prev.idx + prev.repeats as usize
        {
            prev.repeats += 1;
            return;
        }

        if prev.idx == entry.idx {
            // a later change of the same parameter supersedes the earlier one
            if let Some(eq) = prev.info.rfind('=') {
                if entry.info.starts_with(&prev.info[..eq]) {
                    *prev = entry;
                    return;
                }
            }
            if entry.info.starts_with(DITHER) && prev.info.starts_with(SET_LOCK_POS) {
                *prev = entry;
                return;
            }
        }
    }

    session.infos.push(entry);
}

/// Guiding on/off state announced by a parameter change annotation.
pub(crate) fn guiding_toggle(info: &str) -> Option<bool> {
    let lower = info.to_ascii_lowercase();
    let pos = lower.find("guiding enabled = ")?;
    let value = lower[pos + "guiding enabled = ".len()..].trim();
    if value.starts_with("true") {
        Some(true)
    } else if value.starts_with("false") {
        Some(false)
    } else {
        None
    }
}

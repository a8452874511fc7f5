//! # Ticket Codes
//!
//! Normalization of the unique code carried by a history row, and generation
//! of fresh codes when the pool for a ticket type is empty.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. code         "ABC123"                     ──► "ABC123"             │
//! │  2. ticket_code  "ABC123"                     ──► "ABC123"             │
//! │  3. reason       "Code coupon: ABC123, ..."   ──► "ABC123"  (legacy)   │
//! │  4. nothing usable                            ──► None                  │
//! │                                                                         │
//! │  Display of None: "Code N/A" / "Code non disponible"                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution runs once, when a stored row is turned into a
//! [`crate::ledger::HistoryEntry`]. Nothing else in the crate looks at the
//! legacy reason text.

use std::sync::LazyLock;

use regex::Regex;

/// Display fallback when no code could be resolved.
pub const CODE_NOT_AVAILABLE: &str = "Code N/A";

/// French display fallback, used by the dashboard's French locale.
pub const CODE_NOT_AVAILABLE_FR: &str = "Code non disponible";

/// Prefix of generated codes.
pub const GENERATED_CODE_PREFIX: &str = "T-";

static LEGACY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Code coupon:\s*([^\s,]+)").expect("static pattern compiles"));

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Extracts the code from a legacy `"Code coupon: <code>"` reason.
pub fn extract_legacy_code(reason: &str) -> Option<String> {
    LEGACY_CODE_RE
        .captures(reason)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolves the code of a history record.
///
/// ```rust
/// use comptoir_core::code::resolve_code;
///
/// assert_eq!(resolve_code(Some("A1"), Some("B2"), None).as_deref(), Some("A1"));
/// assert_eq!(resolve_code(Some(""), Some("B2"), None).as_deref(), Some("B2"));
/// assert_eq!(
///     resolve_code(None, None, Some("Code coupon: XY-99, merci")).as_deref(),
///     Some("XY-99")
/// );
/// assert_eq!(resolve_code(None, None, Some("computer_failure")), None);
/// ```
pub fn resolve_code(
    code: Option<&str>,
    ticket_code: Option<&str>,
    reason: Option<&str>,
) -> Option<String> {
    if let Some(code) = non_empty(code) {
        return Some(code.to_string());
    }
    if let Some(code) = non_empty(ticket_code) {
        return Some(code.to_string());
    }
    reason.and_then(extract_legacy_code)
}

/// The string the dashboard shows for a possibly missing code.
pub fn display_code(code: Option<&str>) -> &str {
    non_empty(code).unwrap_or(CODE_NOT_AVAILABLE)
}

/// French variant of [`display_code`].
pub fn display_code_fr(code: Option<&str>) -> &str {
    non_empty(code).unwrap_or(CODE_NOT_AVAILABLE_FR)
}

/// Generates a fresh code `T-XXXXXXXX` (8 uppercase hex digits).
///
/// Callers check the result against codes already issued; collisions are
/// possible in principle.
pub fn generate_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{GENERATED_CODE_PREFIX}{}", hex[..8].to_uppercase())
}

/// Cleans a batch of imported codes: trims, drops blanks and duplicates,
/// keeps first-seen order.
pub fn normalize_import(codes: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}

//! Purchase-action phrase matching

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// "add to cart", "add to bag", "buy now", "buy it", tolerating one space,
    /// dash or underscore (or nothing) between words
    static ref PURCHASE_ACTION_PATTERN: Regex = Regex::new(
        r"(?i)(add[ _-]?to[ _-]?cart|add[ _-]?to[ _-]?bag|buy[ _-]?now|buy[ _-]?it)"
    )
    .unwrap();
}

/// Check whether a text signal names a purchase action
pub fn is_purchase_action(text: &str) -> bool {
    PURCHASE_ACTION_PATTERN.is_match(text)
}

/// The matched phrase, if any
pub fn find_purchase_action(text: &str) -> Option<&str> {
    PURCHASE_ACTION_PATTERN.find(text).map(|m| m.as_str())
}

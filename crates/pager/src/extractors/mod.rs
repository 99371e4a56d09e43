// ABOUTME: Record extraction for listing pages driven by declarative selector rules.
// ABOUTME: Includes the rule data model, a compiled selector cache, and fallback evaluation.

//! Record extraction module.
//!
//! Submodules:
//! - `rules`: Selector rule set, fallback chains and per-field options.
//! - `compiled`: Process-wide cache of compiled CSS selectors.
//! - `select`: Fallback chain evaluation against an item root or document.
//! - `records`: Turns a parsed page into an ordered list of records.

pub mod compiled;
pub mod records;
pub mod rules;
pub mod select;

//! Clone name derivation.
//!
//! Clones are named `"{base} copy {n}"`. The base is the source name with
//! any trailing `" copy N"` suffix stripped, and `n` is one greater than the
//! highest copy index already present among the given names, so repeated
//! clones never collide. Cloning "Foo" yields "Foo copy 1", cloning again
//! yields "Foo copy 2", and cloning "Foo copy 2" yields "Foo copy 3".

use regex::Regex;
use std::sync::LazyLock;

/// Trailing `" copy N"` suffix.
static COPY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\scopy\s\d+$").unwrap());

/// Source name with any `" copy N"` suffix removed.
pub fn base_name(name: &str) -> String {
    COPY_SUFFIX.replace(name, "").to_string()
}

/// Copy index of `name` relative to `base`: 0 for the base itself, N for
/// `"{base} copy N"`, and `None` for unrelated names.
fn copy_index(base: &str, name: &str) -> Option<u64> {
    if name == base {
        return Some(0);
    }
    let rest = name.strip_prefix(base)?.strip_prefix(" copy ")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Derive the next clone name for `source` given the existing record names.
pub fn clone_name<'a>(source: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let base = base_name(source);
    let highest = existing
        .filter_map(|name| copy_index(&base, name))
        .max()
        .unwrap_or(0);
    format!("{} copy {}", base, highest + 1)
}

//! Plugin version grammar and ordering
//!
//! Versions are up to three dot-separated numeric components with an
//! optional `_<patch>` suffix, e.g. `3`, `3.1`, `3.1.4` or `3.1.4_2`.
//! Comparison is numeric per component; missing components count as zero.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

const VERSION_PATTERN: &str = r"^([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:_([0-9]+))?$";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern compiles"))
}

/// Whether `version` matches the plugin version grammar.
pub fn is_valid_version(version: &str) -> bool {
    version_regex().is_match(version)
}

fn components(version: &str) -> [u64; 4] {
    let Some(caps) = version_regex().captures(version) else {
        return [0; 4];
    };
    let mut parts = [0u64; 4];
    for (slot, part) in parts.iter_mut().zip(1..=4) {
        // Component values exceeding u64 are nobody's version scheme; saturate.
        *slot = caps
            .get(part)
            .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
            .unwrap_or(0);
    }
    parts
}

/// Compare two versions under the grammar's numeric ordering.
///
/// Strings that do not match the grammar compare as all-zero; callers are
/// expected to have validated them first.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    components(a).cmp(&components(b))
}

/// Whether a plugin carrying `version` and `compat_version` satisfies a
/// dependency on `wanted`.
///
/// An empty `wanted` means "any version". Otherwise the plugin matches when
/// `compat_version <= wanted <= version`.
pub fn range_matches(compat_version: &str, wanted: &str, version: &str) -> bool {
    if wanted.is_empty() {
        return true;
    }
    version_compare(compat_version, wanted) != Ordering::Greater
        && version_compare(wanted, version) != Ordering::Greater
}

// Client-side name matching for bulk selections

/// Matches a file name against a `*` wildcard pattern. `*` spans any run
/// of characters, including none, and may appear anywhere in the pattern,
/// so `report_*.csv` and `*2024*` both work.
pub fn wildcard_match(filename: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        None => filename == pattern,
        Some((prefix, rest)) => {
            let Some(remainder) = filename.strip_prefix(prefix) else {
                return false;
            };
            // Try every point where the star could stop matching.
            (0..=remainder.len())
                .filter(|i| remainder.is_char_boundary(*i))
                .any(|i| wildcard_match(&remainder[i..], rest))
        }
    }
}

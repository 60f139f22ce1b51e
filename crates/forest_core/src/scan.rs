//! Byte-pattern search helpers shared by the envelope, segmenter and patch
//! code.

/// First occurrence of `needle` in `haystack` at or after `from`.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

/// Every occurrence of `needle` at or after `from`, overlapping matches
/// included.
pub fn find_all(haystack: &[u8], needle: &[u8], from: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut pos = from;
    while let Some(idx) = find(haystack, needle, pos) {
        out.push(idx);
        pos = idx + 1;
    }
    out
}

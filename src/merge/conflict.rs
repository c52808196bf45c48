//! Conflict detection — step 2 ("Detect") of the Merge Engine pipeline.
//!
//! A path has no conflict when every variant's content hash matches (or
//! only one provider produced it). Otherwise the conflict is typed:
//! `addition` when some providers never touched the path, `line_level`
//! when the differing hunks occupy disjoint line ranges, else
//! `file_level`.

use super::{Conflict, ConflictType, FileVariant};
use crate::cache::sha256_hex;

/// Detect whether `variants` disagree on `path`'s content; `None` means
/// they're identical (or there's nothing to compare).
pub fn detect_conflicts(path: &str, variants: &[FileVariant]) -> Option<Conflict> {
    if variants.len() < 2 {
        return None;
    }

    let present: Vec<&FileVariant> = variants.iter().filter(|v| v.content.is_some()).collect();
    if present.is_empty() {
        return None;
    }

    let has_absence = present.len() < variants.len();

    let first_hash = sha256_hex(present[0].content.as_deref().unwrap_or(""));
    let all_identical = present
        .iter()
        .all(|v| sha256_hex(v.content.as_deref().unwrap_or("")) == first_hash);

    if all_identical && !has_absence {
        return None;
    }

    let conflict_type = if has_absence {
        ConflictType::Addition
    } else if line_ranges_disjoint(&present) {
        ConflictType::LineLevel
    } else {
        ConflictType::FileLevel
    };

    Some(Conflict {
        path: path.to_string(),
        conflict_type,
        variants: variants.to_vec(),
    })
}

/// Crude disjointness check: a line is "touched" by a variant if it isn't
/// present verbatim in every other variant. Disjoint means no touched
/// line index range overlaps across variants — a reasonable proxy for
/// "these are independent hunks" without a full diff/patience algorithm.
fn line_ranges_disjoint(present: &[&FileVariant]) -> bool {
    let line_sets: Vec<Vec<&str>> = present
        .iter()
        .map(|v| v.content.as_deref().unwrap_or("").lines().collect())
        .collect();

    let Some(baseline) = line_sets.first() else {
        return false;
    };

    let mut touched_ranges: Vec<(usize, usize)> = Vec::new();
    for lines in &line_sets[1..] {
        let mut start = None;
        for i in 0..lines.len().max(baseline.len()) {
            let differs = lines.get(i) != baseline.get(i);
            match (differs, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    touched_ranges.push((s, i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            touched_ranges.push((s, lines.len().max(baseline.len())));
        }
    }

    for i in 0..touched_ranges.len() {
        for j in (i + 1)..touched_ranges.len() {
            let (a_start, a_end) = touched_ranges[i];
            let (b_start, b_end) = touched_ranges[j];
            if a_start < b_end && b_start < a_end {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn variant(provider: ProviderId, content: Option<&str>) -> FileVariant {
        FileVariant { provider, path: "f.rs".into(), content: content.map(String::from) }
    }

    #[test]
    fn test_identical_content_no_conflict() {
        let variants = vec![variant(ProviderId::OpenAi, Some("x")), variant(ProviderId::Anthropic, Some("x"))];
        assert!(detect_conflicts("f.rs", &variants).is_none());
    }

    #[test]
    fn test_missing_variant_is_addition_conflict() {
        let variants = vec![variant(ProviderId::OpenAi, Some("x")), variant(ProviderId::Anthropic, None)];
        let conflict = detect_conflicts("f.rs", &variants).unwrap();
        assert_eq!(conflict.conflict_type, ConflictType::Addition);
    }

    #[test]
    fn test_differing_content_is_some_conflict_type() {
        let variants = vec![variant(ProviderId::OpenAi, Some("a\nb\nc")), variant(ProviderId::Anthropic, Some("a\nX\nc"))];
        let conflict = detect_conflicts("f.rs", &variants).unwrap();
        assert!(matches!(conflict.conflict_type, ConflictType::LineLevel | ConflictType::FileLevel));
    }

    #[test]
    fn test_single_variant_no_conflict() {
        let variants = vec![variant(ProviderId::OpenAi, Some("x"))];
        assert!(detect_conflicts("f.rs", &variants).is_none());
    }
}

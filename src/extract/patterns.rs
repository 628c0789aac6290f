//! Cue-phrase table for pattern-based relationship extraction (§4.3 pass 2).
//!
//! Carried forward verbatim from the original implementation's
//! `RELATIONSHIP_PATTERNS` table, one entry per non-`RELATED_TO` kind in
//! [`crate::models::RELATIONSHIP_KINDS`].

/// `(kind, cues)`. A cue matches when the literal string
/// `"<source_lower><cue><target_lower>"` occurs in the lower-cased text.
pub const RELATIONSHIP_PATTERNS: &[(&str, &[&str])] = &[
    (
        "DEFINES_CONCEPT",
        &[" defines ", " is defined as ", " refers to ", " means "],
    ),
    ("IS_A", &[" is a ", " is an ", " is type of ", " is kind of "]),
    (
        "HAS_PART",
        &[" has ", " contains ", " includes ", " consists of "],
    ),
    (
        "USED_FOR",
        &[" is used for ", " is used to ", " enables ", " allows "],
    ),
    (
        "IMPLEMENTS_METHOD",
        &[" implements ", " uses ", " employs ", " utilizes "],
    ),
    (
        "HAS_ATTRIBUTE",
        &[" has attribute ", " has property ", " is characterized by "],
    ),
    (
        "EXAMPLE_OF",
        &[" is example of ", " illustrates ", " demonstrates "],
    ),
    ("REQUIRES_INPUT", &[" requires ", " needs ", " depends on "]),
    (
        "STEP_IN_PROCESS",
        &[" follows ", " precedes ", " comes after ", " comes before "],
    ),
    (
        "COMPARES_WITH",
        &[
            " compared to ",
            " versus ",
            " as opposed to ",
            " in contrast to ",
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_non_related_to_kind() {
        for kind in crate::models::RELATIONSHIP_KINDS.iter().filter(|k| **k != "RELATED_TO") {
            assert!(
                RELATIONSHIP_PATTERNS.iter().any(|(k, _)| k == kind),
                "missing cue table entry for {kind}"
            );
        }
    }
}

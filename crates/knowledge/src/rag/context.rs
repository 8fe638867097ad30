//! Prompt context assembly.

use crate::types::ScoredFragment;

/// Join ranked fragments into one context block.
///
/// Each fragment is prefixed with its page label and fragments are separated
/// by a blank line, best match first.
pub fn build_context(fragments: &[ScoredFragment]) -> String {
    fragments
        .iter()
        .map(|scored| format!("{} {}", scored.fragment.label(), scored.fragment.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fragment;

    #[test]
    fn test_context_labels_and_separators() {
        let fragments = vec![
            ScoredFragment {
                fragment: Fragment::new("Rust has no garbage collector.", 4),
                score: 0.8,
            },
            ScoredFragment {
                fragment: Fragment::new("Ownership is checked at compile time.", 2)
                    .with_source("book.pdf"),
                score: 0.5,
            },
        ];

        assert_eq!(
            build_context(&fragments),
            "[Page 4] Rust has no garbage collector.\n\n\
             [book.pdf, Page 2] Ownership is checked at compile time."
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(build_context(&[]), "");
    }
}

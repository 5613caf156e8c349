use index::Language;

use crate::types::TranslationMemoryCandidate;

/// Render candidates as the reference block placed in a translation prompt.
///
/// ```
/// use index::Language;
/// use matcher::{format_memory_context, MatchLabel, TranslationMemoryCandidate};
///
/// let candidates = vec![TranslationMemoryCandidate {
///     id: "1".into(),
///     source: "机器学习".into(),
///     target: "machine learning".into(),
///     score: 0.93,
///     label: MatchLabel::Strong,
/// }];
/// let block = format_memory_context(&candidates, Language::Chinese, Language::English);
/// assert!(block.contains("1. 机器学习 → machine learning"));
/// ```
pub fn format_memory_context(
    candidates: &[TranslationMemoryCandidate],
    source_language: Language,
    target_language: Language,
) -> String {
    if candidates.is_empty() {
        return String::new();
    }

    let mut out = format!("Translation memory ({source_language} → {target_language}):\n");
    for (n, c) in candidates.iter().enumerate() {
        out.push_str(&format!("{}. {} → {}\n", n + 1, c.source, c.target));
    }
    out
}

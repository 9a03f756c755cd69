const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "from",
    "by", "about", "as", "into", "through", "after", "before", "between", "under", "over",
    "above", "below", "up", "down", "out", "off", "this", "that", "these", "those", "is", "are",
    "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "can", "must", "shall",
];

const MAX_KEYWORDS: usize = 3;
const MIN_KEYWORD_LEN: usize = 3;

/// Up to three significant words from a title, space separated.
///
/// Falls back to the first two raw words of the title when every token is a
/// stop word or too short.
pub fn extract_keywords(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let keywords: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOP_WORDS.contains(w))
        .take(MAX_KEYWORDS)
        .collect();

    if keywords.is_empty() {
        title.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
    } else {
        keywords.join(" ")
    }
}

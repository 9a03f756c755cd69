use crate::models::Category;

/// Assign a category by keyword scoring over the lower-cased title and
/// description.
///
/// A category scores one point per keyword that appears anywhere in the text
/// (plain substring match, so "app" matches "apple"). The highest nonzero
/// score wins, ties go to the earliest declared category, and text that
/// scores nothing falls back to [`Category::General`].
pub fn classify(title: &str, description: &str) -> Category {
    let text = format!("{} {}", title, description).to_lowercase();

    let mut best = Category::General;
    let mut best_score = 0;

    for category in Category::SCORED {
        let score = category
            .keywords()
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .count();

        // Strictly greater keeps the first declared category on ties
        if score > best_score {
            best = category;
            best_score = score;
        }
    }

    best
}

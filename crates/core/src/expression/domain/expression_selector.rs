use super::expression::{Expression, ExpressionScores};

/// Glyph shown when no face is present, and the fallback for any
/// category missing from the table.
pub const NEUTRAL_GLYPH: &str = "😐";

/// Static category → glyph table.
const GLYPHS: &[(Expression, &str)] = &[
    (Expression::Happy, "😄"),
    (Expression::Sad, "🙁"),
    (Expression::Angry, "😡"),
    (Expression::Surprised, "😮"),
    (Expression::Disgusted, "🤢"),
    (Expression::Fearful, "😨"),
    (Expression::Neutral, "😐"),
];

/// Glyph for one category.
///
/// The table covers the whole closed set, so the neutral fallback is
/// unreachable today; it stays because an unmapped category must degrade
/// to neutral rather than error.
pub fn glyph_for(expression: Expression) -> &'static str {
    GLYPHS
        .iter()
        .find(|(e, _)| *e == expression)
        .map(|(_, g)| *g)
        .unwrap_or(NEUTRAL_GLYPH)
}

/// Dominant category of `scores` and its glyph.
pub fn select(scores: &ExpressionScores) -> (Expression, &'static str) {
    let dominant = scores.dominant();
    (dominant, glyph_for(dominant))
}

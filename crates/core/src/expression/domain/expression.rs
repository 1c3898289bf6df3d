/// Closed set of expression categories the classifier scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    Happy,
    Sad,
    Angry,
    Surprised,
    Disgusted,
    Fearful,
    Neutral,
}

impl Expression {
    /// Canonical category order. Score iteration follows this order, so
    /// exact ties in [`ExpressionScores::dominant`] resolve to the
    /// earliest entry.
    pub const ALL: [Expression; 7] = [
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Surprised,
        Expression::Disgusted,
        Expression::Fearful,
        Expression::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Surprised => "surprised",
            Expression::Disgusted => "disgusted",
            Expression::Fearful => "fearful",
            Expression::Neutral => "neutral",
        }
    }

    fn index(self) -> usize {
        match self {
            Expression::Happy => 0,
            Expression::Sad => 1,
            Expression::Angry => 2,
            Expression::Surprised => 3,
            Expression::Disgusted => 4,
            Expression::Fearful => 5,
            Expression::Neutral => 6,
        }
    }
}

/// Per-category probabilities, stored dense in [`Expression::ALL`] order.
///
/// Values are expected in `[0, 1]` but nothing here depends on them
/// summing to one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    values: [f32; 7],
}

impl ExpressionScores {
    /// Scores given in [`Expression::ALL`] order.
    pub fn new(values: [f32; 7]) -> Self {
        Self { values }
    }

    pub fn get(&self, expression: Expression) -> f32 {
        self.values[expression.index()]
    }

    pub fn set(&mut self, expression: Expression, score: f32) {
        self.values[expression.index()] = score;
    }

    /// Category with the maximum score; exact ties go to the category
    /// that appears first in [`Expression::ALL`].
    pub fn dominant(&self) -> Expression {
        let mut best = Expression::ALL[0];
        let mut best_score = self.get(best);
        for &candidate in &Expression::ALL[1..] {
            let score = self.get(candidate);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        best
    }
}

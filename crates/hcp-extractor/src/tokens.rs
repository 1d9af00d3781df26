//! Token estimation for chunk sizing

/// Estimates how many model tokens a text costs.
///
/// The chunker only needs an upper-bound-ish figure to keep prompts inside
/// the model's window, so implementations may trade accuracy for speed. The
/// chunker assumes estimates are subadditive: the cost of two texts joined
/// by a blank line is at most the sum of their separate costs.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count of `text`
    fn estimate(&self, text: &str) -> usize;
}

/// Word count × 1.5, rounded up.
///
/// Advisory only: real subword tokenizers diverge from this in both
/// directions, particularly for numbers, URLs and non-Latin scripts. Plug
/// in a model-specific estimator when exact budgets matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountEstimator;

impl TokenEstimator for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        let words = text.split_whitespace().count();
        (words * 3).div_ceil(2)
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_estimate() {
        let est = WordCountEstimator;
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("one"), 2);
        assert_eq!(est.estimate("one two"), 3);
        assert_eq!(est.estimate("  one\n\ntwo   three "), 5);
    }

    #[test]
    fn test_closure_estimator() {
        let chars = |text: &str| text.len();
        assert_eq!(chars.estimate("abcd"), 4);
    }
}

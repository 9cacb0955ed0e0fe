//! Score decoder — arg-max selection over the raw class scores.

use crate::types::Emotion;

/// Index of the highest score.
///
/// Left-to-right scan with a strict greater-than comparison, so ties keep
/// the first occurrence. Returns `None` for an empty vector (or one that is
/// all NaN).
pub fn best_class(scores: &[f32]) -> Option<usize> {
    let mut max_score = f32::NEG_INFINITY;
    let mut max_idx = None;
    for (i, &score) in scores.iter().enumerate() {
        if score > max_score {
            max_score = score;
            max_idx = Some(i);
        }
    }
    max_idx
}

/// Decode a raw score vector into the winning emotion class.
pub fn decode(scores: &[f32]) -> Option<Emotion> {
    best_class(scores).and_then(Emotion::from_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_maximum_wins() {
        // Two equal maxima at indices 1 and 4: the scan must keep index 1.
        let scores = [0.1, 0.9, 0.2, 0.05, 0.9, 0.3, 0.0];
        assert_eq!(best_class(&scores), Some(1));
        assert_eq!(decode(&scores), Some(Emotion::Disgust));
        assert_eq!(decode(&scores).unwrap().label(), "DISGUST");
    }

    #[test]
    fn test_all_equal_picks_index_zero() {
        let scores = [0.5; 7];
        assert_eq!(best_class(&scores), Some(0));
        assert_eq!(decode(&scores), Some(Emotion::Angry));
    }

    #[test]
    fn test_negative_scores() {
        // Raw logits can all be negative.
        let scores = [-3.0, -1.5, -2.0, -0.25, -4.0, -1.0, -2.5];
        assert_eq!(best_class(&scores), Some(3));
        assert_eq!(decode(&scores), Some(Emotion::Happy));
    }

    #[test]
    fn test_empty_scores() {
        assert_eq!(best_class(&[]), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn test_all_nan_scores() {
        let scores = [f32::NAN; 7];
        assert_eq!(best_class(&scores), None);
    }

    #[test]
    fn test_nan_entries_are_skipped() {
        let scores = [f32::NAN, 0.2, f32::NAN, 0.7, 0.1, 0.0, 0.0];
        assert_eq!(best_class(&scores), Some(3));
    }

    #[test]
    fn test_out_of_table_index_yields_none() {
        // A longer-than-expected vector whose maximum falls past the label
        // table decodes to nothing rather than a wrong label.
        let scores = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(best_class(&scores), Some(7));
        assert_eq!(decode(&scores), None);
    }
}

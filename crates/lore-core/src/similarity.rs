//! Vector similarity scoring and ranking.
//!
//! Embeddings arrive pre-normalized from the provider, so the dot product
//! stands in for cosine similarity without a normalization step.

use std::cmp::Ordering;

use crate::error::{LoreError, LoreResult};

/// Dot product of two equal-length vectors.
///
/// # Errors
///
/// [`LoreError::DimensionMismatch`] when the lengths differ.
///
/// # Example
///
/// ```rust
/// use lore_core::similarity::similarity;
///
/// assert_eq!(similarity(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), 11.0);
/// assert!(similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
/// ```
pub fn similarity(a: &[f32], b: &[f32]) -> LoreResult<f32> {
    if a.len() != b.len() {
        return Err(LoreError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// An item paired with its similarity to a reference vector.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Comparator that orders scores from most to least similar. NaN sorts
/// after every number, so the order is total.
pub fn by_descending_similarity(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Score every item against `reference` and sort by descending similarity.
///
/// All scores are computed before sorting, so the first dimension mismatch
/// aborts the whole ranking. The sort is stable: equal scores keep their
/// input order.
pub fn rank<T, F>(items: Vec<T>, reference: &[f32], vector_of: F) -> LoreResult<Vec<Scored<T>>>
where
    F: Fn(&T) -> &[f32],
{
    let mut scored = items
        .into_iter()
        .map(|item| -> LoreResult<Scored<T>> {
            let score = similarity(vector_of(&item), reference)?;
            Ok(Scored { item, score })
        })
        .collect::<LoreResult<Vec<_>>>()?;

    scored.sort_by(|a, b| by_descending_similarity(a.score, b.score));
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let sim = similarity(&[0.6, 0.8], &[0.6, 0.8]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        let sim = similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_eq!(sim, 0.0);
        let sim = similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert_eq!(sim, -1.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (vec![0.1f32, -0.4, 0.9], vec![0.3f32, 0.3, -0.2]),
            (vec![1.5, 2.5], vec![-3.0, 0.25]),
            (vec![], vec![]),
        ];
        for (a, b) in pairs.iter() {
            assert_eq!(similarity(a, b).unwrap(), similarity(b, a).unwrap());
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            LoreError::DimensionMismatch { left: 2, right: 3 }
        ));
    }

    #[test]
    fn test_empty_vectors_score_zero() {
        assert_eq!(similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let items = vec![
            ("low", vec![0.1f32, 0.0]),
            ("tie-a", vec![0.5, 0.0]),
            ("high", vec![0.9, 0.0]),
            ("tie-b", vec![0.5, 0.0]),
        ];
        let ranked = rank(items, &[1.0, 0.0], |(_, v)| v.as_slice()).unwrap();
        let order: Vec<&str> = ranked.iter().map(|s| s.item.0).collect();
        assert_eq!(order, vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn test_rank_propagates_mismatch() {
        let items = vec![vec![1.0f32, 0.0], vec![1.0f32]];
        let result = rank(items, &[1.0, 0.0], |v| v.as_slice());
        assert!(matches!(result, Err(LoreError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_comparator_orders_descending() {
        let mut scores = vec![0.2f32, -0.5, 0.8, 0.3];
        scores.sort_by(|a, b| by_descending_similarity(*a, *b));
        assert_eq!(scores, vec![0.8, 0.3, 0.2, -0.5]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let items = vec![
            ("nan", vec![f32::NAN, 0.0]),
            ("low", vec![-0.9, 0.0]),
            ("high", vec![0.9, 0.0]),
        ];
        let ranked = rank(items, &[1.0, 0.0], |(_, v)| v.as_slice()).unwrap();
        let order: Vec<&str> = ranked.iter().map(|s| s.item.0).collect();
        assert_eq!(order, vec!["high", "low", "nan"]);

        assert_eq!(by_descending_similarity(f32::NAN, 1.0), Ordering::Greater);
        assert_eq!(by_descending_similarity(1.0, f32::NAN), Ordering::Less);
        assert_eq!(by_descending_similarity(f32::NAN, f32::NAN), Ordering::Equal);
    }
}

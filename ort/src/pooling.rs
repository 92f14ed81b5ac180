//! Pooling strategies for extracting embeddings from transformer outputs.

use ndarray::{ArrayView2, Axis};

/// Strategy for pooling one sequence of hidden states into a single vector.
///
/// - Sentence-transformers encoders (`all-MiniLM-L6-v2`) use [`Mean`](PoolingStrategy::Mean)
/// - Decoder embedding models use [`LastToken`](PoolingStrategy::LastToken)
/// - BERT-style classifiers use [`Cls`](PoolingStrategy::Cls)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoolingStrategy {
    /// Average the hidden states of all non-padding tokens.
    #[default]
    Mean,

    /// Use the last non-padding token's hidden state.
    LastToken,

    /// Use the first token's hidden state.
    Cls,
}

impl PoolingStrategy {
    /// Pools `hidden_states` of shape `[seq_len, hidden_dim]`.
    ///
    /// `attention_mask` marks real tokens with a non-zero value. A sequence without any real
    /// token pools to zeros.
    #[must_use]
    pub fn apply(self, hidden_states: ArrayView2<'_, f32>, attention_mask: &[u32]) -> Vec<f32> {
        let (seq_len, hidden_dim) = hidden_states.dim();
        if seq_len == 0 {
            return vec![0.0; hidden_dim];
        }

        match self {
            Self::Mean => {
                let mut sum = vec![0.0; hidden_dim];
                let mut count = 0_u32;
                for (row, _) in hidden_states
                    .axis_iter(Axis(0))
                    .zip(attention_mask)
                    .filter(|(_, mask)| **mask != 0)
                {
                    count += 1;
                    for (acc, value) in sum.iter_mut().zip(row) {
                        *acc += value;
                    }
                }
                if count == 0 {
                    return sum;
                }
                #[allow(clippy::cast_precision_loss)]
                let count = count as f32;
                sum.iter_mut().for_each(|value| *value /= count);
                sum
            }
            Self::LastToken => {
                let last = attention_mask
                    .iter()
                    .take(seq_len)
                    .rposition(|&mask| mask != 0)
                    .unwrap_or(seq_len - 1);
                hidden_states.row(last).to_vec()
            }
            Self::Cls => hidden_states.row(0).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn hidden() -> Array2<f32> {
        Array2::from_shape_vec(
            (3, 4),
            vec![
                1.0, 2.0, 3.0, 4.0, // token 0
                5.0, 6.0, 7.0, 8.0, // token 1
                9.0, 10.0, 11.0, 12.0, // token 2
            ],
        )
        .unwrap()
    }

    #[test]
    fn mean_ignores_padding() {
        let result = PoolingStrategy::Mean.apply(hidden().view(), &[1, 1, 0]);
        assert_eq!(result, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn mean_without_tokens_is_zero() {
        let result = PoolingStrategy::Mean.apply(hidden().view(), &[0, 0, 0]);
        assert_eq!(result, vec![0.0; 4]);
    }

    #[test]
    fn last_token_skips_padding() {
        assert_eq!(
            PoolingStrategy::LastToken.apply(hidden().view(), &[1, 1, 1]),
            vec![9.0, 10.0, 11.0, 12.0]
        );
        assert_eq!(
            PoolingStrategy::LastToken.apply(hidden().view(), &[1, 1, 0]),
            vec![5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn cls_takes_first_token() {
        let result = PoolingStrategy::Cls.apply(hidden().view(), &[1, 1, 1]);
        assert_eq!(result, vec![1.0, 2.0, 3.0, 4.0]);
    }
}

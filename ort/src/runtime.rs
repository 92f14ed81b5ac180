//! ONNX Runtime session and tokenizer.

use ndarray::{Array3, Axis};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use crate::{OrtError, PoolingStrategy};

pub(crate) struct Runtime {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    token_type_ids: bool,
}

impl Runtime {
    /// Loads the session and tokenizer, returning the runtime and the embedding dimension.
    pub(crate) fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
    ) -> Result<(Self, usize), OrtError> {
        let mut tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| OrtError::tokenizer(tokenizer_path, e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| OrtError::tokenizer(tokenizer_path, e))?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus())?
            .commit_from_file(model_path)?;
        let dimension = detect_embedding_dimension(&session)?;
        let token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        Ok((
            Self {
                session: Mutex::new(session),
                tokenizer,
                token_type_ids,
            },
            dimension,
        ))
    }

    /// Embeds a padded batch and pools every sequence.
    pub(crate) fn embed(
        &self,
        texts: &[String],
        pooling: PoolingStrategy,
    ) -> Result<Vec<Vec<f32>>, OrtError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| OrtError::Tokenization(e.to_string()))?;
        let batch = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|encoding| encoding.get_ids().len())
            .max()
            .unwrap_or_default();

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        let mut types = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            ids.extend(encoding.get_ids().iter().map(|&id| i64::from(id)));
            mask.extend(encoding.get_attention_mask().iter().map(|&m| i64::from(m)));
            types.extend(encoding.get_type_ids().iter().map(|&t| i64::from(t)));
        }
        let shape = [batch, seq_len];

        let (output_shape, hidden) = {
            let mut session = self.session.lock().map_err(|_| OrtError::Poisoned)?;
            let mut inputs = ort::inputs![
                "input_ids" => Tensor::from_array((shape, ids.into_boxed_slice()))?,
                "attention_mask" => Tensor::from_array((shape, mask.into_boxed_slice()))?,
            ];
            if self.token_type_ids {
                inputs.push((
                    "token_type_ids".into(),
                    Tensor::from_array((shape, types.into_boxed_slice()))?.into(),
                ));
            }
            let outputs = session.run(inputs)?;
            let hidden = outputs
                .get("last_hidden_state")
                .or_else(|| outputs.get("hidden_states"))
                .or_else(|| outputs.get("output"))
                .ok_or(OrtError::InvalidOutputShape(0))?;
            let (output_shape, data) = hidden.try_extract_tensor::<f32>()?;
            (output_shape.to_vec(), data.to_vec())
        };

        if output_shape.len() != 3 {
            return Err(OrtError::InvalidOutputShape(output_shape.len()));
        }
        let dims = output_shape
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| OrtError::Shape(format!("negative dimension {d}"))))
            .collect::<Result<Vec<_>, _>>()?;
        if dims[0] != batch {
            return Err(OrtError::Shape(format!("{} outputs for a batch of {batch}", dims[0])));
        }
        let hidden = Array3::from_shape_vec((dims[0], dims[1], dims[2]), hidden)
            .map_err(|e| OrtError::Shape(e.to_string()))?;

        Ok(encodings
            .iter()
            .enumerate()
            .map(|(row, encoding)| {
                pooling.apply(hidden.index_axis(Axis(0), row), encoding.get_attention_mask())
            })
            .collect())
    }
}

/// Detects the embedding dimension from model output metadata.
fn detect_embedding_dimension(session: &Session) -> Result<usize, OrtError> {
    for output in session.outputs() {
        if let ort::value::ValueType::Tensor { shape, .. } = output.dtype() {
            // [batch, seq_len, hidden_dim] or [batch, hidden_dim]
            if shape.len() >= 2 {
                if let Some(&dim) = shape.last() {
                    if dim > 0 {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        return Ok(dim as usize);
                    }
                }
            }
        }
    }
    Err(OrtError::InvalidOutputShape(0))
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
}

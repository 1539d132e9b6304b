//! Safetensors fixtures.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use safetensors::tensor::TensorView;
use safetensors::Dtype;

/// Writes a small safetensors file shaped like a single-class nano model's
/// stem and class head, with the given `__metadata__` entries.
///
/// # Errors
///
/// Returns an error if the file cannot be serialized or written.
pub fn write_weights_fixture(path: impl AsRef<Path>, metadata: &[(&str, &str)]) -> Result<()> {
    let stem = vec![0.0f32; 16 * 3 * 3 * 3];
    let cls = vec![0.0f32; 64];

    let tensors = HashMap::from([
        (
            "net.b1.0.conv.weight".to_string(),
            TensorView::new(Dtype::F32, vec![16, 3, 3, 3], bytemuck::cast_slice(&stem))?,
        ),
        (
            "head.cv3.0.2.weight".to_string(),
            TensorView::new(Dtype::F32, vec![1, 64, 1, 1], bytemuck::cast_slice(&cls))?,
        ),
    ]);

    let metadata: Option<HashMap<String, String>> = if metadata.is_empty() {
        None
    } else {
        Some(
            metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    };

    safetensors::serialize_to_file(&tensors, &metadata, path.as_ref())?;
    Ok(())
}

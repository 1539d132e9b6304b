//! Weight loading for safetensors files.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Reads a weights file into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_weights_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).with_context(|| format!("Failed to read model file: {}", path.display()))
}

/// Loads a safetensors file and creates a `VarBuilder` for the model.
///
/// Tensors stored as F16/BF16 are converted to F32 when fetched.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The safetensors data is invalid
/// - A tensor uses a dtype candle cannot represent
pub fn load_safetensors(path: impl AsRef<Path>, device: &Device) -> Result<VarBuilder<'static>> {
    let path = path.as_ref();
    debug!("Loading safetensors from {}", path.display());

    let data = read_weights_file(path)?;
    let tensors = SafeTensors::deserialize(&data)
        .with_context(|| format!("Failed to parse safetensors: {}", path.display()))?;

    let mut tensor_map: HashMap<String, Tensor> = HashMap::new();
    for (name, view) in tensors.tensors() {
        let dtype = safetensors_dtype_to_candle(view.dtype())
            .with_context(|| format!("Tensor '{name}' has an unsupported dtype"))?;
        let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
            .with_context(|| format!("Failed to create tensor '{name}'"))?;
        tensor_map.insert(name, tensor);
    }

    debug!("Loaded {} tensors from {}", tensor_map.len(), path.display());
    Ok(VarBuilder::from_tensors(tensor_map, DType::F32, device))
}

/// Converts safetensors dtype to candle dtype.
pub(crate) fn safetensors_dtype_to_candle(dtype: safetensors::Dtype) -> Result<DType> {
    use safetensors::Dtype as S;
    match dtype {
        S::F32 => Ok(DType::F32),
        S::F64 => Ok(DType::F64),
        S::F16 => Ok(DType::F16),
        S::BF16 => Ok(DType::BF16),
        S::I64 => Ok(DType::I64),
        S::U8 => Ok(DType::U8),
        S::U32 => Ok(DType::U32),
        other => anyhow::bail!("Unsupported dtype: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[allow(clippy::expect_used)]
    fn create_test_safetensors() -> NamedTempFile {
        use safetensors::serialize;
        use safetensors::tensor::TensorView;

        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let data_bytes: &[u8] = bytemuck::cast_slice(&data);

        let tensor = TensorView::new(safetensors::Dtype::F32, vec![2, 2], data_bytes)
            .expect("valid tensor view");

        let tensors = HashMap::from([("head.weight".to_string(), tensor)]);
        let serialized = serialize(&tensors, &None).expect("serialize");

        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(&serialized).expect("write");
        file
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_load_safetensors_exposes_tensors() {
        let file = create_test_safetensors();
        let vb = load_safetensors(file.path(), &Device::Cpu).expect("load");
        assert!(vb.contains_tensor("head.weight"));
        let t = vb.get((2, 2), "head.weight").expect("tensor");
        let values = t.flatten_all().and_then(|t| t.to_vec1::<f32>()).expect("values");
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_load_safetensors_missing_file() {
        let result = load_safetensors("/nonexistent/path.safetensors", &Device::Cpu);
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("Failed to read model file"));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_load_safetensors_garbage() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"definitely not safetensors").expect("write");
        assert!(load_safetensors(file.path(), &Device::Cpu).is_err());
    }
}

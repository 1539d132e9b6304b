//! Offline inspection of detector weight files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use safetensors::SafeTensors;
use serde::Serialize;

use super::loader::{read_weights_file, safetensors_dtype_to_candle};
use super::yolo::Variant;

/// Tensor holding the stem convolution of the backbone.
const STEM_TENSOR: &str = "net.b1.0.conv.weight";

/// Tensor holding the class projection of the first head level.
const CLASS_HEAD_TENSOR: &str = "head.cv3.0.2.weight";

/// Summary of one tensor.
#[derive(Debug, Clone, Serialize)]
pub struct TensorSummary {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl TensorSummary {
    /// Number of scalar elements.
    #[must_use]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Everything we can learn about a weights file without building the network.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub path: String,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Class index to name, from the file metadata.
    pub class_names: BTreeMap<usize, String>,
    /// Class count read from the detection head, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub num_tensors: usize,
    pub num_parameters: usize,
    pub tensors: Vec<TensorSummary>,
    /// Metadata entries other than `task` and `names`.
    pub attributes: BTreeMap<String, String>,
}

impl ModelReport {
    /// Reads and summarises the weights file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid safetensors.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_weights_file(path)?;
        Self::from_bytes(&path.display().to_string(), &data)
    }

    /// Summarises safetensors data already in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid safetensors.
    pub fn from_bytes(path: &str, data: &[u8]) -> Result<Self> {
        let (_, header) = SafeTensors::read_metadata(data)
            .with_context(|| format!("Failed to parse safetensors header: {path}"))?;
        let tensors = SafeTensors::deserialize(data)
            .with_context(|| format!("Failed to parse safetensors: {path}"))?;

        let mut summaries: Vec<TensorSummary> = tensors
            .tensors()
            .into_iter()
            .map(|(name, view)| TensorSummary {
                name,
                dtype: safetensors_dtype_to_candle(view.dtype())
                    .map_or_else(|_| format!("{:?}", view.dtype()), |d| d.as_str().to_string()),
                shape: view.shape().to_vec(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut attributes: BTreeMap<String, String> = header
            .metadata()
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        let task = attributes.remove("task");
        let class_names = attributes
            .remove("names")
            .map(|raw| parse_class_names(&raw))
            .unwrap_or_default();

        let shape_of = |name: &str| {
            summaries
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.shape.clone())
        };
        let num_classes = shape_of(CLASS_HEAD_TENSOR).and_then(|s| s.first().copied());
        let variant = shape_of(STEM_TENSOR)
            .and_then(|s| s.first().copied())
            .and_then(|stem| Variant::ALL.into_iter().find(|v| v.stem_channels() == stem))
            .map(|v| v.to_string());

        Ok(Self {
            path: path.to_string(),
            file_size: data.len() as u64,
            task,
            class_names,
            num_classes,
            variant,
            num_tensors: summaries.len(),
            num_parameters: summaries.iter().map(TensorSummary::elem_count).sum(),
            tensors: summaries,
            attributes,
        })
    }
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "MODEL INFORMATION")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Path: {}", self.path)?;
        writeln!(f, "File size: {} bytes", self.file_size)?;
        writeln!(f, "Task: {}", self.task.as_deref().unwrap_or("Unknown"))?;

        writeln!(f)?;
        if self.class_names.is_empty() {
            writeln!(f, "No class names found")?;
        } else {
            writeln!(f, "Class names:")?;
            for (idx, name) in &self.class_names {
                writeln!(f, "  {idx}: {name}")?;
            }
            writeln!(f, "Number of classes: {}", self.class_names.len())?;
        }

        writeln!(f)?;
        writeln!(f, "Model info:")?;
        match self.variant.as_deref() {
            Some(v) => writeln!(f, "  Variant: YOLOv8{v}")?,
            None => writeln!(f, "  Variant: unknown")?,
        }
        match self.num_classes {
            Some(n) => writeln!(f, "  Head classes: {n}")?,
            None => writeln!(f, "  Head classes: unknown")?,
        }
        writeln!(f, "  Tensor count: {}", self.num_tensors)?;
        writeln!(f, "  Parameter count: {}", self.num_parameters)?;

        if !self.attributes.is_empty() {
            writeln!(f)?;
            writeln!(f, "Model attributes:")?;
            for (key, value) in &self.attributes {
                writeln!(f, "  {key}: {value}")?;
            }
        }

        Ok(())
    }
}

/// Parses a class-name mapping stored as metadata.
///
/// Accepts a JSON object (`{"0": "face"}`), a JSON array (`["face"]`) or a
/// Python dict literal (`{0: 'face'}`). Unparseable input yields an empty map.
fn parse_class_names(raw: &str) -> BTreeMap<usize, String> {
    if let Ok(map) = serde_json::from_str::<BTreeMap<String, String>>(raw) {
        return map
            .into_iter()
            .filter_map(|(k, v)| k.trim().parse().ok().map(|k| (k, v)))
            .collect();
    }
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list.into_iter().enumerate().collect();
    }

    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim().parse().ok()?;
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            Some((key, value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;
    use std::collections::HashMap;

    fn build_file(metadata: Option<HashMap<String, String>>) -> Vec<u8> {
        let stem: Vec<f32> = vec![0.0; 16 * 3 * 3 * 3];
        let cls: Vec<f32> = vec![0.0; 2 * 64];
        let stem_view = TensorView::new(
            safetensors::Dtype::F32,
            vec![16, 3, 3, 3],
            bytemuck::cast_slice(&stem),
        )
        .expect("stem view");
        let cls_view = TensorView::new(
            safetensors::Dtype::F32,
            vec![2, 64, 1, 1],
            bytemuck::cast_slice(&cls),
        )
        .expect("cls view");
        let tensors = HashMap::from([
            (STEM_TENSOR.to_string(), stem_view),
            (CLASS_HEAD_TENSOR.to_string(), cls_view),
        ]);
        safetensors::serialize(&tensors, &metadata).expect("serialize")
    }

    #[test]
    fn test_report_infers_variant_and_classes() {
        let data = build_file(None);
        let report = ModelReport::from_bytes("mem", &data).expect("report");
        assert_eq!(report.variant.as_deref(), Some("n"));
        assert_eq!(report.num_classes, Some(2));
        assert_eq!(report.num_tensors, 2);
        assert_eq!(report.num_parameters, 16 * 27 + 128);
        assert!(report.class_names.is_empty());
        assert!(report.task.is_none());
    }

    #[test]
    fn test_report_reads_metadata() {
        let metadata = HashMap::from([
            ("task".to_string(), "detect".to_string()),
            ("names".to_string(), "{0: 'face', 1: 'mask'}".to_string()),
            ("imgsz".to_string(), "640".to_string()),
        ]);
        let report = ModelReport::from_bytes("mem", &build_file(Some(metadata))).expect("report");
        assert_eq!(report.task.as_deref(), Some("detect"));
        assert_eq!(report.class_names.get(&0).map(String::as_str), Some("face"));
        assert_eq!(report.class_names.get(&1).map(String::as_str), Some("mask"));
        assert_eq!(report.attributes.get("imgsz").map(String::as_str), Some("640"));
        assert!(!report.attributes.contains_key("names"));

        let text = report.to_string();
        assert!(text.contains("MODEL INFORMATION"));
        assert!(text.contains("0: face"));
        assert!(text.contains("Variant: YOLOv8n"));
        assert!(text.contains("imgsz: 640"));
    }

    #[test]
    fn test_parse_class_names_formats() {
        let json = parse_class_names(r#"{"0": "face"}"#);
        assert_eq!(json.get(&0).map(String::as_str), Some("face"));

        let list = parse_class_names(r#"["face", "hand"]"#);
        assert_eq!(list.get(&1).map(String::as_str), Some("hand"));

        let python = parse_class_names("{0: 'face'}");
        assert_eq!(python.get(&0).map(String::as_str), Some("face"));

        assert!(parse_class_names("garbage").is_empty());
    }

    #[test]
    fn test_report_rejects_garbage() {
        assert!(ModelReport::from_bytes("mem", b"nope").is_err());
    }

    #[test]
    fn test_report_missing_file() {
        let err = ModelReport::from_file("/nonexistent/model.safetensors")
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("Failed to read model file"));
    }
}

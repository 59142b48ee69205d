use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// 资产 ID 到标注信息的映射
pub type Annotations = HashMap<String, Value>;

/// 读取标注文件，文件名以 `.gz` 结尾时按 gzip 解压
pub fn load_annotations(path: impl AsRef<Path>) -> Result<Annotations> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    let reader: Box<dyn Read> = match path.extension() {
        Some(ext) if ext == "gz" => Box::new(GzDecoder::new(file)),
        _ => Box::new(file),
    };
    serde_json::from_reader(BufReader::new(reader))
        .map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// 资产包围盒尺寸，单位为米
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// 升序排列的三个维度，丢弃轴向信息
    pub fn sorted(&self) -> [f32; 3] {
        let mut dims = [self.x, self.y, self.z];
        dims.sort_by(f32::total_cmp);
        dims
    }

    /// 从标注中提取包围盒
    ///
    /// `assetMetadata.boundingBox` 有三种写法：直接给出 `x/y/z`，放在 `size` 下，
    /// 或者给出 `min/max` 两个角点。
    pub fn from_annotation(annotation: &Value) -> Option<Self> {
        let bbox = annotation.get("assetMetadata")?.get("boundingBox")?;
        if let Some(dims) = xyz(bbox) {
            return Some(dims);
        }
        if let Some(dims) = bbox.get("size").and_then(xyz) {
            return Some(dims);
        }
        let min = xyz(bbox.get("min")?)?;
        let max = xyz(bbox.get("max")?)?;
        Some(Self::new(max.x - min.x, max.y - min.y, max.z - min.z))
    }
}

fn xyz(value: &Value) -> Option<BoundingBox> {
    let axis = |k: &str| value.get(k).and_then(Value::as_f64).map(|v| v as f32);
    Some(BoundingBox::new(axis("x")?, axis("y")?, axis("z")?))
}

/// 标注中的类别名
pub fn category(annotation: &Value) -> Option<&str> {
    annotation.get("category").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_bbox_plain() {
        let v = json!({"assetMetadata": {"boundingBox": {"x": 1.0, "y": 0.5, "z": 2.0}}});
        assert_eq!(BoundingBox::from_annotation(&v), Some(BoundingBox::new(1.0, 0.5, 2.0)));
    }

    #[test]
    fn test_bbox_size() {
        let v = json!({"assetMetadata": {"boundingBox": {"size": {"x": 0.3, "y": 0.4, "z": 0.5}}}});
        assert_eq!(BoundingBox::from_annotation(&v), Some(BoundingBox::new(0.3, 0.4, 0.5)));
    }

    #[test]
    fn test_bbox_min_max() {
        let v = json!({"assetMetadata": {"boundingBox": {
            "min": {"x": -0.5, "y": 0.0, "z": -0.25},
            "max": {"x": 0.5, "y": 2.0, "z": 0.25},
        }}});
        assert_eq!(BoundingBox::from_annotation(&v), Some(BoundingBox::new(1.0, 2.0, 0.5)));
    }

    #[test]
    fn test_bbox_missing() {
        assert_eq!(BoundingBox::from_annotation(&json!({"category": "chair"})), None);
        let v = json!({"assetMetadata": {"boundingBox": {"x": 1.0}}});
        assert_eq!(BoundingBox::from_annotation(&v), None);
    }

    #[test]
    fn test_bbox_sorted() {
        assert_eq!(BoundingBox::new(1.0, 0.3, 0.5).sorted(), [0.3, 0.5, 1.0]);
    }

    #[test]
    fn test_load_gz_and_plain() {
        let dir = TempDir::new().unwrap();
        let data = json!({"a": {"category": "chair"}, "b": {"category": "bed"}});

        let plain = dir.path().join("annotations.json");
        std::fs::write(&plain, data.to_string()).unwrap();

        let gz = dir.path().join("annotations.json.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(data.to_string().as_bytes()).unwrap();
        encoder.finish().unwrap();

        for path in [plain, gz] {
            let annotations = load_annotations(&path).unwrap();
            assert_eq!(annotations.len(), 2);
            assert_eq!(category(&annotations["b"]), Some("bed"));
        }
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let result = load_annotations(dir.path().join("nope.json.gz"));
        assert!(matches!(result, Err(Error::MissingFile(_))));
    }
}

use indicatif::ProgressStyle;
use ndarray::{Array, Axis, Dimension};

/// 单位化时范数的下限，避免零向量除零
const NORM_EPS: f32 = 1e-12;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({per_sec}, {eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-")
}

/// 沿指定轴对每条向量做 L2 单位化
pub fn l2_normalize_lanes<D: Dimension>(array: &mut Array<f32, D>, axis: Axis) {
    for mut lane in array.lanes_mut(axis) {
        let norm = lane.iter().map(|v| v * v).sum::<f32>().sqrt().max(NORM_EPS);
        lane.mapv_inplace(|v| v / norm);
    }
}

/// 解析 `X,Y,Z` 格式的尺寸
pub fn parse_size(s: &str) -> anyhow::Result<[f32; 3]> {
    let parts = s.split(',').map(|p| p.trim().parse::<f32>()).collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        &[x, y, z] => check_size([x, y, z]),
        _ => Err(anyhow::anyhow!("无效的尺寸: {}，格式应为 X,Y,Z 且均为正数", s)),
    }
}

/// 检查尺寸的三个维度都是有限正数
pub fn check_size(size: [f32; 3]) -> anyhow::Result<[f32; 3]> {
    if size.iter().all(|v| v.is_finite() && *v > 0.) {
        Ok(size)
    } else {
        Err(anyhow::anyhow!("无效的尺寸: {:?}，格式应为 X,Y,Z 且均为正数", size))
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// 资产文件清单，用于检查开放目录中的资产是否真实存在
pub trait AssetInventory: Sync {
    fn contains(&self, id: &str) -> bool;
}

/// 磁盘上的资产目录，资产文件位于 `<root>/<id>/<id>.<extension>`
#[derive(Debug, Clone)]
pub struct AssetsDir {
    root: PathBuf,
    extension: String,
}

impl AssetsDir {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { root: root.into(), extension: extension.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 返回资产文件路径
    pub fn asset_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join(format!("{}.{}", id, self.extension))
    }
}

impl AssetInventory for AssetsDir {
    fn contains(&self, id: &str) -> bool {
        self.asset_path(id).is_file()
    }
}

impl AssetInventory for HashSet<String> {
    fn contains(&self, id: &str) -> bool {
        HashSet::contains(self, id)
    }
}

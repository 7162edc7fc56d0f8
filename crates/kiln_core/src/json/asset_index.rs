use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Logical resource name to content hash.
///
/// Objects are stored by hash at `objects/<first two hex chars>/<hash>`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
    /// Pre-1.7 layout: objects are also copied
    /// under their logical names into `assets/virtual/<id>`.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// Pre-1.6 layout, same handling as `virtual`.
    #[serde(default)]
    pub map_to_resources: bool,
}

impl AssetIndex {
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.is_virtual || self.map_to_resources
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `<hh>/<hash>`, relative to the objects directory
    /// and to the resources server.
    #[must_use]
    pub fn object_path(&self) -> String {
        let prefix = self.hash.get(0..2).unwrap_or(&self.hash);
        format!("{prefix}/{}", self.hash)
    }
}

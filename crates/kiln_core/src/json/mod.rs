pub mod asset_index;
pub mod descriptor;
pub mod manifest;
pub mod version;

pub use asset_index::{AssetIndex, AssetObject};
pub use descriptor::{
    Artifact, AssetIndexRef, Coordinate, LibraryRef, LoggingRef, MainJar, VersionDescriptor,
};
pub use manifest::{Manifest, ManifestVersion};
pub use version::{ArgumentTemplate, ArgumentValue, VersionJson};

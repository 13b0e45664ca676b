use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Texture,
    Audio,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Model => "model",
            AssetKind::Texture => "texture",
            AssetKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Model {
        url: String,
    },
    Texture {
        src: String,
        version: u32,
        content_type: String,
    },
    Audio {
        url: String,
    },
}

impl AssetSource {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetSource::Model { .. } => AssetKind::Model,
            AssetSource::Texture { .. } => AssetKind::Texture,
            AssetSource::Audio { .. } => AssetKind::Audio,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            AssetSource::Model { url } | AssetSource::Audio { url } => url,
            AssetSource::Texture { src, .. } => src,
        }
    }
}

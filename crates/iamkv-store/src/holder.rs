use serde::{Deserialize, Serialize};

/// The two storage tiers, each backed by its own kind of holder object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderKind {
    /// Smaller tier. Every stored record has a primary holder.
    Primary,
    /// Larger tier, only used when a value overflows the primary tier.
    /// Creating one requires a trust document.
    Secondary,
}

impl HolderKind {
    /// Whether the backing service demands a trust document on creation.
    pub fn requires_trust_document(&self) -> bool {
        matches!(self, Self::Secondary)
    }
}

impl std::fmt::Display for HolderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Address of one holder and the document slot on it that carries a chunk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HolderRef {
    /// Which tier this holder belongs to.
    pub kind: HolderKind,
    /// Holder name as known to the backing service (prefix + key).
    pub name: String,
    /// Name of the document slot on the holder.
    pub document: String,
}

impl HolderRef {
    pub fn new(kind: HolderKind, name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            document: document.into(),
        }
    }
}

impl std::fmt::Display for HolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} holder {}/{}", self.kind, self.name, self.document)
    }
}

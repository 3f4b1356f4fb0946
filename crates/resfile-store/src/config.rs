//! Configuration for opening containers

use binrw::Endian;
use serde::{Deserialize, Serialize};

/// How the byte order of a container is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndianMode {
    /// Detect from the record framing, falling back to big-endian
    #[default]
    Auto,
    /// Big-endian, the order simulators write
    Big,
    /// Little-endian
    Little,
}

impl EndianMode {
    /// Fixed byte order, or `None` when it must be detected
    pub fn fixed(self) -> Option<Endian> {
        match self {
            Self::Auto => None,
            Self::Big => Some(Endian::Big),
            Self::Little => Some(Endian::Little),
        }
    }
}

/// Configuration for a container session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Byte order selection
    pub endian: EndianMode,

    /// Formatted (ASCII) variant; `None` detects it from the file
    pub formatted: Option<bool>,

    /// Open the file for writing as well as reading
    pub writable: bool,

    /// Stop the index scan at the first damaged keyword instead of failing
    pub tolerate_truncation: bool,
}

impl ContainerConfig {
    /// Configuration for a writable session
    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Default::default()
        }
    }

    /// Set the byte order selection
    #[must_use]
    pub const fn with_endian(mut self, endian: EndianMode) -> Self {
        self.endian = endian;
        self
    }

    /// Force or detect the formatted variant
    #[must_use]
    pub const fn with_formatted(mut self, formatted: Option<bool>) -> Self {
        self.formatted = formatted;
        self
    }

    /// Enable or disable writing
    #[must_use]
    pub const fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Enable or disable tolerant index scans
    #[must_use]
    pub const fn with_tolerate_truncation(mut self, tolerate: bool) -> Self {
        self.tolerate_truncation = tolerate;
        self
    }
}

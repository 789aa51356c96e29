pub mod errors;
pub mod mesh;

pub use errors::{DotError, DotErrorCategory, DotResult};
pub use mesh::{
    ChromophoreModel, ConstantAbsorption, LinkRow, LinkTable, MelaninField, MeshKind, Optode,
    RegionAbsorption, ScatteringModel, SpectralMesh,
};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SolverKind {
    Direct,
    CpuIterative,
    GpuIterative,
}

impl SolverKind {
    pub const ALL: [SolverKind; 3] = [Self::Direct, Self::CpuIterative, Self::GpuIterative];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "backslash",
            Self::CpuIterative => "BiCGStab_CPU",
            Self::GpuIterative => "BiCGStab_GPU",
        }
    }

    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Direct => &["backslash", "direct"],
            Self::CpuIterative => &["bicgstab_cpu", "cpu"],
            Self::GpuIterative => &["bicgstab_gpu", "gpu"],
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let normalized = identifier.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.aliases().contains(&normalized.as_str()))
    }

    pub const fn is_iterative(self) -> bool {
        !matches!(self, Self::Direct)
    }
}

impl Display for SolverKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// What the forward loop does when one wavelength fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

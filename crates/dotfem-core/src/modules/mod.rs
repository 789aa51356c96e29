pub mod assembly;
pub mod backends;
pub mod devices;
pub mod forward;
pub mod optics;
pub mod optodes;
pub mod resolver;
pub mod results;
pub mod serialization;

#[cfg(test)]
mod fixtures;
mod traits;

pub use assembly::DiffusionAssembler;
pub use backends::{
    ColumnDiagnostics, CpuIterativeBackend, DirectBackend, FieldSolution, GpuIterativeBackend,
    backend_for,
};
pub use devices::{ComputeDevice, DeviceDescriptor, DeviceRegistry, DeviceSlot, HostDevice};
pub use forward::ForwardEngine;
pub use optics::{OpticalProperties, PowerLawMelanin, WavelengthSnapshot, compose_optical_properties};
pub use optodes::NearestNodeOptodes;
pub use resolver::{ForwardOptions, ResolvedRun, default_solver, resolve, resolve_solver};
pub use results::{
    ConvergenceInfo, ForwardRun, ResultRecord, WavelengthStatus, amplitude, phase_degrees,
};
pub use serialization::{ForwardReport, render_summary, write_report};
pub use traits::{BoundaryExtractor, MelaninModel, SolveBackend, SourceBuilder, SystemAssembler};

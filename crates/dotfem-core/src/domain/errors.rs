use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DotResult<T> = Result<T, DotError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DotErrorCategory {
    InvalidArgument,
    UnknownSolver,
    AssemblyFailure,
    SolveFailure,
    DeviceUnavailable,
    IoSystem,
}

impl DotErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InvalidArgument => 2,
            Self::UnknownSolver => 3,
            Self::AssemblyFailure => 4,
            Self::SolveFailure => 5,
            Self::DeviceUnavailable => 6,
            Self::IoSystem => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::UnknownSolver => "UnknownSolver",
            Self::AssemblyFailure => "AssemblyFailure",
            Self::SolveFailure => "SolveFailure",
            Self::DeviceUnavailable => "DeviceUnavailable",
            Self::IoSystem => "IoSystem",
        }
    }
}

impl Display for DotErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotError {
    category: DotErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DotError {
    pub fn new(
        category: DotErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn invalid_argument(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::InvalidArgument, placeholder, message)
    }

    pub fn unknown_solver(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::UnknownSolver, placeholder, message)
    }

    pub fn assembly(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::AssemblyFailure, placeholder, message)
    }

    pub fn solve(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::SolveFailure, placeholder, message)
    }

    pub fn device_unavailable(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::DeviceUnavailable, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DotErrorCategory::IoSystem, placeholder, message)
    }

    pub const fn category(&self) -> DotErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for DotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for DotError {}

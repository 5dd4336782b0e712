use std::fmt;
use std::io;

use crate::select::SubsystemKind;

#[derive(Debug)]
pub enum Error {
    /// A PLL cannot produce the requested outputs, or the device ran out of PLLs
    UnsatisfiableFrequencyPlan(String),

    /// More than one member of the named exclusive option group was set
    ConflictingFeatureFlags(&'static str),

    /// Board variant is not one of the supported boards
    UnknownBoardVariant(String),

    /// A peripheral needs a clock domain that was not resolved
    MissingPrerequisiteDomain { required_by: String, domain: &'static str },

    /// A name was registered twice. Plan construction should make this impossible.
    DuplicateRegistration(String),

    /// No factory is registered for a selected subsystem kind
    FactoryUnavailable(SubsystemKind),

    /// A factory refused to instantiate its subsystem
    FactoryFailed(SubsystemKind, String),

    /// An option held a value that can't be used on this board
    InvalidOption { option: &'static str, value: String },

    /// The platform has no resource with this name and number
    MissingResource(String, u32),

    /// The resource was already handed out to another subsystem
    ResourceInUse(String, u32),

    /// A memory region would share addresses with another region or with the CSR space
    RegionOverlap { name: String, other: String },

    /// A `csr.csv` does not describe the platform it was written from
    CsrMapMismatch(String),

    Io(io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl Error {
    pub(crate) fn invalid(option: &'static str, value: impl fmt::Display) -> Error {
        Error::InvalidOption { option, value: value.to_string() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            UnsatisfiableFrequencyPlan(why) => write!(f, "unsatisfiable frequency plan: {}", why),
            ConflictingFeatureFlags(group) => write!(f, "conflicting options in group \"{}\"", group),
            UnknownBoardVariant(board) => write!(f, "unknown board variant \"{}\" (expected i5 or i9)", board),
            MissingPrerequisiteDomain { required_by, domain } => {
                write!(f, "{} requires clock domain \"{}\", which was not resolved", required_by, domain)
            }
            DuplicateRegistration(name) => write!(f, "\"{}\" was registered twice", name),
            FactoryUnavailable(kind) => write!(f, "no factory registered for {:?}", kind),
            FactoryFailed(kind, why) => write!(f, "factory for {:?} failed: {}", kind, why),
            InvalidOption { option, value } => write!(f, "invalid value \"{}\" for option {}", value, option),
            MissingResource(name, number) => write!(f, "platform has no resource {}:{}", name, number),
            ResourceInUse(name, number) => write!(f, "resource {}:{} was already requested", name, number),
            RegionOverlap { name, other } => write!(f, "memory region {} overlaps {}", name, other),
            CsrMapMismatch(what) => write!(f, "csr.csv does not match the platform: {}", what),
            Io(e) => write!(f, "I/O error: {}", e),
            Json(e) => write!(f, "JSON error: {}", e),
            Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error { Error::Io(e) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error { Error::Json(e) }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Error { Error::Csv(e) }
}

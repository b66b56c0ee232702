use thiserror::Error;

use crate::ir::InstId;

macro_rules! config_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Config {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Config {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only two families of failures surface as `Err`: configuration contradictions detected before
/// any mutation is attempted, and misuse of the program model (stale handles, edits that would
/// leave dangling uses). Per-position problems during a mutation run (out of range positions,
/// already mutated positions, mismatched primitive families, ...) are never errors; they are
/// reported as warnings on the [`crate::mutation::DiagnosticLog`] and the offending mutation is
/// skipped.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::Config`] - Contradictory or missing operator parameters
///
/// ## Program Model Errors
/// - [`Error::StaleHandle`] - An instruction handle outlived its instruction
/// - [`Error::UnknownFunction`] - Function index does not exist
/// - [`Error::UnknownBlock`] - Block index does not exist in the function
/// - [`Error::DifferentFunctions`] - Distance query across two functions
/// - [`Error::HasUses`] - Erasing an instruction whose result is still consumed
/// - [`Error::NotACallSite`] - Call-site view requested for a non-call instruction
/// - [`Error::Malformed`] - Structurally invalid program model
///
/// # Examples
///
/// ```rust
/// use syncmut::{config::MutexConfig, Error};
///
/// let config = MutexConfig::remove(vec![0, 0, 0]);
/// match config.validate() {
///     Err(Error::Config { message, .. }) => eprintln!("bad configuration: {message}"),
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(()) => {}
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The operator configuration is contradictory or incomplete.
    ///
    /// This is the only fatal error class of a mutation run. It is raised before any
    /// mutation is attempted, so the program model is untouched when it is returned.
    ///
    /// # Fields
    ///
    /// * `message` - Which flags conflict or which list is missing
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Configuration - {file}:{line}: {message}")]
    Config {
        /// The message to be printed for the Config error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The program model is structurally invalid.
    ///
    /// Raised when an edit would produce an instruction without a parent block, or a
    /// block that is referenced but missing.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An instruction handle refers to an instruction that has been erased.
    ///
    /// Handles carry the generation of the arena slot they were created for. Once the
    /// instruction is erased the slot generation moves on and every old handle fails
    /// with this error.
    #[error("Stale instruction handle {0}")]
    StaleHandle(InstId),

    /// The function index does not exist in the module.
    #[error("Unknown function index {0}")]
    UnknownFunction(usize),

    /// The block index does not exist in the function.
    #[error("Unknown block {block} in function {function}")]
    UnknownBlock {
        /// Function index
        function: usize,
        /// Block index within the function
        block: usize,
    },

    /// A distance was requested between instructions of two different functions.
    #[error("Instructions {0} and {1} are in different functions")]
    DifferentFunctions(InstId, InstId),

    /// The instruction still has uses and cannot be erased.
    #[error("Instruction {id} still has {uses} use(s)")]
    HasUses {
        /// The instruction that was about to be erased
        id: InstId,
        /// The number of remaining uses
        uses: usize,
    },

    /// A call-site view was requested for an instruction that is not a call or invoke.
    #[error("Instruction {0} is not a call site")]
    NotACallSite(InstId),
}

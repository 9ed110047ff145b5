use thiserror::Error;

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

/// The generic Error type, which provides coverage for all errors this library can
/// potentially return.
///
/// Errors are only produced at the construction boundary of the crate: parsing
/// textual IR, building and verifying functions, and running passes. Once a
/// [`Function`](crate::ir::Function) has been verified, the analyses treat any
/// structural inconsistency they discover as an internal bug and panic with a
/// diagnostic instead of returning an error.
///
/// # Error Categories
///
/// ## IR Construction Errors
/// - [`Error::Malformed`] - Structurally invalid IR (missing terminator, bad operand shape)
/// - [`Error::Parse`] - Syntax error in the textual IR format
/// - [`Error::UnknownLabel`] - A label operand names a block that does not exist
/// - [`Error::DuplicateLabel`] - Two blocks share a label
/// - [`Error::UnknownOpcode`] - A mnemonic that is not an [`Opcode`](crate::ir::Opcode)
///
/// ## Pipeline Errors
/// - [`Error::PassFailed`] - A pass reported a failure it could not recover from
/// - [`Error::GraphError`] - Invalid use of the generic graph utilities
///
/// # Examples
///
/// ```rust,ignore
/// use evmopt::{ir::parse_function, Error};
///
/// match parse_function("function f {\nentry:\n    %x = frob 1\n}") {
///     Err(Error::UnknownOpcode(name)) => eprintln!("no such opcode: {name}"),
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR is structurally invalid.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The textual IR could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number in the input
        line: usize,
        /// What was expected or found
        message: String,
    },

    /// A label operand references a block that does not exist in the function.
    #[error("Unknown label - @{0}")]
    UnknownLabel(String),

    /// Two blocks in one function were given the same label.
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),

    /// The mnemonic does not name a known opcode.
    #[error("Unknown opcode - {0}")]
    UnknownOpcode(String),

    /// A pass failed while transforming a function.
    #[error("Pass '{pass}' failed: {message}")]
    PassFailed {
        /// Name of the failing pass
        pass: String,
        /// Failure description
        message: String,
    },

    /// Invalid operation on a generic graph.
    #[error("{0}")]
    GraphError(String),

    /// Generic error for miscellaneous cases.
    #[error("{0}")]
    Error(String),
}

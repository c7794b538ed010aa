use std::{error, fmt};

/// Interpreter errors and top-level control transfers.
///
/// Every variant below the control group unwinds to the read–eval–print
/// loop, which resets the binding state and prints the `Display` text after
/// a `::` prefix. There is no local recovery anywhere else.
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed input
    Syntax(&'static str),
    /// An ordinary atom with an undefined value was evaluated
    Undefined(String),
    /// Head of an application is not a function or special form
    NotCallable,
    /// Wrong number of actuals for a fixed-arity built-in
    Arity { name: &'static str, excess: bool },
    /// Illegal argument for a built-in, message per operator
    Argument(&'static str),
    /// Arithmetic over a non-number
    Type { name: &'static str },
    AtomTableFull,
    NumberTableFull,
    /// List area exhausted even after collection
    OutOfSpace,
    /// `@file` stream switch failed
    CannotOpen(String),
    /// Unreachable dispatch case
    Internal(&'static str),
    /// `!TRACE` pragma: return to the prompt without a message
    TopLevel,
    /// EXIT built-in
    Exit,
    /// End of the root input stream
    Eof,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(msg) => f.write_str(msg),
            Self::Undefined(name) => write!(f, "{name} is undefined"),
            Self::NotCallable => f.write_str("invalid function or special form"),
            Self::Arity { name, excess: false } => {
                write!(f, "{name} application: not enough arguments")
            }
            Self::Arity { name, excess: true } => {
                write!(f, "{name} application: too many arguments")
            }
            Self::Argument(msg) => f.write_str(msg),
            Self::Type { name } => write!(f, "{name} application: argument is not a number"),
            Self::AtomTableFull => f.write_str("atom table is full"),
            Self::NumberTableFull => f.write_str("the number table is full"),
            Self::OutOfSpace => f.write_str("out of space"),
            Self::CannotOpen(name) => write!(f, "cannot open {name}"),
            Self::Internal(msg) => write!(f, "dryrot: {msg}"),
            Self::TopLevel => f.write_str("top level"),
            Self::Exit => f.write_str("exit"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

impl error::Error for Error {}

#[test]
fn test_messages() {
    assert_eq!(
        Error::Argument("illegal CAR argument").to_string(),
        "illegal CAR argument"
    );
    assert_eq!(Error::Undefined("X".into()).to_string(), "X is undefined");
    assert_eq!(
        Error::Arity { name: "CONS", excess: false }.to_string(),
        "CONS application: not enough arguments"
    );
    assert_eq!(
        Error::Type { name: "PLUS" }.to_string(),
        "PLUS application: argument is not a number"
    );
    assert_eq!(Error::NumberTableFull.to_string(), "the number table is full");
}

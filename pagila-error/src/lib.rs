use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::{env, io};

#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        if env::var("PAGILA_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}", msg.into())
        } else {
            ErrString(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PagilaError {
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(ErrString),
    #[error("cancelled: {0}")]
    Cancelled(ErrString),
    #[error("not found: {0}")]
    ColumnNotFound(ErrString),
    #[error("{0}")]
    ComputeError(ErrString),
    #[error("failed to fetch: {0}")]
    FetchError(ErrString),
    #[error("invalid configuration: {0}")]
    InvalidConfig(ErrString),
    #[error("invalid operation: {0}")]
    InvalidOperation(ErrString),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    OutOfBounds(ErrString),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(ErrString),
    #[error("lengths don't match: {0}")]
    ShapeMismatch(ErrString),
    #[error("timed out: {0}")]
    Timeout(ErrString),
}

pub type PagilaResult<T> = Result<T, PagilaError>;

impl PagilaError {
    pub fn wrap_msg(&self, func: &dyn Fn(&str) -> String) -> Self {
        use PagilaError::*;
        match self {
            AmbiguousColumn(msg) => AmbiguousColumn(func(msg).into()),
            Cancelled(msg) => Cancelled(func(msg).into()),
            ColumnNotFound(msg) => ColumnNotFound(func(msg).into()),
            ComputeError(msg) => ComputeError(func(msg).into()),
            FetchError(msg) => FetchError(func(msg).into()),
            InvalidConfig(msg) => InvalidConfig(func(msg).into()),
            InvalidOperation(msg) => InvalidOperation(func(msg).into()),
            Io(err) => ComputeError(func(&format!("IO: {err}")).into()),
            OutOfBounds(msg) => OutOfBounds(func(msg).into()),
            SchemaMismatch(msg) => SchemaMismatch(func(msg).into()),
            ShapeMismatch(msg) => ShapeMismatch(func(msg).into()),
            Timeout(msg) => Timeout(func(msg).into()),
        }
    }

    /// Errors that must abort the whole run instead of a single report.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PagilaError::FetchError(_)
                | PagilaError::Cancelled(_)
                | PagilaError::Timeout(_)
                | PagilaError::InvalidConfig(_)
        )
    }
}

pub fn map_err<E: Error>(error: E) -> PagilaError {
    PagilaError::ComputeError(format!("{error}").into())
}

#[macro_export]
macro_rules! pagila_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use(
            $crate::PagilaError::$variant(format!($fmt, $($arg),*).into())
        )
    };
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::PagilaError::$variant($err.into())
        )
    };
    (op = $op:expr, got = $arg:expr, expected = $expected:expr) => {
        $crate::pagila_err!(
            InvalidOperation: "{} operation not supported for dtype `{}` (expected: {})",
            $op, $arg, $expected
        )
    };
    (op = $op:expr, $arg:expr) => {
        $crate::pagila_err!(
            InvalidOperation: "{} operation not supported for dtype `{}`", $op, $arg
        )
    };
    (op = $op:expr, $lhs:expr, $rhs:expr) => {
        $crate::pagila_err!(
            InvalidOperation: "{} operation not supported for dtypes `{}` and `{}`", $op, $lhs, $rhs
        )
    };
    (duplicate = $name:expr) => {
        $crate::pagila_err!(InvalidOperation: "column with name '{}' has more than one occurrences", $name)
    };
    (oob = $idx:expr, $len:expr) => {
        $crate::pagila_err!(OutOfBounds: "index {} is out of bounds for sequence of length {}", $idx, $len)
    };
    (agg_len = $agg_len:expr, $groups_len:expr) => {
        $crate::pagila_err!(
            ComputeError:
            "returned aggregation is of different length: {} than the groups length: {}",
            $agg_len, $groups_len
        )
    };
}

#[macro_export]
macro_rules! pagila_bail {
    ($($tt:tt)+) => {
        return Err($crate::pagila_err!($($tt)+))
    };
}

#[macro_export]
macro_rules! pagila_ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond {
            $crate::pagila_bail!($($tt)+);
        }
    };
}

// Not public, referenced by macros only.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline(always)]
    #[cold]
    #[must_use]
    pub fn must_use(error: crate::PagilaError) -> crate::PagilaError {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails(len: usize) -> PagilaResult<()> {
        pagila_ensure!(len < 3, oob = len, 3);
        Ok(())
    }

    #[test]
    fn test_ensure_bails_with_variant() {
        assert!(fails(1).is_ok());
        let err = fails(5).unwrap_err();
        assert!(matches!(err, PagilaError::OutOfBounds(_)));
        assert_eq!(
            err.to_string(),
            "index 5 is out of bounds for sequence of length 3"
        );
    }

    #[test]
    fn test_wrap_msg_keeps_variant() {
        let err = pagila_err!(ColumnNotFound: "film.title");
        let wrapped = err.wrap_msg(&|msg| format!("report 4: {msg}"));
        assert!(matches!(wrapped, PagilaError::ColumnNotFound(_)));
        assert_eq!(wrapped.to_string(), "not found: report 4: film.title");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(pagila_err!(FetchError: "connection refused").is_fatal());
        assert!(!pagila_err!(ComputeError: "boom").is_fatal());
    }
}

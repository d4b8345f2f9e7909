use serde::Serialize;
use serde_json::Value;
use std::backtrace::BacktraceStatus;
use std::error::Error as StdError;
use tracing::warn;

/// Maximum number of cause links walked when ingesting or flattening a
/// chain. Links beyond the cap are dropped with a warning.
pub const MAX_CAUSE_DEPTH: usize = 10;

/// Prefix prepended to the message when a non-error value is logged.
pub const NON_ERROR_PREFIX: &str = "Non error thrown: ";

/// Anything a caller hands to `Logger::error` / `Logger::fatal`.
///
/// Errors keep their message, optional stack text, and an optional cause
/// chain; everything else is carried as an opaque JSON value. [`flatten`]
/// collapses either form into the message/stack pair the backend stores.
///
/// [`flatten`]: Thrown::flatten
#[derive(Debug, Clone, PartialEq)]
pub enum Thrown {
    Error {
        message: String,
        stack: Option<String>,
        cause: Option<Box<Thrown>>,
    },
    Value(Value),
}

/// The flattened form of a [`Thrown`]: one message, at most one stack text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrownParts {
    pub message: String,
    pub stack: Option<String>,
}

impl Thrown {
    /// Leaf error with no stack and no cause.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Attaches stack text to an `Error` variant. No-op for `Value`.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        if let Self::Error { stack: slot, .. } = &mut self {
            *slot = Some(stack.into());
        }
        self
    }

    /// Attaches a cause to an `Error` variant. No-op for `Value`.
    #[must_use]
    pub fn caused_by(mut self, cause: Thrown) -> Self {
        if let Self::Error { cause: slot, .. } = &mut self {
            *slot = Some(Box::new(cause));
        }
        self
    }

    /// Wraps an arbitrary serializable value. Values that fail to serialize
    /// degrade to JSON `null` rather than erroring out of a logging call.
    #[must_use]
    pub fn opaque<T: Serialize>(value: T) -> Self {
        Self::Value(serde_json::to_value(value).unwrap_or(Value::Null))
    }

    /// Ingests a standard error, walking `source()` into the cause chain.
    ///
    /// The walk stops at [`MAX_CAUSE_DEPTH`] links, which also bounds the
    /// pathological case of a cyclic `source()` chain.
    #[must_use]
    pub fn from_std(err: &(dyn StdError + 'static)) -> Self {
        fn build(err: &(dyn StdError + 'static), depth: usize) -> Thrown {
            let cause = match err.source() {
                Some(source) if depth < MAX_CAUSE_DEPTH => {
                    Some(Box::new(build(source, depth + 1)))
                }
                Some(_) => {
                    warn!(
                        cap = MAX_CAUSE_DEPTH,
                        "error source chain exceeds cap; dropping deeper causes"
                    );
                    None
                }
                None => None,
            };
            Thrown::Error {
                message: err.to_string(),
                stack: None,
                cause,
            }
        }
        build(err, 0)
    }

    /// Ingests an `anyhow` error: message from its display form, causes from
    /// `chain()`, stack from the captured backtrace when one exists.
    ///
    /// The cause walk stops at [`MAX_CAUSE_DEPTH`] links, which also bounds
    /// the pathological case of a cyclic `source()` chain.
    #[must_use]
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let backtrace = err.backtrace();
        let stack = (backtrace.status() == BacktraceStatus::Captured)
            .then(|| backtrace.to_string());

        let deeper: Vec<String> = err
            .chain()
            .skip(1)
            .take(MAX_CAUSE_DEPTH)
            .map(ToString::to_string)
            .collect();
        // A cyclic chain never runs out, so look one link past the cap
        // instead of counting to the end.
        if err.chain().skip(1).nth(MAX_CAUSE_DEPTH).is_some() {
            warn!(
                cap = MAX_CAUSE_DEPTH,
                "error context chain exceeds cap; dropping deeper causes"
            );
        }

        let mut cause = None;
        for message in deeper.into_iter().rev() {
            cause = Some(Box::new(Thrown::Error {
                message,
                stack: None,
                cause,
            }));
        }
        Thrown::Error {
            message: err.to_string(),
            stack,
            cause,
        }
    }

    /// Collapses the value into the message/stack pair that gets stored.
    ///
    /// For errors: walks the cause chain while each link is an `Error`,
    /// appending `" | Cause: <msg>"` to the message for every link and a
    /// `"Caused by: <stack>"` line to the stack for every link carrying
    /// stack text. A `Value` cause or the depth cap ends the walk. For
    /// values: the fixed [`NON_ERROR_PREFIX`] plus the compact JSON form.
    #[must_use]
    pub fn flatten(&self) -> ThrownParts {
        match self {
            Self::Value(value) => ThrownParts {
                message: format!("{NON_ERROR_PREFIX}{value}"),
                stack: None,
            },
            Self::Error {
                message,
                stack,
                cause,
            } => {
                let mut message = message.clone();
                let mut stack = stack.clone();
                let mut link = cause.as_deref();
                let mut depth = 0;
                while let Some(Self::Error {
                    message: link_message,
                    stack: link_stack,
                    cause: next,
                }) = link
                {
                    if depth >= MAX_CAUSE_DEPTH {
                        warn!(
                            cap = MAX_CAUSE_DEPTH,
                            "cause chain exceeds cap; remainder omitted from record"
                        );
                        break;
                    }
                    depth += 1;
                    message.push_str(" | Cause: ");
                    message.push_str(link_message);
                    if let Some(link_stack) = link_stack {
                        stack = Some(match stack {
                            Some(prev) => format!("{prev}\nCaused by: {link_stack}"),
                            None => format!("Caused by: {link_stack}"),
                        });
                    }
                    link = next.as_deref();
                }
                ThrownParts { message, stack }
            }
        }
    }
}

//! Per-invocation state handed to registered procedures

use std::any::Any;

use serde_json::Value;

/// Opaque, owned argument bound to a method at registration time. The
/// registry drops it when the method is replaced, removed, or torn down.
pub type UserArg = Box<dyn Any + Send + Sync>;

/// A registered procedure. It returns its result; failures are reported
/// through [`CallContext::set_error`], in which case the returned value is
/// dropped and never surfaced.
pub type Procedure =
    dyn Fn(&mut CallContext<'_>, Option<&Value>, Option<&Value>) -> Value + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsKind {
    None,
    Array,
    Object,
}

impl ParamsKind {
    pub fn of(params: Option<&Value>) -> Self {
        match params {
            None => Self::None,
            Some(Value::Array(_)) => Self::Array,
            Some(_) => Self::Object,
        }
    }
}

#[derive(Debug)]
pub struct CallContext<'a> {
    arg: Option<&'a (dyn Any + Send + Sync)>,
    params_kind: ParamsKind,
    error_code: i64,
    error_message: Option<String>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(arg: Option<&'a (dyn Any + Send + Sync)>, params_kind: ParamsKind) -> Self {
        Self {
            arg,
            params_kind,
            error_code: 0,
            error_message: None,
        }
    }

    pub fn arg<T: Any>(&self) -> Option<&'a T> {
        self.arg.and_then(|arg| arg.downcast_ref::<T>())
    }

    pub fn params_kind(&self) -> ParamsKind {
        self.params_kind
    }

    /// Report a failure. A code of `0` means "no error" and clears any
    /// earlier report.
    pub fn set_error(&mut self, code: i64, message: impl Into<String>) {
        self.error_code = code;
        self.error_message = (code != 0).then(|| message.into());
    }

    pub fn set_error_code(&mut self, code: i64) {
        self.error_code = code;
        self.error_message = None;
    }

    pub fn error_code(&self) -> i64 {
        self.error_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub(crate) fn take_error(&mut self) -> Option<(i64, Option<String>)> {
        if self.error_code == 0 {
            return None;
        }
        Some((self.error_code, self.error_message.take()))
    }
}

//! Scheduling directive returned by a reconcile pass.

use std::fmt;
use std::time::Duration;

/// When the host should run the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Nothing left to do until the resource changes.
    Stop,
    /// Run another pass immediately.
    RequeueNow,
    /// Run another pass after the delay.
    RequeueAfter(Duration),
}

impl Directive {
    /// True when the pass converged and nothing is scheduled.
    pub fn is_stop(&self) -> bool {
        matches!(self, Directive::Stop)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Stop => write!(f, "stop"),
            Directive::RequeueNow => write!(f, "requeue-now"),
            Directive::RequeueAfter(delay) => write!(f, "requeue-after({}s)", delay.as_secs()),
        }
    }
}

//! Recoverable failure values returned by every fallible mutation primitive.
//!
//! A `Failure` is expected control flow, not an exceptional condition: the
//! driver probes candidate edits, most of which are allowed to fail, and
//! branches on the result. Genuine engine bugs panic instead; the excursion
//! boundary converts those panics back into a `Failure` after rolling back.

use std::any::Any;

use thiserror::Error;

pub type Check = Result<(), Failure>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}", render(.message, .causes))]
pub struct Failure {
    message: String,
    causes: Vec<Failure>,
}

impl Failure {
    pub fn of(message: impl Into<String>) -> Self {
        Failure { message: message.into(), causes: Vec::new() }
    }

    /// Merge independently-discovered violations under one context message.
    /// An empty list still produces a failure carrying only the context.
    pub fn all(causes: Vec<Failure>, context: impl Into<String>) -> Self {
        Failure { message: context.into(), causes }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[Failure] {
        &self.causes
    }
}

fn render(message: &str, causes: &[Failure]) -> String {
    if causes.is_empty() {
        return message.to_string();
    }
    let mut out = message.to_string();
    for cause in causes {
        for line in render(&cause.message, &cause.causes).lines() {
            out.push_str("\n  ");
            out.push_str(line);
        }
    }
    out
}

/// Best-effort extraction of a panic payload, for the excursion boundary.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failure_renders_its_message() {
        let failure = Failure::of("bad neighbor at 12");
        assert_eq!(failure.to_string(), "bad neighbor at 12");
    }

    #[test]
    fn aggregated_failures_render_indented_causes() {
        let failure = Failure::all(
            vec![Failure::of("first"), Failure::of("second")],
            "validation found 2 problems",
        );
        assert_eq!(failure.to_string(), "validation found 2 problems\n  first\n  second");
        assert_eq!(failure.causes().len(), 2);
    }

    #[test]
    fn nested_aggregation_indents_twice() {
        let inner = Failure::all(vec![Failure::of("leaf")], "inner");
        let outer = Failure::all(vec![inner], "outer");
        assert_eq!(outer.to_string(), "outer\n  inner\n    leaf");
    }
}

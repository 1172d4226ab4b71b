// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The failure taxonomy shared by every generator.  A render either
//! returns a complete raster or one of these; nothing is retried.

use failure::Fail;

/// Everything a render call can report back to its caller.
#[derive(Debug, Fail, PartialEq)]
pub enum RenderError {
    /// A request field violates its constraint.  Recoverable by the
    /// caller supplying a corrected value.
    #[fail(display = "invalid parameter `{}`: {}", field, reason)]
    InvalidParameter {
        /// The request field at fault.
        field: &'static str,
        /// The constraint that was violated.
        reason: String,
    },

    /// The working memory of the render would exceed the configured
    /// ceiling.  Lower the resolution or the density.
    #[fail(
        display = "render needs {} bytes of working memory, the ceiling is {} bytes",
        required, ceiling
    )]
    ResourceExceeded {
        /// Bytes the render would allocate.
        required: u64,
        /// Bytes the configuration allows.
        ceiling: u64,
    },

    /// The caller's cancel token fired before the render finished.
    #[fail(display = "render cancelled")]
    Cancelled,

    /// A worker thread panicked; the partial field was discarded.
    #[fail(display = "a render worker panicked")]
    WorkerPanicked,
}

impl RenderError {
    /// Shorthand for building an `InvalidParameter`.
    pub fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        RenderError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_names_the_field() {
        let e = RenderError::invalid("horizon", "must be positive");
        assert_eq!(
            format!("{}", e),
            "invalid parameter `horizon`: must be positive"
        );
    }

    #[test]
    fn resource_exceeded_reports_both_sizes() {
        let e = RenderError::ResourceExceeded {
            required: 2048,
            ceiling: 1024,
        };
        let msg = format!("{}", e);
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}

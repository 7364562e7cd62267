//! Fail points used by fault-injection tests.
//!
//! Compiled to no-ops unless the `failpoints` feature is enabled.

use fail::fail_point;

#[cfg(feature = "failpoints")]
use crate::bail;
#[cfg(feature = "failpoints")]
use crate::error::ErrorKind;
use crate::error::StreamResult;

/// Fails building the fragment for the next row change.
pub const LISTENER_BUILD_FRAGMENT: &str = "listener.build_fragment";

/// Fails delivering the next completed event to the sink.
pub const HANDLER_DELIVER: &str = "handler.deliver";

/// Evaluates the fail point `name`, returning an injected error when it is configured to.
///
/// The fail point's parameter, when given, is appended to the error detail.
#[cfg_attr(not(feature = "failpoints"), allow(unused_variables))]
pub fn stream_fail_point(name: &str) -> StreamResult<()> {
    fail_point!(name, |parameter| {
        let kind = if name == HANDLER_DELIVER {
            ErrorKind::InjectedSinkFailure
        } else {
            ErrorKind::InjectedFragmentFailure
        };

        bail!(
            kind,
            "An error occurred in a fail point",
            format!(
                "The failpoint '{name}' returned an error{}",
                parameter.map(|p| format!(" ({p})")).unwrap_or_default()
            )
        );
    });

    Ok(())
}

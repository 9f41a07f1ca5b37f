//! Higher-order helpers that run a body under a chosen principal.

use tracing::info_span;

use crate::principal::Principal;

/// Run `body` as `principal`.
///
/// The principal is passed to the body explicitly and recorded on a tracing
/// span, so everything logged inside carries it.
pub fn run_as<T>(principal: Principal, body: impl FnOnce(&Principal) -> T) -> T {
    let span = info_span!("run_as", principal = %principal);
    let _entered = span.enter();
    body(&principal)
}

/// Run `body` as the non-interactive system principal.
pub fn run_as_system<T>(body: impl FnOnce(&Principal) -> T) -> T {
    run_as(Principal::System, body)
}

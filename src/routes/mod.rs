/// Router Module Index
///
/// Splits routing by who may reach a handler. Access to the seller area is decided
/// by the route guard middleware wrapping the whole router, not by these modules.

/// Routes open to everyone: pages, privacy policy, session endpoints.
pub mod public;

/// Routes under the protected prefix, reachable only with a seller role claim.
pub mod seller;

/// Router Module Index
///
/// Routes are split by access level. Authentication is applied as a layer on
/// the authenticated router in `create_router`, never inside the modules.

/// Routes reachable without credentials.
pub mod public;

/// Routes behind the `AuthUser` middleware.
pub mod authenticated;

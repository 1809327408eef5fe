//! Public facade crate for `tonepipe`.
//!
//! No IO and no provider-specific logic lives here: it re-exports the data model and
//! traits from `tonepipe-core`. Fetching and scoring live in `tonepipe-local`.

pub use tonepipe_core::*;

//! Type definitions for keyloft storage.

mod environments;
mod ids;
mod keys;
mod secrets;

pub use environments::*;
pub use ids::*;
pub use keys::*;
pub use secrets::*;

//! Dispatch table interception
//!
//! Both COM objects and driver function tables are contiguous arrays of call targets. The
//! layouts are declared with [`interface!`](crate::interface) and an [`Interceptor`] builds or
//! patches tables of that layout with substitutes while keeping the originals reachable.

mod interface;
mod table;

pub use interface::*;
pub use table::{DispatchTable, Interceptor, OriginalTable, Substitutes};

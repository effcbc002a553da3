//! Transport seam.
//!
//! The library builds signed requests and checks signed responses; moving
//! bytes is left to a [`Transport`] supplied by the caller.

mod traits;

pub use traits::{HttpRequest, HttpResponse, Transport};

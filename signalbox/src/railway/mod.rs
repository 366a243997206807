//! Railway infrastructure, routes and the interlocking.

pub mod infrastructure;
pub mod interlocking;
pub mod route;
pub mod topology;
pub mod trains;

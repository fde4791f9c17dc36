pub mod interpolator;
pub mod net;
pub mod render;
pub mod runtime;

pub mod bot;
pub mod constants;
pub mod food;
pub mod geometry;
pub mod math;
pub mod room;
pub mod sim;
pub mod snake;
pub mod types;

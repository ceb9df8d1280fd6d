pub mod backend;
pub mod cache;
pub mod command;
pub mod ddcutil;
pub mod monitors;
pub mod writer;
pub mod xrandr;

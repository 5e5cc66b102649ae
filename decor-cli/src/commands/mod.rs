pub mod daemon;
pub mod preview;
pub mod source;

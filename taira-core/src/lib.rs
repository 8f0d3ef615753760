pub mod header;
pub mod image;
pub mod reader;

pub use header::*;
pub use image::*;
pub use reader::*;

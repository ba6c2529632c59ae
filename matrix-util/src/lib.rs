pub mod common_io;
pub mod dmatrix_io;
pub mod dmatrix_util;
pub mod image_tile;
pub mod traits;

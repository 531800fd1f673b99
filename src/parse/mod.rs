pub mod bsp;
pub mod entities;
pub mod zip;

mod util;

pub mod demo;
pub mod hash;

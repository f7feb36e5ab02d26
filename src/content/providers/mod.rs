pub mod file;
pub mod prismic;

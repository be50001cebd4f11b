pub mod trigonometry;
pub mod transforms;
pub mod filters;

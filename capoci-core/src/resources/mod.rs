pub mod crd;
pub mod labels;

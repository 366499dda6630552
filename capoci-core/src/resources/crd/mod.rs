pub mod capi;
pub mod v1beta1;

pub mod place;
pub mod validate;

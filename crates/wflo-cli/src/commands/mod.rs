pub mod aep;
pub mod optimize;
pub mod util;
pub mod validate;

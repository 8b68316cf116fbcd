pub mod products;

pub use products::{ProductPayload, ProductResponse};

pub mod codec;
pub mod open;
pub mod serve;

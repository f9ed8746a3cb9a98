pub mod scenarios;
pub mod strategies;

#[allow(unused_imports)]
pub use scenarios::*;
#[allow(unused_imports)]
pub use strategies::*;

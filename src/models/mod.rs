pub mod session;
pub mod token;
pub mod user;
pub mod validation;

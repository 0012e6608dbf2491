pub mod configure;
pub mod logger;
pub mod store;
pub mod transfer;

pub mod assemble;
pub mod availability;
pub mod center;
pub mod config;
pub mod directory;
pub mod distance;
pub mod finder;
pub mod geo;
pub mod geocode;
pub mod http;
pub mod location;
pub mod server;

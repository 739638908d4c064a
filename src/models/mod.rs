pub mod catalog;
pub mod connections;
pub mod params;
pub mod request;

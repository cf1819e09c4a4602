pub mod fetch;
pub mod parse;
pub mod render;
pub mod robots;
pub mod sitemap;

//! Imports image assets and video references from a legacy site and its CDN
//! into a categorised output directory, an image store and a page template.

pub mod classify;
pub mod cms;
pub mod config;
pub mod db;
pub mod download;
pub mod extract;
pub mod http;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod scrape;
pub mod store;
pub mod template;

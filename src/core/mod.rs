pub mod logging;

// Multi-source dictionary lookup: providers, cache, lazy loading, HTTP surface
pub mod dictionary;

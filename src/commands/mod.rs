pub mod probe;
pub mod serve;
pub mod template;

// Re-export command functions for convenience
pub use probe::{resolve, send};
pub use serve::{load_config, serve, ServeParams};
pub use template::template;

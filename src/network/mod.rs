pub mod connection;
pub mod directory;
pub mod relay;

pub use directory::UserDirectory;

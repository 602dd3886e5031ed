pub mod admin_cli;

pub use admin_cli::run_cli;

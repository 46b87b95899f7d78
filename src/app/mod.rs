pub(crate) mod config_file;
pub(crate) mod exit_handler;
pub(crate) mod runtime;

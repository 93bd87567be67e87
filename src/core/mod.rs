// Core error modeling shared by the library and the CLI.
pub mod error;

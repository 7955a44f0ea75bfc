//! Input and output adapters for the command line tool.

pub mod csv;

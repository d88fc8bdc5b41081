#![doc = "Input readers and subcommands behind the `ssur-sim` binary."]

pub mod commands;
pub mod io;

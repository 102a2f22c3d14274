//! Process bootstrap helpers shared by the chatgate binaries

pub mod bootstrap;

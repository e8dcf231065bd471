//! Stackport CLI - rebase application images onto new stacks.

pub mod commands;

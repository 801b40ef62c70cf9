//! Scenario-based tests for flowline

mod helpers;

mod command_platform;
mod compile_errors;
mod concurrency;
mod conditional_branching;
mod history;
mod no_branch_selected;
mod output_propagation;
mod skip_propagation;

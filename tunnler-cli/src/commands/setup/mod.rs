//! Prompt and status-line helpers shared by the commands.

mod prompts;

pub use prompts::{print_error, print_header, print_step, print_success};

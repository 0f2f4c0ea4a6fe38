//! # Stage Executors
//!
//! One module per pipeline stage. Each executor takes a [`StageContext`]
//! plus the outputs of earlier stages, calls the model once or more, and
//! writes its artifacts to the stage directory before returning them.

pub mod context;
pub mod critique;
pub mod draft;
pub mod extract;
pub mod prompts;
pub mod research;
pub mod revise;
pub mod style;
pub mod verify;

pub use context::StageContext;

/// `<stem>_iter_<n>.<ext>`
pub fn iteration_name(stem: &str, ext: &str, iteration: u32) -> String {
    format!("{}_iter_{}.{}", stem, iteration, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_name() {
        assert_eq!(
            iteration_name("verification_report", "json", 2),
            "verification_report_iter_2.json"
        );
    }
}

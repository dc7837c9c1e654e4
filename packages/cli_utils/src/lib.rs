#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the transit urban form toolchain.
//!
//! [`init_logger`] sets up `pretty_env_logger` honoring `RUST_LOG`, and
//! [`select_choice`] and [`select_many`] wrap the `dialoguer` selectors
//! used by every interactive menu.

use dialoguer::{MultiSelect, Select};

/// Initializes the global logger from `RUST_LOG`, defaulting to `info`.
///
/// Calling it more than once (e.g., in tests) is harmless.
pub fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    // Ignore error if logger was already set
    builder.try_init().ok();
}

/// Index of `current` within `choices`, or `0` when it is absent.
#[must_use]
pub fn default_index<S: AsRef<str>>(choices: &[S], current: &str) -> usize {
    choices
        .iter()
        .position(|c| c.as_ref() == current)
        .unwrap_or(0)
}

/// Prompts the user to pick one of `choices`, pre-selecting `current`.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn select_choice(
    prompt: &str,
    choices: &[String],
    current: &str,
) -> Result<String, dialoguer::Error> {
    let idx = Select::new()
        .with_prompt(prompt)
        .items(choices)
        .default(default_index(choices, current))
        .interact()?;
    Ok(choices[idx].clone())
}

/// Which of `choices` start out checked: those listed in `current`.
#[must_use]
pub fn checked<S: AsRef<str>>(choices: &[S], current: &[String]) -> Vec<bool> {
    choices
        .iter()
        .map(|c| current.iter().any(|v| v == c.as_ref()))
        .collect()
}

/// Prompts the user to tick any number of `choices`, pre-checking those in
/// `current`. An empty result means nothing was ticked.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn select_many(
    prompt: &str,
    choices: &[String],
    current: &[String],
) -> Result<Vec<String>, dialoguer::Error> {
    let picked = MultiSelect::new()
        .with_prompt(prompt)
        .items(choices)
        .defaults(&checked(choices, current))
        .interact()?;
    Ok(picked.into_iter().map(|i| choices[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_index_falls_back_to_first() {
        let choices = ["All", "HR", "LR"];
        assert_eq!(default_index(&choices, "LR"), 2);
        assert_eq!(default_index(&choices, "CR"), 0);
    }

    #[test]
    fn checked_marks_current_values() {
        let choices = ["All", "Classic", "Donut"];
        assert_eq!(
            checked(&choices, &["Donut".to_owned()]),
            vec![false, false, true]
        );
        assert_eq!(checked(&choices, &[]), vec![false; 3]);
    }

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
    }
}

//! Alert evaluation and notification

mod evaluator;
mod notifier;

pub use evaluator::evaluate;
pub use notifier::{AlertDispatcher, EmailNotifier, Notifier, SlackNotifier};

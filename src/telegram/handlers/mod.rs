pub mod commands;
pub mod inline_buttons;
pub mod raw_message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    Handled,
    Skipped,
}

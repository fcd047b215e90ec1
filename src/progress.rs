use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// Style used when an operation finishes successfully.
/// - Green check mark followed by the final message.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

/// Style used when an operation fails with an error.
/// - Red cross followed by the error message.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}

fn finish(style: ProgressStyle, msg: impl Into<Cow<'static, str>>) {
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.finish_with_message(msg);
}

/// Print a final success line.
pub fn finish_ok(msg: impl Into<Cow<'static, str>>) {
    finish(ok_style(), msg)
}

/// Print a final failure line.
pub fn finish_err(msg: impl Into<Cow<'static, str>>) {
    finish(err_style(), msg)
}

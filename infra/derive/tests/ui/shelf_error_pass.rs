use shelf_derive::shelf_error;
use std::borrow::Cow;

#[shelf_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Invalid token{}: {message}", format_context(.context))]
    InvalidToken { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open() -> Result<(), DemoError> {
    std::fs::metadata("/definitely/not/here").map(|_| ()).context("probing")
}

fn main() {
    let _ = open();
}

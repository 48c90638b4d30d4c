use shelf_derive::shelf_error;
use std::borrow::Cow;

#[shelf_error]
pub enum OnlyMessages {
    #[error("Rejected: {message}")]
    Rejected { message: Cow<'static, str> },
}

fn main() {
    let err = OnlyMessages::Rejected { message: "nope".into() };
    assert_eq!(err.variant_name(), "Rejected");
}

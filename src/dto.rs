use serde::Serialize;

/// `{"msg": ...}` acknowledgement for operations without a resource body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub msg: &'static str,
}

impl Message {
    pub fn new(msg: &'static str) -> Self {
        Self { msg }
    }
}

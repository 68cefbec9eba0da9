pub mod time;

/// Random identifier for messages and observers.
pub fn longid() -> String {
    uuid::Uuid::new_v4().to_string()
}

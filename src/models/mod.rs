mod user;

pub use user::{User, USERS};

use crate::orm::MetaData;

/// Registry holding every table this crate maps.
pub fn metadata() -> MetaData {
    let mut metadata = MetaData::new();
    metadata.register::<User>();
    metadata
}

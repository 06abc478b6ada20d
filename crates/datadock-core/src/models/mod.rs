mod data_file;
mod user;

pub use data_file::{DataFile, FileKind, NewDataFile};
pub use user::User;

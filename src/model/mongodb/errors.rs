//! MongoDB server error codes the store needs to tell apart.
//! The mongodb crate does not export constants for them.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const UNAUTHORIZED: i32 = 13;
pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the server refused the operation for lack of privileges.
pub fn is_permission_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Command(ref e) => e.code == UNAUTHORIZED,
        ErrorKind::Authentication { .. } => true,
        _ => false,
    }
}

/// Return true if the server could not be reached at all.
pub fn is_unreachable_error(err: &DbError) -> bool {
    matches!(*err.kind, ErrorKind::ServerSelection { .. } | ErrorKind::Io(_))
}

//! User and group name lookups for uid/gid targets.

use nix::unistd::{Gid, Group, Uid, User};
use tracing::debug;

/// Login name for `uid`, or the number itself when it has no passwd entry.
pub fn user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        Ok(None) => uid.to_string(),
        Err(e) => {
            debug!("Failed to look up uid {}: {}", uid, e);
            uid.to_string()
        }
    }
}

/// Group name for `gid`, or the number itself when it has no group entry.
pub fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        Ok(None) => gid.to_string(),
        Err(e) => {
            debug!("Failed to look up gid {}: {}", gid, e);
            gid.to_string()
        }
    }
}

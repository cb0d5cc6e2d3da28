//! Privilege dropping for the supervised worker.
//!
//! Account lookups hit the password database and are therefore done in
//! the guardian before the second fork; only the raw id switches run in
//! the worker.

use std::{collections::HashMap, io, path::PathBuf};

use nix::unistd::{Gid, Group, Uid, User, geteuid, setgid, setuid};

/// Resolved identity the worker assumes after the second fork.
#[derive(Debug, Clone, Default)]
pub struct WorkerCredentials {
    uid: Option<Uid>,
    gid: Option<Gid>,
    username: Option<String>,
    home: Option<PathBuf>,
}

impl WorkerCredentials {
    /// Resolves the requested user and group names ahead of the fork.
    ///
    /// Returns `Ok(None)` when no switch was requested. Requesting a
    /// switch without root privileges is refused up front.
    pub fn resolve(user: Option<&str>, group: Option<&str>) -> io::Result<Option<Self>> {
        if user.is_none() && group.is_none() {
            return Ok(None);
        }

        if !geteuid().is_root() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "user/group switching requested but the guardian is not running as root",
            ));
        }

        let mut credentials = WorkerCredentials::default();

        if let Some(user_name) = user {
            let account = User::from_name(user_name)
                .map_err(|err| io::Error::other(err.to_string()))?
                .ok_or_else(|| io::Error::other(format!("user '{user_name}' not found")))?;
            credentials.uid = Some(account.uid);
            credentials.gid = Some(account.gid);
            credentials.home = Some(account.dir);
            credentials.username = Some(account.name);
        }

        if let Some(group_name) = group {
            let entry = Group::from_name(group_name)
                .map_err(|err| io::Error::other(err.to_string()))?
                .ok_or_else(|| io::Error::other(format!("group '{group_name}' not found")))?;
            credentials.gid = Some(entry.gid);
        }

        Ok(Some(credentials))
    }

    /// Applies the switch inside the worker, between fork and exec.
    ///
    /// The gid drops first; setgid is no longer permitted once the uid
    /// has dropped.
    pub fn apply(&self) -> io::Result<()> {
        if let Some(gid) = self.gid {
            setgid(gid).map_err(io::Error::from)?;
        }
        if let Some(uid) = self.uid {
            setuid(uid).map_err(io::Error::from)?;
        }
        Ok(())
    }

    /// Environment overrides matching the target account.
    pub fn env_overrides(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let Some(home) = &self.home {
            env.insert("HOME".to_string(), home.display().to_string());
        }
        if let Some(username) = &self.username {
            env.insert("USER".to_string(), username.clone());
            env.insert("LOGNAME".to_string(), username.clone());
        }
        env
    }
}

//! Per-user data directories.
//!
//! A `user/` directory in the working directory makes the install portable;
//! otherwise the XDG data directory is used. All category directories are
//! created when the table is built.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PathError;

pub const PORTABLE_DIR: &str = "user";

const CUSTOM_TROPHY_NOTICE: &str = "\
++++++++++++++++++++++++++++++++
+ Custom Trophy Images / Sound +
++++++++++++++++++++++++++++++++

You can add custom images to the trophies.
*We recommend a square resolution image, for example 200x200, 500x500, the same size as the height and width.
In this folder ('user/custom_trophy'), add the files with the following names:

bronze.png
silver.png
gold.png
platinum.png

You can add a custom sound for trophy notifications.
*By default, no audio is played unless it is in this folder.
In this folder ('user/custom_trophy'), add the files with the following names:

trophy.mp3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathType {
    UserDir,
    LogDir,
    ScreenshotsDir,
    ShaderDir,
    SaveDataDir,
    GameDataDir,
    TempDataDir,
    SysModuleDir,
    DownloadDir,
    CapturesDir,
    CheatsDir,
    PatchesDir,
    MetaDataDir,
    CustomTrophy,
}

impl PathType {
    pub const ALL: [PathType; 14] = [
        Self::UserDir,
        Self::LogDir,
        Self::ScreenshotsDir,
        Self::ShaderDir,
        Self::SaveDataDir,
        Self::GameDataDir,
        Self::TempDataDir,
        Self::SysModuleDir,
        Self::DownloadDir,
        Self::CapturesDir,
        Self::CheatsDir,
        Self::PatchesDir,
        Self::MetaDataDir,
        Self::CustomTrophy,
    ];

    /// Directory name below the user directory (empty for the user directory itself).
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::UserDir => "",
            Self::LogDir => "log",
            Self::ScreenshotsDir => "screenshots",
            Self::ShaderDir => "shader",
            Self::SaveDataDir => "savedata",
            Self::GameDataDir => "data",
            Self::TempDataDir => "temp",
            Self::SysModuleDir => "sys_modules",
            Self::DownloadDir => "download",
            Self::CapturesDir => "captures",
            Self::CheatsDir => "cheats",
            Self::PatchesDir => "patches",
            Self::MetaDataDir => "game_data",
            Self::CustomTrophy => "custom_trophy",
        }
    }
}

/// Resolved user directories, keyed by [`PathType`].
#[derive(Debug, Clone)]
pub struct UserPaths {
    paths: HashMap<PathType, PathBuf>,
}

impl UserPaths {
    /// Pick the user directory for `app_name` from the working directory and
    /// environment, then create every category below it.
    pub fn discover(app_name: &str) -> Result<Self, PathError> {
        let cwd = env::current_dir()?;
        let root = resolve_user_dir(
            &cwd,
            env::var_os("XDG_DATA_HOME").map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
            app_name,
        )?;
        Self::with_root(root)
    }

    /// Build the table below an explicit user directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self, PathError> {
        let root = root.into();
        let mut paths = HashMap::with_capacity(PathType::ALL.len());

        for kind in PathType::ALL {
            let path = match kind.dir_name() {
                "" => root.clone(),
                name => root.join(name),
            };
            fs::create_dir_all(&path).map_err(|source| PathError::Create {
                path: path.clone(),
                source,
            })?;
            paths.insert(kind, path);
        }

        let notice = root.join(PathType::CustomTrophy.dir_name()).join("Notice.txt");
        if let Err(e) = fs::write(&notice, CUSTOM_TROPHY_NOTICE) {
            tracing::warn!(path = %notice.display(), error = %e, "could not write notice file");
        }

        tracing::debug!(root = %root.display(), "user paths ready");
        Ok(Self { paths })
    }

    pub fn get(&self, kind: PathType) -> &Path {
        // Every PathType is inserted by `with_root`.
        &self.paths[&kind]
    }

    /// Redirect `kind` to an existing directory.
    pub fn set(&mut self, kind: PathType, path: impl Into<PathBuf>) -> Result<(), PathError> {
        let path = path.into();
        if !path.is_dir() {
            tracing::error!(path = %path_to_utf8_string(&path), "not a directory");
            return Err(PathError::NotADirectory(path));
        }
        self.paths.insert(kind, path);
        Ok(())
    }

    pub fn get_string(&self, kind: PathType) -> String {
        path_to_utf8_string(self.get(kind))
    }
}

fn resolve_user_dir(
    cwd: &Path,
    xdg_data_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_name: &str,
) -> Result<PathBuf, PathError> {
    let portable = cwd.join(PORTABLE_DIR);
    if portable.exists() {
        return Ok(portable);
    }
    if let Some(xdg) = xdg_data_home.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(xdg.join(app_name));
    }
    home.map(|h| h.join(".local").join("share").join(app_name))
        .ok_or(PathError::NoHomeDirectory)
}

/// Lossy UTF-8 rendering of `path`.
pub fn path_to_utf8_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_creates_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("user");
        let paths = UserPaths::with_root(&root).unwrap();

        assert_eq!(paths.get(PathType::UserDir), root);
        for kind in PathType::ALL {
            assert!(paths.get(kind).is_dir(), "{kind:?}");
        }
        assert_eq!(paths.get(PathType::GameDataDir), root.join("data"));

        let notice = fs::read_to_string(root.join("custom_trophy/Notice.txt")).unwrap();
        assert!(notice.contains("platinum.png"));
    }

    #[test]
    fn set_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = UserPaths::with_root(dir.path()).unwrap();

        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            paths.set(PathType::GameDataDir, &file),
            Err(PathError::NotADirectory(_))
        ));

        let other = tempfile::tempdir().unwrap();
        paths.set(PathType::GameDataDir, other.path()).unwrap();
        assert_eq!(paths.get(PathType::GameDataDir), other.path());
    }

    #[test]
    fn user_dir_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path();

        let xdg = Some(PathBuf::from("/xdg"));
        let home = Some(PathBuf::from("/home/u"));

        assert_eq!(
            resolve_user_dir(cwd, xdg.clone(), home.clone(), "app").unwrap(),
            PathBuf::from("/xdg/app")
        );
        assert_eq!(
            resolve_user_dir(cwd, Some(PathBuf::new()), home.clone(), "app").unwrap(),
            PathBuf::from("/home/u/.local/share/app")
        );
        assert!(matches!(
            resolve_user_dir(cwd, None, None, "app"),
            Err(PathError::NoHomeDirectory)
        ));

        fs::create_dir(cwd.join(PORTABLE_DIR)).unwrap();
        assert_eq!(
            resolve_user_dir(cwd, xdg, home, "app").unwrap(),
            cwd.join(PORTABLE_DIR)
        );
    }
}

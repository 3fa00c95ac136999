use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use boxconfig::CONFIG_FILE_NAME;
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "REACTIBOX_CONFIG_DIR";

const QUALIFIER: &str = "app";
const ORGANISATION: &str = "lebailly";
const APPLICATION: &str = "reactibox";

const USER_SHADER: &str = "shaders/reactive_box.frag";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn user_shader_path(&self) -> PathBuf {
        self.config_dir.join(USER_SHADER)
    }

    /// The user's shader override, if one exists on disk.
    pub fn user_shader(&self) -> Option<PathBuf> {
        let path = self.user_shader_path();
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);

        let paths = AppPaths::discover().unwrap();
        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("reactibox.toml"));
    }

    #[test]
    fn user_shader_only_when_present() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_raw(root.path().to_path_buf());
        assert!(paths.user_shader().is_none());

        let shader = paths.user_shader_path();
        std::fs::create_dir_all(shader.parent().unwrap()).unwrap();
        std::fs::write(&shader, "void mainImage(out vec4 c, in vec2 p) {}").unwrap();
        assert_eq!(paths.user_shader(), Some(shader));
    }
}

use std::path::PathBuf;

use hashbrown::HashMap;

/// Source text for one module, as found by a loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleSource {
    /// Shown in tracebacks.
    pub filename: String,
    pub source: String,
    /// Packages resolve relative imports against themselves instead of their parent.
    pub is_package: bool,
}

/// Finds the source of a module by its dotted name. The VM owns compilation and caching.
pub trait ModuleLoader {
    fn find_module(&self, name: &str) -> Option<ModuleSource>;
}

/// Looks modules up under a list of directories: `a.b` is `a/b.py` or `a/b/__init__.py`.
#[derive(Clone, Debug, Default)]
pub struct FsModuleLoader {
    roots: Vec<PathBuf>,
}

impl FsModuleLoader {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ModuleLoader for FsModuleLoader {
    fn find_module(&self, name: &str) -> Option<ModuleSource> {
        let rel: PathBuf = name.split('.').collect();
        for root in &self.roots {
            let candidates = [
                (root.join(&rel).with_extension("py"), false),
                (root.join(&rel).join("__init__.py"), true),
            ];
            for (path, is_package) in candidates {
                match std::fs::read_to_string(&path) {
                    Ok(source) => {
                        tracing::debug!(target: "pk::import", module = name, path = %path.display(), "found module");
                        return Some(ModuleSource {
                            filename: path.to_string_lossy().into_owned(),
                            source,
                            is_package,
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(target: "pk::import", path = %path.display(), error = %e, "unreadable module file");
                    }
                }
            }
        }
        None
    }
}

/// Modules held in memory, for embedders and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    modules: HashMap<String, (String, bool)>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.modules.insert(name.into(), (source.into(), false));
        self
    }

    pub fn add_package(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.modules.insert(name.into(), (source.into(), true));
        self
    }
}

impl ModuleLoader for MemoryLoader {
    fn find_module(&self, name: &str) -> Option<ModuleSource> {
        let (source, is_package) = self.modules.get(name)?;
        let filename = if *is_package {
            format!("{}/__init__.py", name.replace('.', "/"))
        } else {
            format!("{}.py", name.replace('.', "/"))
        };
        Some(ModuleSource {
            filename,
            source: source.clone(),
            is_package: *is_package,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_loader_names_files_like_a_tree() {
        let mut loader = MemoryLoader::new();
        loader.add_package("pkg", "").add_module("pkg.util", "x = 1");
        let pkg = loader.find_module("pkg").unwrap();
        assert!(pkg.is_package);
        assert_eq!(pkg.filename, "pkg/__init__.py");
        let util = loader.find_module("pkg.util").unwrap();
        assert_eq!(util.filename, "pkg/util.py");
        assert_eq!(util.source, "x = 1");
        assert!(loader.find_module("missing").is_none());
    }

    #[test]
    fn fs_loader_prefers_modules_then_packages() {
        let dir = std::env::temp_dir().join(format!("pk_loader_{}", std::process::id()));
        std::fs::create_dir_all(dir.join("pkg")).unwrap();
        std::fs::write(dir.join("pkg").join("__init__.py"), "A = 1\n").unwrap();
        std::fs::write(dir.join("pkg").join("mod.py"), "B = 2\n").unwrap();
        let loader = FsModuleLoader::new([dir.clone()]);
        let pkg = loader.find_module("pkg").unwrap();
        assert!(pkg.is_package);
        assert_eq!(pkg.source, "A = 1\n");
        let m = loader.find_module("pkg.mod").unwrap();
        assert!(!m.is_package);
        assert!(loader.find_module("pkg.nope").is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

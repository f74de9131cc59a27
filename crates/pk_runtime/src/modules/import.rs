use std::rc::Rc;

use pk_ir::CompileMode;

use crate::core::object::ModuleInfo;
use crate::core::{ObjPayload, ObjectId, ObjectLayout, Value, tp};
use crate::errors::{PyResult, messages};
use crate::vm::Vm;

/// Resolves leading dots against `package`: one dot is the package itself, each further dot
/// goes one level up.
fn resolve_relative(path: &str, package: &str) -> Result<String, &'static str> {
    let rest = path.trim_start_matches('.');
    let dots = path.len() - rest.len();
    if dots == 0 {
        return Ok(path.to_string());
    }
    if package.is_empty() {
        return Err("attempted relative import with no known parent package");
    }
    let mut base: Vec<&str> = package.split('.').collect();
    for _ in 1..dots {
        if base.pop().is_none() || base.is_empty() {
            return Err("attempted relative import beyond top-level package");
        }
    }
    let mut full = base.join(".");
    if !rest.is_empty() {
        full.push('.');
        full.push_str(rest);
    }
    Ok(full)
}

impl Vm {
    /// Creates and registers an empty module. Modules are permanent.
    pub(crate) fn new_module_object(&mut self, name: &str, package: &str) -> ObjectId {
        let info = ModuleInfo {
            name: Rc::from(name),
            package: Rc::from(package),
        };
        let m = self.alloc_permanent(tp::MODULE, ObjectLayout::Dict, ObjPayload::Module(info));
        let id = m.obj_id().unwrap_or(ObjectId(0));
        let name_v = self.new_str(name);
        self.module_set(id, Rc::from("__name__"), name_v);
        self.modules.insert(Rc::from(name), id);
        id
    }

    fn module_info(&self, id: ObjectId) -> Option<&ModuleInfo> {
        match &self.heap.get(id).payload {
            ObjPayload::Module(info) => Some(info),
            _ => None,
        }
    }

    /// IMPORT_PATH: loads every package along a dotted path and returns the last module.
    pub(crate) fn import_path(&mut self, fi: usize, path: &str) -> PyResult<Value> {
        let package = self
            .module_info(self.frames[fi].module)
            .map(|m| m.package.clone())
            .unwrap_or_else(|| Rc::from(""));
        let full = match resolve_relative(path, &package) {
            Ok(full) => full,
            Err(msg) => return Err(self.raise_new(tp::IMPORT_ERROR, msg)),
        };
        self.import_module(&full)
    }

    /// Imports an absolute dotted name.
    pub fn import_module(&mut self, name: &str) -> PyResult<Value> {
        let mut parent: Option<ObjectId> = None;
        let mut end = 0;
        loop {
            end = name[end..].find('.').map_or(name.len(), |i| end + i);
            let prefix = &name[..end];
            let id = match self.modules.get(prefix) {
                Some(&id) => id,
                None => {
                    let id = self.load_module(prefix)?;
                    if let Some(p) = parent {
                        let last = prefix.rsplit('.').next().unwrap_or(prefix);
                        self.module_set(p, Rc::from(last), Value::obj(tp::MODULE, id));
                    }
                    id
                }
            };
            if end == name.len() {
                return Ok(Value::obj(tp::MODULE, id));
            }
            parent = Some(id);
            end += 1;
        }
    }

    /// Finds, compiles and executes one module. It is registered before its body runs so
    /// circular imports see the partially initialised module.
    fn load_module(&mut self, name: &str) -> PyResult<ObjectId> {
        let Some(loader) = self.loader.as_ref() else {
            return Err(self.raise_new(
                tp::IMPORT_ERROR,
                format!("{}: cannot import '{name}'", messages::NO_LOADER),
            ));
        };
        let Some(src) = loader.find_module(name) else {
            return Err(self.raise_new(tp::IMPORT_ERROR, format!("No module named '{name}'")));
        };
        let co = match self.frontend.compile(&src.source, &src.filename, CompileMode::Exec) {
            Ok(co) => co,
            Err(e) => return Err(self.syntax_error(&e)),
        };
        let package = if src.is_package {
            name
        } else {
            name.rsplit_once('.').map_or("", |(p, _)| p)
        };
        tracing::debug!(target: "pk::import", module = name, file = %src.filename, "loading module");
        let id = self.new_module_object(name, package);
        let file = self.new_str(&src.filename);
        self.module_set(id, Rc::from("__file__"), file);
        match self.run_nested(co, id, None) {
            Ok(_) => Ok(id),
            Err(e) => {
                self.modules.remove(name);
                Err(e)
            }
        }
    }

    /// POP_IMPORT_STAR: copies `__all__`, or every public name, into the importing module.
    pub(crate) fn import_star(&mut self, fi: usize, m: Value) -> PyResult<()> {
        let Some(src) = m.obj_id().filter(|_| m.ty() == tp::MODULE) else {
            let tn = self.type_name(m);
            return Err(self.type_error(format!("cannot import * from '{tn}' object")));
        };
        let names: Vec<Rc<str>> = match self.module_get(src, "__all__") {
            Some(all) => {
                let mut names = Vec::new();
                for v in self.collect_values(all)? {
                    match self.str_value(v) {
                        Some(s) => names.push(s),
                        None => return Err(self.type_error("__all__ must contain only strings")),
                    }
                }
                names
            }
            None => self
                .heap
                .get(src)
                .attr_dict()
                .map(|d| d.keys().filter(|k| !k.starts_with('_')).cloned().collect())
                .unwrap_or_default(),
        };
        let dest = self.frames[fi].module;
        for name in names {
            let Some(v) = self.module_get(src, &name) else {
                return Err(self.raise_new(
                    tp::IMPORT_ERROR,
                    format!("cannot import name '{name}'"),
                ));
            };
            self.module_set(dest, name, v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_relative;

    #[test]
    fn relative_paths_climb_the_package() {
        assert_eq!(resolve_relative("a.b", "").unwrap(), "a.b");
        assert_eq!(resolve_relative(".", "pkg.sub").unwrap(), "pkg.sub");
        assert_eq!(resolve_relative(".util", "pkg").unwrap(), "pkg.util");
        assert_eq!(resolve_relative("..util", "pkg.sub").unwrap(), "pkg.util");
        assert!(resolve_relative(".x", "").is_err());
        assert!(resolve_relative("..x", "pkg").is_err());
    }
}

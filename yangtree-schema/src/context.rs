//! The schema registry: loaded modules, their node arenas, and the lookups
//! the data parser relies on.

use anyhow::{bail, Context as _, Result};
use camino::{Utf8Path, Utf8PathBuf};
use yangtree_dict::Dict;

use crate::{
    text, FeatureRef, Identity, IdentityId, Module, ModuleId, Snode, SnodeId, SnodeKind,
    Typedef, TypedefId,
};

/// Owns every loaded module together with the arenas their schema nodes,
/// typedefs and identities live in, plus the shared string dictionary
///
/// A context is created empty, populated by [`Context::load_module`], and
/// then read (never mutated) while data trees are parsed against it.
#[derive(Default, Debug)]
pub struct Context {
    dict: Dict,
    modules: Vec<Module>,
    snodes: Vec<Snode>,
    typedefs: Vec<Typedef>,
    identities: Vec<Identity>,
    /// Names of modules whose load is in progress; guards circular imports
    parsing: Vec<String>,
    searchpath: Option<Utf8PathBuf>,
}

impl Context {
    /// Constructs an empty context
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the directory that `import` and `include` load missing modules
    /// from (`<name>.yang` or `<name>@<revision>.yang`)
    pub fn set_searchpath(&mut self, path: impl AsRef<Utf8Path>) {
        self.searchpath = Some(path.as_ref().to_owned());
    }

    /// The string dictionary shared by schemas and data trees of this context
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Parses YANG source text and registers the module it defines
    ///
    /// Returns the already-registered module when one of the same name has
    /// been loaded before.
    pub fn load_module(&mut self, source: &str) -> Result<ModuleId> {
        let stmt = text::parse_text(source)?;
        text::builder::build(self, stmt)
    }

    /// Finds an already-loaded module, or loads it from the search path;
    /// called for every `import`
    pub(crate) fn ensure_module_loaded(
        &mut self,
        name: &str,
        revision: Option<&str>,
    ) -> Result<ModuleId> {
        if let Some(id) = self.module_by_name(name) {
            return Ok(id);
        }
        if self.parsing.iter().any(|p| p == name) {
            bail!("Circular import dependency on the module \"{name}\"");
        }
        let source = self
            .read_module_file(name, revision)
            .with_context(|| format!("Importing \"{name}\" module failed"))?;
        self.parsing.push(name.to_owned());
        let result = self.load_module(&source);
        self.parsing.pop();
        let id = result.with_context(|| format!("Importing \"{name}\" module failed"))?;
        if self.dict.resolve(self.module(id).name) != name {
            bail!(
                "Importing \"{name}\" module failed: the loaded file defines \"{}\"",
                self.dict.resolve(self.module(id).name)
            );
        }
        Ok(id)
    }

    /// Reads a module or submodule source file from the search path
    pub(crate) fn read_module_file(&self, name: &str, revision: Option<&str>) -> Result<String> {
        let Some(dir) = &self.searchpath else {
            bail!("no module \"{name}\" is loaded and no search path is set");
        };
        let mut path = dir.join(format!("{name}.yang"));
        if let Some(revision) = revision {
            let dated = dir.join(format!("{name}@{revision}.yang"));
            if dated.is_file() {
                path = dated;
            }
        }
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {path}"))
    }

    /// Iterates the loaded modules
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId(i as u32), m))
    }

    /// Returns a module by id
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub(crate) fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub(crate) fn push_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        ModuleId((self.modules.len() - 1) as u32)
    }

    /// Finds a module by name
    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        let sym = self.dict.find(name)?;
        self.modules
            .iter()
            .position(|m| m.name == sym)
            .map(|i| ModuleId(i as u32))
    }

    /// Finds a module by its XML namespace URI
    pub fn module_by_ns(&self, ns: &str) -> Option<ModuleId> {
        let sym = self.dict.find(ns)?;
        self.modules
            .iter()
            .position(|m| m.ns == sym)
            .map(|i| ModuleId(i as u32))
    }

    /// Returns a schema node by id
    pub fn snode(&self, id: SnodeId) -> &Snode {
        &self.snodes[id.0 as usize]
    }

    pub(crate) fn snode_mut(&mut self, id: SnodeId) -> &mut Snode {
        &mut self.snodes[id.0 as usize]
    }

    pub(crate) fn push_snode(&mut self, snode: Snode) -> SnodeId {
        self.snodes.push(snode);
        SnodeId((self.snodes.len() - 1) as u32)
    }

    /// Returns a typedef by id
    pub fn typedef(&self, id: TypedefId) -> &Typedef {
        &self.typedefs[id.0 as usize]
    }

    pub(crate) fn push_typedef(&mut self, typedef: Typedef) -> TypedefId {
        self.typedefs.push(typedef);
        TypedefId((self.typedefs.len() - 1) as u32)
    }

    /// Returns an identity by id
    pub fn identity(&self, id: IdentityId) -> &Identity {
        &self.identities[id.0 as usize]
    }

    pub(crate) fn identity_mut(&mut self, id: IdentityId) -> &mut Identity {
        &mut self.identities[id.0 as usize]
    }

    pub(crate) fn push_identity(&mut self, identity: Identity) -> IdentityId {
        self.identities.push(identity);
        IdentityId((self.identities.len() - 1) as u32)
    }

    /// Finds an identity by name within a module
    pub fn find_identity(&self, module: ModuleId, name: &str) -> Option<IdentityId> {
        let sym = self.dict.find(name)?;
        self.module(module)
            .identities
            .iter()
            .copied()
            .find(|&id| self.identity(id).name == sym)
    }

    /// Resolves a `module:name` (or bare `name`) identity reference,
    /// unprefixed names falling back to `fallback`
    pub fn resolve_identity(&self, qualified: &str, fallback: ModuleId) -> Option<IdentityId> {
        let (module_name, local) = crate::split_qualified(qualified);
        let module = match module_name {
            Some(name) => self.module_by_name(name)?,
            None => fallback,
        };
        self.find_identity(module, local)
    }

    /// Whether `ident` is (transitively) derived from `base`
    pub fn identity_derives(&self, ident: IdentityId, base: IdentityId) -> bool {
        let mut cur = self.identity(ident).base;
        while let Some(b) = cur {
            if b == base {
                return true;
            }
            cur = self.identity(b).base;
        }
        false
    }

    /// Enables a feature of a module by name
    pub fn enable_feature(&mut self, module: ModuleId, name: &str) -> Result<()> {
        let Some(sym) = self.dict.find(name) else {
            bail!("no feature \"{name}\" in module");
        };
        let m = self.module_mut(module);
        match m.features.iter_mut().find(|f| f.name == sym) {
            Some(feature) => {
                feature.enabled = true;
                Ok(())
            }
            None => bail!("no feature \"{name}\" in module"),
        }
    }

    /// Whether a feature (and, recursively, its own `if-feature`
    /// dependencies) is enabled
    pub fn feature_enabled(&self, fref: FeatureRef) -> bool {
        let feature = &self.module(fref.module).features[fref.index as usize];
        feature.enabled && feature.if_features.iter().all(|&f| self.feature_enabled(f))
    }

    /// Whether a schema node is enabled: every `if-feature` on it and its
    /// ancestors must hold
    pub fn snode_enabled(&self, id: SnodeId) -> bool {
        let mut cur = Some(id);
        while let Some(s) = cur {
            let snode = self.snode(s);
            if !snode.if_features.iter().all(|&f| self.feature_enabled(f)) {
                return false;
            }
            cur = snode.parent;
        }
        true
    }

    /// The effective `config` of a node: explicit value, else inherited from
    /// the nearest ancestor that has one, else `true`
    pub fn snode_config(&self, id: SnodeId) -> bool {
        let mut cur = Some(id);
        while let Some(s) = cur {
            let snode = self.snode(s);
            if let Some(config) = snode.config {
                return config;
            }
            cur = snode.parent;
        }
        true
    }

    /// The nearest ancestor that appears in data trees, skipping the
    /// transparent choice/case/uses layers; `None` for top-level nodes
    pub fn data_parent(&self, id: SnodeId) -> Option<SnodeId> {
        let mut cur = self.snode(id).parent;
        while let Some(p) = cur {
            let snode = self.snode(p);
            if snode.is_data() {
                return Some(p);
            }
            cur = snode.parent;
        }
        None
    }

    /// Finds a data child by name under `parent` (or among the top-level
    /// nodes of `module` when `parent` is `None`), descending transparently
    /// through choice, case and uses
    ///
    /// `module_name` filters matches to a module; unqualified names match
    /// nodes of `module`.
    pub fn find_data_child(
        &self,
        module: ModuleId,
        parent: Option<SnodeId>,
        module_name: Option<&str>,
        name: &str,
    ) -> Option<SnodeId> {
        let owner = match module_name {
            Some(module_name) => self.module_by_name(module_name)?,
            None => module,
        };
        let children = match parent {
            Some(p) => &self.snode(p).children,
            None => &self.module(owner).data,
        };
        self.search_data_child(children, owner, name)
    }

    fn search_data_child(
        &self,
        children: &[SnodeId],
        owner: ModuleId,
        name: &str,
    ) -> Option<SnodeId> {
        for &id in children {
            let snode = self.snode(id);
            match snode.kind {
                SnodeKind::Grouping => continue,
                SnodeKind::Choice { .. } | SnodeKind::Case => {
                    if let Some(found) = self.search_data_child(&snode.children, owner, name) {
                        return Some(found);
                    }
                }
                SnodeKind::Uses { grouping } => {
                    if let Some(g) = grouping {
                        if let Some(found) =
                            self.search_data_child(&self.snode(g).children, owner, name)
                        {
                            return Some(found);
                        }
                    }
                }
                _ => {
                    if snode.module == owner && self.dict.resolve(snode.name) == name {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    /// Resolves the schema node a leafref leaf points at through its `path`,
    /// `None` when the path does not lead to a node
    pub fn leafref_target(&self, leaf: SnodeId) -> Option<SnodeId> {
        let snode = self.snode(leaf);
        let ty = snode.leaf_type()?;
        let path_sym = self.leafref_path(ty)?;
        let path = self.dict.resolve(path_sym);
        self.resolve_schema_path(path, leaf)
    }

    /// Walks a data-node path (absolute, or `../`-relative to `from`)
    /// through the schema tree
    pub fn resolve_schema_path(&self, path: &str, from: SnodeId) -> Option<SnodeId> {
        let module = self.snode(from).module;
        // `Some(at)` walks below `at`; `None` walks the top level
        let mut cur = if path.starts_with('/') {
            None
        } else {
            Some(from)
        };
        for step in path.split('/').filter(|s| !s.is_empty()) {
            if step == ".." {
                // Stepping up from the top level leaves the tree
                cur = self.data_parent(cur?);
                continue;
            }
            let name = step.split('[').next().unwrap_or(step);
            let (module_name, local) = crate::split_qualified(name);
            cur = Some(self.find_data_child(module, cur, module_name, local)?);
        }
        cur
    }
}

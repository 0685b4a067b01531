//! Turns the parsed statement tree into registered modules.
//!
//! The builder walks a module's statements in phases: header (namespace,
//! prefix, imports, includes, revisions), then features, identities and
//! typedefs, then the schema node tree, and finally the bindings that need
//! the whole module in place (identity bases, `uses` groupings, list keys).
//! Duplicate single-instance statements are rejected the same way the
//! surrounding statements name them.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Context as _, Result};
use yangtree_dict::{Dict, Sym};

use crate::{
    identifier_len, split_qualified,
    text::{self, Ystmt},
    types::{anchored_pattern, BitDef, EnumDef, Pattern, Restriction, Type, TypeBase, TypeSpec},
    xpath, Context, Feature, FeatureRef, Identity, IdentityId, Import, Module, ModuleId, Must,
    Revision, Snode, SnodeId, SnodeKind, Status, Typedef, TypedefId,
};

/// Builds and registers the module defined by `stmt`
pub(crate) fn build(ctx: &mut Context, stmt: Ystmt) -> Result<ModuleId> {
    match stmt.keyword.as_str() {
        "module" => {}
        "submodule" => bail!(
            "line {}: submodule \"{}\" cannot be loaded directly; include it from its module",
            stmt.line,
            stmt.arg().unwrap_or("?")
        ),
        other => bail!("line {}: expected a module, found \"{other}\"", stmt.line),
    }
    let name = stmt.arg()?.to_owned();
    check_identifier(&name, stmt.line)?;
    if let Some(existing) = ctx.module_by_name(&name) {
        return Ok(existing);
    }
    let builder = ModuleBuilder {
        ctx,
        name,
        id: ModuleId(0),
        prefixes: HashMap::new(),
        typedef_names: HashMap::new(),
        identity_names: HashMap::new(),
        feature_names: HashMap::new(),
    };
    builder.run(stmt.children)
}

struct ModuleBuilder<'c> {
    ctx: &'c mut Context,
    name: String,
    /// Valid once the header phase has registered the module
    id: ModuleId,
    /// Prefix to module-name bindings: the module's own prefix plus one per
    /// import
    prefixes: HashMap<String, String>,
    typedef_names: HashMap<String, TypedefId>,
    identity_names: HashMap<String, IdentityId>,
    feature_names: HashMap<String, u32>,
}

impl ModuleBuilder<'_> {
    fn run(mut self, mut body: Vec<Ystmt>) -> Result<ModuleId> {
        tracing::debug!("Loading module \"{}\"", self.name);
        let mut ns = None;
        let mut prefix: Option<String> = None;
        let mut organization = None;
        let mut contact = None;
        let mut description = None;
        let mut reference = None;
        let mut imports: Vec<Import> = Vec::new();
        let mut imported_names: HashSet<String> = HashSet::new();
        let mut includes = Vec::new();
        let mut revisions: Vec<Revision> = Vec::new();

        // Header phase; includes splice the submodule body into `body` so
        // the loop also covers merged statements
        let mut i = 0;
        while i < body.len() {
            let keyword = body[i].keyword.clone();
            match keyword.as_str() {
                "include" => {
                    let stmt = body[i].clone();
                    let merged = self.load_submodule(&stmt)?;
                    includes.push(self.ctx.dict().insert(stmt.arg()?));
                    body.extend(merged);
                }
                "namespace" => once_sym(self.ctx.dict(), &mut ns, &body[i], "module")?,
                "prefix" => {
                    let stmt = &body[i];
                    if prefix.is_some() {
                        bail!("line {}: \"prefix\" of module occurs twice", stmt.line);
                    }
                    let value = stmt.arg()?;
                    check_identifier(value, stmt.line)?;
                    prefix = Some(value.to_owned());
                    self.prefixes.insert(value.to_owned(), self.name.clone());
                }
                "yang-version" => {}
                "organization" => {
                    once_sym(self.ctx.dict(), &mut organization, &body[i], "module")?
                }
                "contact" => once_sym(self.ctx.dict(), &mut contact, &body[i], "module")?,
                "description" => {
                    once_sym(self.ctx.dict(), &mut description, &body[i], "module")?
                }
                "reference" => once_sym(self.ctx.dict(), &mut reference, &body[i], "module")?,
                "revision" => {
                    let revision = self.read_revision(&body[i])?;
                    revisions.push(revision);
                    // The first entry always holds the newest revision
                    let last = revisions.len() - 1;
                    if last > 0 {
                        let newest = self.ctx.dict().resolve(revisions[0].date);
                        let added = self.ctx.dict().resolve(revisions[last].date);
                        if newest < added {
                            revisions.swap(0, last);
                        }
                    }
                }
                "import" => {
                    let stmt = &body[i];
                    let line = stmt.line;
                    let module_name = stmt.arg()?.to_owned();
                    let import_prefix = stmt
                        .child("prefix")
                        .ok_or_else(|| {
                            anyhow!("line {line}: import of \"{module_name}\" has no prefix")
                        })?
                        .arg()?
                        .to_owned();
                    let revision = stmt
                        .child("revision-date")
                        .map(|r| r.arg().map(str::to_owned))
                        .transpose()?;
                    if !imported_names.insert(module_name.clone()) {
                        bail!("line {line}: importing module \"{module_name}\" repeatedly");
                    }
                    if self.prefixes.contains_key(&import_prefix) {
                        bail!("line {line}: prefix \"{import_prefix}\" already used");
                    }
                    let module = self
                        .ctx
                        .ensure_module_loaded(&module_name, revision.as_deref())
                        .with_context(|| format!("line {line}"))?;
                    imports.push(Import {
                        module,
                        prefix: self.ctx.dict().insert(&import_prefix),
                        revision: revision.map(|r| self.ctx.dict().insert(&r)),
                    });
                    self.prefixes.insert(import_prefix, module_name);
                }
                "belongs-to" => {} // validated when the submodule was merged
                _ => {}
            }
            i += 1;
        }

        let ns = ns.ok_or_else(|| anyhow!("module \"{}\" has no namespace", self.name))?;
        let prefix = prefix.ok_or_else(|| anyhow!("module \"{}\" has no prefix", self.name))?;
        let module = Module {
            name: self.ctx.dict().insert(&self.name),
            ns,
            prefix: self.ctx.dict().insert(&prefix),
            organization,
            contact,
            description,
            reference,
            imports,
            includes,
            revisions,
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            data: Vec::new(),
        };
        self.id = self.ctx.push_module(module);

        self.build_features(&body)?;
        self.build_identities(&body)?;

        // Typedefs may sit at any structural level; hoist them into module
        // scope and resolve them before any leaf needs one
        let mut typedef_stmts = Vec::new();
        collect_typedefs(&body, &mut typedef_stmts);
        let mut raw_typedefs: HashMap<String, &Ystmt> = HashMap::new();
        for stmt in typedef_stmts {
            let name = stmt.arg()?.to_owned();
            check_identifier(&name, stmt.line)?;
            if raw_typedefs.insert(name.clone(), stmt).is_some() {
                bail!("line {}: typedef \"{name}\" occurs twice", stmt.line);
            }
        }
        let names: Vec<String> = raw_typedefs.keys().cloned().collect();
        for name in names {
            self.typedef_for(&name, &raw_typedefs, &mut Vec::new())?;
        }

        // Schema node tree
        let mut created = Vec::new();
        for stmt in &body {
            if is_schema_keyword(&stmt.keyword) {
                self.build_snode(stmt, None, &raw_typedefs, &mut created)?;
            } else if stmt.keyword == "case" {
                bail!("line {}: \"case\" is only valid inside a choice", stmt.line);
            }
        }
        self.bind_uses(&created)?;

        Ok(self.id)
    }

    /// Loads a submodule named by an `include`, checks its `belongs-to`, and
    /// returns its body statements for merging
    fn load_submodule(&mut self, stmt: &Ystmt) -> Result<Vec<Ystmt>> {
        let name = stmt.arg()?;
        let line = stmt.line;
        let revision = stmt
            .child("revision-date")
            .map(|r| r.arg().map(str::to_owned))
            .transpose()?;
        let source = self
            .ctx
            .read_module_file(name, revision.as_deref())
            .with_context(|| format!("line {line}: including \"{name}\" failed"))?;
        let sub = match text::parse_text(&source) {
            Ok(sub) => sub,
            Err(e) => bail!("line {line}: including \"{name}\" failed:\n{e}"),
        };
        if sub.keyword != "submodule" {
            bail!("line {line}: \"{name}\" is not a submodule");
        }
        let belongs = sub
            .child("belongs-to")
            .ok_or_else(|| anyhow!("line {line}: submodule \"{name}\" has no belongs-to"))?;
        if belongs.arg()? != self.name {
            bail!(
                "line {line}: submodule \"{name}\" belongs to \"{}\", not \"{}\"",
                belongs.arg()?,
                self.name
            );
        }
        if let Some(sub_prefix) = belongs.child("prefix") {
            self.prefixes
                .insert(sub_prefix.arg()?.to_owned(), self.name.clone());
        }
        Ok(sub
            .children
            .into_iter()
            .filter(|c| !matches!(c.keyword.as_str(), "belongs-to" | "yang-version"))
            .collect())
    }

    fn read_revision(&self, stmt: &Ystmt) -> Result<Revision> {
        let mut description = None;
        let mut reference = None;
        for c in &stmt.children {
            match c.keyword.as_str() {
                "description" => once_sym(self.ctx.dict(), &mut description, c, "revision")?,
                "reference" => once_sym(self.ctx.dict(), &mut reference, c, "revision")?,
                _ => {}
            }
        }
        Ok(Revision {
            date: self.ctx.dict().insert(stmt.arg()?),
            description,
            reference,
        })
    }

    fn build_features(&mut self, body: &[Ystmt]) -> Result<()> {
        // Features may depend on features declared later; create them all
        // before resolving any if-feature
        let mut pending: Vec<(u32, Vec<(String, u32)>)> = Vec::new();
        for stmt in body.iter().filter(|s| s.keyword == "feature") {
            let name = stmt.arg()?;
            check_identifier(name, stmt.line)?;
            if self.feature_names.contains_key(name) {
                bail!("line {}: feature \"{name}\" occurs twice", stmt.line);
            }
            let mut feature = Feature {
                name: self.ctx.dict().insert(name),
                if_features: Vec::new(),
                status: Status::default(),
                description: None,
                reference: None,
                enabled: false,
            };
            let mut raw_ifs = Vec::new();
            for c in &stmt.children {
                match c.keyword.as_str() {
                    "if-feature" => {
                        raw_ifs.push((self.transform_expr(c.arg()?, c.line)?, c.line))
                    }
                    "status" => feature.status = read_status(c)?,
                    "description" => {
                        once_sym(self.ctx.dict(), &mut feature.description, c, "feature")?
                    }
                    "reference" => {
                        once_sym(self.ctx.dict(), &mut feature.reference, c, "feature")?
                    }
                    _ => {}
                }
            }
            let index = self.ctx.module(self.id).features.len() as u32;
            self.feature_names.insert(name.to_owned(), index);
            self.ctx.module_mut(self.id).features.push(feature);
            pending.push((index, raw_ifs));
        }
        for (index, raw_ifs) in pending {
            let mut refs = Vec::new();
            for (raw, line) in raw_ifs {
                refs.push(self.resolve_feature_ref(&raw, line)?);
            }
            self.ctx.module_mut(self.id).features[index as usize].if_features = refs;
        }
        Ok(())
    }

    fn resolve_feature_ref(&self, qualified: &str, line: u32) -> Result<FeatureRef> {
        let (module_name, local) = split_qualified(qualified);
        match module_name {
            None => {}
            Some(m) if m == self.name => {}
            Some(m) => {
                let module = self
                    .ctx
                    .module_by_name(m)
                    .ok_or_else(|| anyhow!("line {line}: module \"{m}\" is not loaded"))?;
                let sym = self.ctx.dict().find(local);
                let index = self
                    .ctx
                    .module(module)
                    .features
                    .iter()
                    .position(|f| Some(f.name) == sym)
                    .ok_or_else(|| {
                        anyhow!("line {line}: feature \"{qualified}\" does not exist")
                    })?;
                return Ok(FeatureRef {
                    module,
                    index: index as u32,
                });
            }
        }
        let index = *self
            .feature_names
            .get(local)
            .ok_or_else(|| anyhow!("line {line}: feature \"{local}\" does not exist"))?;
        Ok(FeatureRef {
            module: self.id,
            index,
        })
    }

    fn build_identities(&mut self, body: &[Ystmt]) -> Result<()> {
        // Bases may point forward or across modules; create first, bind after
        let mut pending: Vec<(IdentityId, String, u32)> = Vec::new();
        for stmt in body.iter().filter(|s| s.keyword == "identity") {
            let name = stmt.arg()?;
            check_identifier(name, stmt.line)?;
            if self.identity_names.contains_key(name) {
                bail!("line {}: identity \"{name}\" occurs twice", stmt.line);
            }
            let mut identity = Identity {
                name: self.ctx.dict().insert(name),
                module: self.id,
                base: None,
                status: Status::default(),
                description: None,
                reference: None,
            };
            let mut base = None;
            for c in &stmt.children {
                match c.keyword.as_str() {
                    "base" => {
                        if base.is_some() {
                            bail!("line {}: \"base\" of identity occurs twice", c.line);
                        }
                        base = Some((self.transform_expr(c.arg()?, c.line)?, c.line));
                    }
                    "status" => identity.status = read_status(c)?,
                    "description" => {
                        once_sym(self.ctx.dict(), &mut identity.description, c, "identity")?
                    }
                    "reference" => {
                        once_sym(self.ctx.dict(), &mut identity.reference, c, "identity")?
                    }
                    _ => {}
                }
            }
            let id = self.ctx.push_identity(identity);
            self.ctx.module_mut(self.id).identities.push(id);
            self.identity_names.insert(name.to_owned(), id);
            if let Some((raw, line)) = base {
                pending.push((id, raw, line));
            }
        }
        for (id, raw, line) in pending {
            let base = self
                .resolve_identity_name(&raw)
                .ok_or_else(|| anyhow!("line {line}: unknown identity \"{raw}\""))?;
            self.ctx.identity_mut(id).base = Some(base);
        }
        Ok(())
    }

    fn resolve_identity_name(&self, qualified: &str) -> Option<IdentityId> {
        let (module_name, local) = split_qualified(qualified);
        match module_name {
            None => self.identity_names.get(local).copied(),
            Some(m) if m == self.name => self.identity_names.get(local).copied(),
            Some(m) => {
                let module = self.ctx.module_by_name(m)?;
                self.ctx.find_identity(module, local)
            }
        }
    }

    fn typedef_for(
        &mut self,
        name: &str,
        raws: &HashMap<String, &Ystmt>,
        in_progress: &mut Vec<String>,
    ) -> Result<TypedefId> {
        if let Some(&id) = self.typedef_names.get(name) {
            return Ok(id);
        }
        let stmt = *raws
            .get(name)
            .ok_or_else(|| anyhow!("unknown type \"{name}\" in module \"{}\"", self.name))?;
        if in_progress.iter().any(|n| n == name) {
            bail!(
                "line {}: circular typedef chain through \"{name}\"",
                stmt.line
            );
        }
        in_progress.push(name.to_owned());
        let type_stmt = stmt
            .child("type")
            .ok_or_else(|| anyhow!("line {}: typedef \"{name}\" has no type", stmt.line))?;
        let typ = self.resolve_type(type_stmt, raws, in_progress);
        in_progress.pop();
        let typ = typ?;

        let mut units = None;
        let mut default = None;
        let mut status = Status::default();
        let mut description = None;
        let mut reference = None;
        for c in &stmt.children {
            match c.keyword.as_str() {
                "units" => once_sym(self.ctx.dict(), &mut units, c, "typedef")?,
                "default" => once_sym(self.ctx.dict(), &mut default, c, "typedef")?,
                "status" => status = read_status(c)?,
                "description" => once_sym(self.ctx.dict(), &mut description, c, "typedef")?,
                "reference" => once_sym(self.ctx.dict(), &mut reference, c, "typedef")?,
                _ => {}
            }
        }
        let id = self.ctx.push_typedef(Typedef {
            name: self.ctx.dict().insert(name),
            module: self.id,
            typ,
            units,
            default,
            status,
            description,
            reference,
        });
        self.ctx.module_mut(self.id).typedefs.push(id);
        self.typedef_names.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Resolves a `type` statement to its built-in base and refinement record
    fn resolve_type(
        &mut self,
        stmt: &Ystmt,
        raws: &HashMap<String, &Ystmt>,
        in_progress: &mut Vec<String>,
    ) -> Result<Type> {
        let arg = stmt.arg()?;
        let line = stmt.line;
        let (prefix, local) = split_qualified(arg);
        check_identifier(local, line)?;

        let (typedef, base) = self.lookup_type(prefix, local, line, raws, in_progress)?;

        let mut length = None;
        let mut range = None;
        let mut patterns = Vec::new();
        let mut raw_bits = Vec::new();
        let mut raw_enums = Vec::new();
        let mut fraction_digits = None;
        let mut path = None;
        let mut base_ident = None;
        let mut branch_stmts = Vec::new();
        let mut present: Vec<&'static str> = Vec::new();
        for c in &stmt.children {
            match c.keyword.as_str() {
                "length" => {
                    if length.is_some() {
                        bail!("line {}: \"length\" of type occurs twice", c.line);
                    }
                    length = Some(self.read_restriction(c)?);
                    present.push("length");
                }
                "range" => {
                    if range.is_some() {
                        bail!("line {}: \"range\" of type occurs twice", c.line);
                    }
                    range = Some(self.read_restriction(c)?);
                    present.push("range");
                }
                "pattern" => {
                    patterns.push(self.read_pattern(c)?);
                    if !present.contains(&"pattern") {
                        present.push("pattern");
                    }
                }
                "bit" => {
                    raw_bits.push(c);
                    if !present.contains(&"bit") {
                        present.push("bit");
                    }
                }
                "enum" => {
                    raw_enums.push(c);
                    if !present.contains(&"enum") {
                        present.push("enum");
                    }
                }
                "fraction-digits" => {
                    if fraction_digits.is_some() {
                        bail!("line {}: \"fraction-digits\" of type occurs twice", c.line);
                    }
                    let digits: u8 = c
                        .arg()?
                        .parse()
                        .ok()
                        .filter(|d| (1..=18).contains(d))
                        .ok_or_else(|| {
                            anyhow!(
                                "line {}: invalid fraction-digits \"{}\"",
                                c.line,
                                c.arg().unwrap_or("")
                            )
                        })?;
                    fraction_digits = Some(digits);
                    present.push("fraction-digits");
                }
                "path" => {
                    if path.is_some() {
                        bail!("line {}: \"path\" of type occurs twice", c.line);
                    }
                    let expr = self.transform_expr(c.arg()?, c.line)?;
                    xpath::syntax_check(&expr, c.line)?;
                    path = Some(self.ctx.dict().insert(&expr));
                    present.push("path");
                }
                "base" => {
                    if base_ident.is_some() {
                        bail!("line {}: \"base\" of type occurs twice", c.line);
                    }
                    let qualified = self.transform_expr(c.arg()?, c.line)?;
                    let resolved = self.resolve_identity_name(&qualified).ok_or_else(|| {
                        anyhow!("line {}: unknown identity \"{qualified}\"", c.line)
                    })?;
                    base_ident = Some(resolved);
                    present.push("base");
                }
                "type" => {
                    branch_stmts.push(c);
                    if !present.contains(&"type") {
                        present.push("type");
                    }
                }
                "require-instance" => {}
                kw if kw.contains(':') => {} // extension statements are opaque
                kw => bail!("line {}: unexpected \"{kw}\" in type", c.line),
            }
        }

        let direct = typedef.is_none();
        let allowed: &[&str] = match (base, direct) {
            (TypeBase::String, _) => &["length", "pattern"],
            (TypeBase::Binary, _) => &["length"],
            (TypeBase::Dec64, true) => &["range", "fraction-digits"],
            (TypeBase::Dec64, false) => &["range"],
            (TypeBase::Enum, true) => &["enum"],
            (TypeBase::Bits, true) => &["bit"],
            (TypeBase::Identityref, true) => &["base"],
            (TypeBase::Leafref, true) => &["path"],
            (TypeBase::Union, true) => &["type"],
            (
                TypeBase::Int8
                | TypeBase::Int16
                | TypeBase::Int32
                | TypeBase::Int64
                | TypeBase::Uint8
                | TypeBase::Uint16
                | TypeBase::Uint32
                | TypeBase::Uint64,
                _,
            ) => &["range"],
            _ => &[],
        };
        for facet in &present {
            if !allowed.contains(facet) {
                bail!(
                    "line {line}: \"{facet}\" restriction is not valid for type \"{}\"",
                    base.name()
                );
            }
        }

        let spec = match base {
            TypeBase::String if length.is_some() || !patterns.is_empty() => TypeSpec::String {
                length,
                patterns,
            },
            TypeBase::Binary if length.is_some() => TypeSpec::Binary { length },
            TypeBase::Dec64 if direct => {
                let fraction_digits = fraction_digits.ok_or_else(|| {
                    anyhow!("line {line}: decimal64 requires \"fraction-digits\"")
                })?;
                TypeSpec::Dec64 {
                    fraction_digits,
                    range,
                }
            }
            TypeBase::Dec64 if range.is_some() => TypeSpec::Numeric { range },
            TypeBase::Enum if direct => {
                if raw_enums.is_empty() {
                    bail!("line {line}: enumeration requires at least one \"enum\"");
                }
                TypeSpec::Enum {
                    enums: self.read_enums(&raw_enums)?,
                }
            }
            TypeBase::Bits if direct => {
                if raw_bits.is_empty() {
                    bail!("line {line}: bits requires at least one \"bit\"");
                }
                TypeSpec::Bits {
                    bits: self.read_bits(&raw_bits)?,
                }
            }
            TypeBase::Identityref if direct => TypeSpec::Identityref {
                base: base_ident
                    .ok_or_else(|| anyhow!("line {line}: identityref requires \"base\""))?,
            },
            TypeBase::Leafref if direct => TypeSpec::Leafref {
                path: path.ok_or_else(|| anyhow!("line {line}: leafref requires \"path\""))?,
            },
            TypeBase::Union if direct => {
                if branch_stmts.is_empty() {
                    bail!("line {line}: union requires at least one member type");
                }
                let mut branches = Vec::new();
                for branch in branch_stmts {
                    branches.push(self.resolve_type(branch, raws, in_progress)?);
                }
                TypeSpec::Union { branches }
            }
            _ if range.is_some() => TypeSpec::Numeric { range },
            _ => TypeSpec::None,
        };

        let ty = Type {
            base,
            typedef,
            spec,
        };
        if ty.spec.restriction().is_some() {
            // Reject interval expressions that could never validate a value
            self.ctx
                .effective_intervals(&ty)
                .with_context(|| format!("line {line}"))?;
        }
        Ok(ty)
    }

    fn lookup_type(
        &mut self,
        prefix: Option<&str>,
        local: &str,
        line: u32,
        raws: &HashMap<String, &Ystmt>,
        in_progress: &mut Vec<String>,
    ) -> Result<(Option<TypedefId>, TypeBase)> {
        let own = match prefix {
            None => {
                if let Some(builtin) = TypeBase::from_name(local) {
                    return Ok((None, builtin));
                }
                true
            }
            Some(p) => {
                let module_name = self
                    .prefixes
                    .get(p)
                    .ok_or_else(|| anyhow!("line {line}: prefix \"{p}\" is not defined"))?;
                if *module_name == self.name {
                    true
                } else {
                    let module_name = module_name.clone();
                    let module = self
                        .ctx
                        .module_by_name(&module_name)
                        .ok_or_else(|| anyhow!("line {line}: module \"{module_name}\" is not loaded"))?;
                    let sym = self.ctx.dict().find(local);
                    let td = self
                        .ctx
                        .module(module)
                        .typedefs
                        .iter()
                        .copied()
                        .find(|&td| Some(self.ctx.typedef(td).name) == sym)
                        .ok_or_else(|| {
                            anyhow!("line {line}: unknown type \"{local}\" in module \"{module_name}\"")
                        })?;
                    return Ok((Some(td), self.ctx.typedef(td).typ.base));
                }
            }
        };
        debug_assert!(own);
        let td = self
            .typedef_for(local, raws, in_progress)
            .with_context(|| format!("line {line}"))?;
        Ok((Some(td), self.ctx.typedef(td).typ.base))
    }

    fn read_restriction(&self, stmt: &Ystmt) -> Result<Restriction> {
        let mut restriction = Restriction {
            expr: self.ctx.dict().insert(stmt.arg()?),
            error_message: None,
            error_app_tag: None,
            description: None,
            reference: None,
        };
        for c in &stmt.children {
            match c.keyword.as_str() {
                "error-message" => {
                    once_sym(self.ctx.dict(), &mut restriction.error_message, c, &stmt.keyword)?
                }
                "error-app-tag" => {
                    once_sym(self.ctx.dict(), &mut restriction.error_app_tag, c, &stmt.keyword)?
                }
                "description" => {
                    once_sym(self.ctx.dict(), &mut restriction.description, c, &stmt.keyword)?
                }
                "reference" => {
                    once_sym(self.ctx.dict(), &mut restriction.reference, c, &stmt.keyword)?
                }
                _ => {}
            }
        }
        Ok(restriction)
    }

    fn read_pattern(&self, stmt: &Ystmt) -> Result<Pattern> {
        let expr = stmt.arg()?;
        // Compile-check the anchored form now so the value decoder can treat
        // a later failure as internal
        regex::Regex::new(&anchored_pattern(expr))
            .map_err(|e| anyhow!("line {}: invalid pattern \"{expr}\": {e}", stmt.line))?;
        let mut pattern = Pattern {
            expr: self.ctx.dict().insert(expr),
            error_message: None,
            error_app_tag: None,
        };
        for c in &stmt.children {
            match c.keyword.as_str() {
                "error-message" => {
                    once_sym(self.ctx.dict(), &mut pattern.error_message, c, "pattern")?
                }
                "error-app-tag" => {
                    once_sym(self.ctx.dict(), &mut pattern.error_app_tag, c, "pattern")?
                }
                _ => {}
            }
        }
        Ok(pattern)
    }

    fn read_enums(&self, stmts: &[&Ystmt]) -> Result<Vec<EnumDef>> {
        let mut enums: Vec<EnumDef> = Vec::new();
        let mut next = 0i32;
        for stmt in stmts {
            let name = stmt.arg()?;
            if name.is_empty() || name.trim() != name {
                bail!("line {}: invalid enum name \"{name}\"", stmt.line);
            }
            let name = self.ctx.dict().insert(name);
            if enums.iter().any(|e| e.name == name) {
                bail!("line {}: duplicated enum name", stmt.line);
            }
            let mut description = None;
            let mut value = None;
            for c in &stmt.children {
                match c.keyword.as_str() {
                    "value" => {
                        value = Some(c.arg()?.parse::<i32>().map_err(|_| {
                            anyhow!("line {}: invalid enum value \"{}\"", c.line, c.arg().unwrap_or(""))
                        })?)
                    }
                    "description" => once_sym(self.ctx.dict(), &mut description, c, "enum")?,
                    _ => {}
                }
            }
            let value = value.unwrap_or(next);
            if enums.iter().any(|e| e.value == value) {
                bail!("line {}: duplicated enum value {value}", stmt.line);
            }
            next = value.saturating_add(1);
            enums.push(EnumDef {
                name,
                value,
                description,
            });
        }
        Ok(enums)
    }

    fn read_bits(&self, stmts: &[&Ystmt]) -> Result<Vec<BitDef>> {
        let mut bits: Vec<BitDef> = Vec::new();
        let mut next = 0u32;
        for stmt in stmts {
            let name = stmt.arg()?;
            check_identifier(name, stmt.line)?;
            let name = self.ctx.dict().insert(name);
            if bits.iter().any(|b| b.name == name) {
                bail!("line {}: duplicated bit name", stmt.line);
            }
            let mut description = None;
            let mut position = None;
            for c in &stmt.children {
                match c.keyword.as_str() {
                    "position" => {
                        position = Some(c.arg()?.parse::<u32>().map_err(|_| {
                            anyhow!("line {}: invalid bit position", c.line)
                        })?)
                    }
                    "description" => once_sym(self.ctx.dict(), &mut description, c, "bit")?,
                    _ => {}
                }
            }
            let position = position.unwrap_or(next);
            if bits.iter().any(|b| b.position == position) {
                bail!("line {}: duplicated bit position {position}", stmt.line);
            }
            next = position.saturating_add(1);
            bits.push(BitDef {
                name,
                position,
                description,
            });
        }
        Ok(bits)
    }

    fn read_must(&self, stmt: &Ystmt) -> Result<Must> {
        let expr = self.transform_expr(stmt.arg()?, stmt.line)?;
        xpath::syntax_check(&expr, stmt.line)?;
        let mut must = Must {
            expr: self.ctx.dict().insert(&expr),
            error_message: None,
            error_app_tag: None,
            description: None,
            reference: None,
        };
        for c in &stmt.children {
            match c.keyword.as_str() {
                "error-message" => {
                    once_sym(self.ctx.dict(), &mut must.error_message, c, "must")?
                }
                "error-app-tag" => {
                    once_sym(self.ctx.dict(), &mut must.error_app_tag, c, "must")?
                }
                "description" => once_sym(self.ctx.dict(), &mut must.description, c, "must")?,
                "reference" => once_sym(self.ctx.dict(), &mut must.reference, c, "must")?,
                _ => {}
            }
        }
        Ok(must)
    }

    fn build_snode(
        &mut self,
        stmt: &Ystmt,
        parent: Option<SnodeId>,
        raws: &HashMap<String, &Ystmt>,
        created: &mut Vec<SnodeId>,
    ) -> Result<SnodeId> {
        let kw = stmt.keyword.as_str();
        let line = stmt.line;
        let arg = stmt.arg()?;
        let name = if kw == "uses" {
            // A uses node is named after the grouping it references
            self.transform_expr(arg, line)?
        } else {
            check_identifier(arg, line)?;
            arg.to_owned()
        };

        let mut config = None;
        let mut mandatory = false;
        let mut user_ordered = false;
        let mut status = Status::default();
        let mut when = None;
        let mut musts = Vec::new();
        let mut if_features = Vec::new();
        let mut description = None;
        let mut reference = None;
        let mut presence = None;
        let mut key_arg: Option<(String, u32)> = None;
        let mut raw_uniques: Vec<(String, u32)> = Vec::new();
        let mut min_elements = None;
        let mut max_elements = None;
        let mut default = None;
        let mut units = None;
        let mut type_stmt = None;

        for c in &stmt.children {
            match c.keyword.as_str() {
                "config" => {
                    if config.is_some() {
                        bail!("line {}: \"config\" of {kw} occurs twice", c.line);
                    }
                    config = Some(read_bool(c)?);
                }
                "status" => status = read_status(c)?,
                "description" => once_sym(self.ctx.dict(), &mut description, c, kw)?,
                "reference" => once_sym(self.ctx.dict(), &mut reference, c, kw)?,
                "when" => {
                    if when.is_some() {
                        bail!("line {}: \"when\" of {kw} occurs twice", c.line);
                    }
                    let expr = self.transform_expr(c.arg()?, c.line)?;
                    xpath::syntax_check(&expr, c.line)?;
                    when = Some(self.ctx.dict().insert(&expr));
                }
                "must" => musts.push(self.read_must(c)?),
                "if-feature" => {
                    let raw = self.transform_expr(c.arg()?, c.line)?;
                    if_features.push(self.resolve_feature_ref(&raw, c.line)?);
                }
                "presence" => {
                    if kw != "container" {
                        bail!("line {}: \"presence\" is only valid in a container", c.line);
                    }
                    once_sym(self.ctx.dict(), &mut presence, c, kw)?;
                }
                "key" => {
                    if kw != "list" {
                        bail!("line {}: \"key\" is only valid in a list", c.line);
                    }
                    if key_arg.is_some() {
                        bail!("line {}: \"key\" of list occurs twice", c.line);
                    }
                    key_arg = Some((c.arg()?.to_owned(), c.line));
                }
                "unique" => {
                    if kw != "list" {
                        bail!("line {}: \"unique\" is only valid in a list", c.line);
                    }
                    raw_uniques.push((c.arg()?.to_owned(), c.line));
                }
                "min-elements" => {
                    if !matches!(kw, "list" | "leaf-list") {
                        bail!("line {}: \"min-elements\" is not valid in a {kw}", c.line);
                    }
                    if min_elements.is_some() {
                        bail!("line {}: \"min-elements\" of {kw} occurs twice", c.line);
                    }
                    min_elements = Some(read_u32(c)?);
                }
                "max-elements" => {
                    if !matches!(kw, "list" | "leaf-list") {
                        bail!("line {}: \"max-elements\" is not valid in a {kw}", c.line);
                    }
                    if max_elements.is_some() {
                        bail!("line {}: \"max-elements\" of {kw} occurs twice", c.line);
                    }
                    max_elements = Some(read_u32(c)?);
                }
                "ordered-by" => {
                    if !matches!(kw, "list" | "leaf-list") {
                        bail!("line {}: \"ordered-by\" is not valid in a {kw}", c.line);
                    }
                    user_ordered = match c.arg()? {
                        "user" => true,
                        "system" => false,
                        other => bail!("line {}: invalid ordered-by \"{other}\"", c.line),
                    };
                }
                "mandatory" => {
                    if !matches!(kw, "leaf" | "anyxml" | "choice") {
                        bail!("line {}: \"mandatory\" is not valid in a {kw}", c.line);
                    }
                    mandatory = read_bool(c)?;
                }
                "default" => {
                    if !matches!(kw, "leaf" | "choice") {
                        bail!("line {}: \"default\" is not valid in a {kw}", c.line);
                    }
                    once_sym(self.ctx.dict(), &mut default, c, kw)?;
                }
                "units" => {
                    if !matches!(kw, "leaf" | "leaf-list") {
                        bail!("line {}: \"units\" is not valid in a {kw}", c.line);
                    }
                    once_sym(self.ctx.dict(), &mut units, c, kw)?;
                }
                "type" => {
                    if !matches!(kw, "leaf" | "leaf-list") {
                        bail!("line {}: \"type\" is not valid in a {kw}", c.line);
                    }
                    if type_stmt.is_some() {
                        bail!("line {}: \"type\" of {kw} occurs twice", c.line);
                    }
                    type_stmt = Some(c);
                }
                "typedef" => {} // hoisted to module scope
                other if is_schema_keyword(other) || other == "case" => {}
                other if other.contains(':') => {} // extension statements
                other => {
                    tracing::warn!("line {}: skipping unsupported \"{other}\" in {kw}", c.line);
                }
            }
        }

        let kind = match kw {
            "container" => SnodeKind::Container { presence },
            "list" => SnodeKind::List {
                keys: Vec::new(),
                unique: Vec::new(),
                min_elements,
                max_elements,
            },
            "leaf" => SnodeKind::Leaf {
                typ: self.resolve_type(
                    type_stmt
                        .ok_or_else(|| anyhow!("line {line}: leaf \"{name}\" has no type"))?,
                    raws,
                    &mut Vec::new(),
                )?,
                default,
                units,
            },
            "leaf-list" => SnodeKind::LeafList {
                typ: self.resolve_type(
                    type_stmt
                        .ok_or_else(|| anyhow!("line {line}: leaf-list \"{name}\" has no type"))?,
                    raws,
                    &mut Vec::new(),
                )?,
                min_elements,
                max_elements,
                units,
            },
            "anyxml" => SnodeKind::Anyxml,
            "choice" => SnodeKind::Choice { default },
            "case" => SnodeKind::Case,
            "grouping" => SnodeKind::Grouping,
            "uses" => SnodeKind::Uses { grouping: None },
            other => bail!("line {line}: unexpected \"{other}\" statement"),
        };

        let id = self.ctx.push_snode(Snode {
            name: self.ctx.dict().insert(&name),
            module: self.id,
            parent,
            children: Vec::new(),
            config,
            mandatory,
            user_ordered,
            status,
            when,
            musts,
            if_features,
            description,
            reference,
            kind,
        });
        created.push(id);
        match parent {
            Some(p) => self.ctx.snode_mut(p).children.push(id),
            None => self.ctx.module_mut(self.id).data.push(id),
        }

        // Children
        for c in &stmt.children {
            let child_kw = c.keyword.as_str();
            if !(is_schema_keyword(child_kw) || child_kw == "case") {
                continue;
            }
            if matches!(kw, "leaf" | "leaf-list" | "anyxml" | "uses") {
                bail!("line {}: a {kw} cannot have child schema nodes", c.line);
            }
            if child_kw == "case" && kw != "choice" {
                bail!("line {}: \"case\" is only valid inside a choice", c.line);
            }
            self.build_snode(c, Some(id), raws, created)?;
        }

        if kw == "list" {
            let mut keys = Vec::new();
            if let Some((key_names, key_line)) = key_arg {
                for key_name in key_names.split_whitespace() {
                    let key_sym = self.ctx.dict().insert(key_name);
                    let child = self
                        .ctx
                        .snode(id)
                        .children
                        .iter()
                        .copied()
                        .find(|&c| {
                            self.ctx.snode(c).name == key_sym
                                && matches!(self.ctx.snode(c).kind, SnodeKind::Leaf { .. })
                        })
                        .ok_or_else(|| {
                            anyhow!(
                                "line {key_line}: key \"{key_name}\" is not a leaf child of list \"{name}\""
                            )
                        })?;
                    if keys.contains(&child) {
                        bail!("line {key_line}: key \"{key_name}\" occurs twice");
                    }
                    keys.push(child);
                }
            }
            let mut unique = Vec::new();
            for (raw, uline) in raw_uniques {
                let mut tuple = Vec::new();
                for part in raw.split_whitespace() {
                    let sym = self.ctx.dict().insert(part);
                    if tuple.contains(&sym) {
                        bail!(
                            "line {uline}: repeated \"{part}\" in unique; the identifier is not unique"
                        );
                    }
                    tuple.push(sym);
                }
                if tuple.is_empty() {
                    bail!("line {uline}: empty \"unique\" argument");
                }
                unique.push(tuple);
            }
            if let SnodeKind::List {
                keys: k, unique: u, ..
            } = &mut self.ctx.snode_mut(id).kind
            {
                *k = keys;
                *u = unique;
            }
        }

        Ok(id)
    }

    /// Binds every `uses` node created for this module to its grouping
    fn bind_uses(&mut self, created: &[SnodeId]) -> Result<()> {
        for &id in created {
            if !matches!(self.ctx.snode(id).kind, SnodeKind::Uses { .. }) {
                continue;
            }
            let qualified = self
                .ctx
                .dict()
                .resolve(self.ctx.snode(id).name)
                .to_owned();
            let grouping = self
                .resolve_grouping(id, &qualified)
                .ok_or_else(|| anyhow!("no grouping found for uses \"{qualified}\""))?;
            if let SnodeKind::Uses { grouping: g } = &mut self.ctx.snode_mut(id).kind {
                *g = Some(grouping);
            }
        }
        Ok(())
    }

    fn resolve_grouping(&self, uses: SnodeId, qualified: &str) -> Option<SnodeId> {
        let (module_name, local) = split_qualified(qualified);
        let sym = self.ctx.dict().find(local)?;
        if let Some(m) = module_name {
            if m != self.name {
                let module = self.ctx.module_by_name(m)?;
                return self.find_grouping(&self.ctx.module(module).data, sym);
            }
        }
        // Groupings are visible from their own level outward
        let mut scope = self.ctx.snode(uses).parent;
        loop {
            let children = match scope {
                Some(s) => &self.ctx.snode(s).children,
                None => &self.ctx.module(self.id).data,
            };
            if let Some(found) = self.find_grouping(children, sym) {
                return Some(found);
            }
            match scope {
                Some(s) => scope = self.ctx.snode(s).parent,
                None => return None,
            }
        }
    }

    fn find_grouping(&self, children: &[SnodeId], name: Sym) -> Option<SnodeId> {
        children.iter().copied().find(|&c| {
            matches!(self.ctx.snode(c).kind, SnodeKind::Grouping)
                && self.ctx.snode(c).name == name
        })
    }

    /// Rewrites `prefix:name` occurrences to `module-name:name` using this
    /// module's prefix bindings
    fn transform_expr(&self, value: &str, line: u32) -> Result<String> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        loop {
            let Some(col) = rest.find(':') else {
                out.push_str(rest);
                return Ok(out);
            };
            let before = &rest[..col];
            let start = before
                .rfind(['/', ' ', '['])
                .map(|i| i + 1)
                .unwrap_or(0);
            let prefix = &before[start..];
            let ok = identifier_len(prefix);
            if prefix.is_empty() || ok < prefix.len() {
                let bad = prefix[ok..].chars().next().unwrap_or(':');
                bail!("line {line}: invalid character \"{bad}\" in \"{value}\"");
            }
            let module = self.prefixes.get(prefix).ok_or_else(|| {
                anyhow!(
                    "line {line}: prefix \"{prefix}\" is not defined in module \"{}\"",
                    self.name
                )
            })?;
            out.push_str(&rest[..start]);
            out.push_str(module);
            out.push(':');
            rest = &rest[col + 1..];
        }
    }
}

fn collect_typedefs<'a>(body: &'a [Ystmt], out: &mut Vec<&'a Ystmt>) {
    for stmt in body {
        if stmt.keyword == "typedef" {
            out.push(stmt);
        }
        if matches!(
            stmt.keyword.as_str(),
            "container" | "list" | "grouping" | "choice" | "case"
        ) {
            collect_typedefs(&stmt.children, out);
        }
    }
}

fn is_schema_keyword(keyword: &str) -> bool {
    matches!(
        keyword,
        "container" | "list" | "leaf" | "leaf-list" | "anyxml" | "choice" | "grouping" | "uses"
    )
}

fn once_sym(dict: &Dict, target: &mut Option<Sym>, stmt: &Ystmt, what: &str) -> Result<()> {
    if target.is_some() {
        bail!(
            "line {}: \"{}\" of {what} occurs twice",
            stmt.line,
            stmt.keyword
        );
    }
    *target = Some(dict.insert(stmt.arg()?));
    Ok(())
}

fn read_status(stmt: &Ystmt) -> Result<Status> {
    Ok(match stmt.arg()? {
        "current" => Status::Current,
        "deprecated" => Status::Deprecated,
        "obsolete" => Status::Obsolete,
        other => bail!("line {}: invalid status \"{other}\"", stmt.line),
    })
}

fn read_bool(stmt: &Ystmt) -> Result<bool> {
    Ok(match stmt.arg()? {
        "true" => true,
        "false" => false,
        other => bail!(
            "line {}: invalid \"{}\" value \"{other}\"",
            stmt.line,
            stmt.keyword
        ),
    })
}

fn read_u32(stmt: &Ystmt) -> Result<u32> {
    stmt.arg()?
        .parse()
        .map_err(|_| anyhow!("line {}: invalid \"{}\" value", stmt.line, stmt.keyword))
}

fn check_identifier(value: &str, line: u32) -> Result<()> {
    let ok = identifier_len(value);
    if value.is_empty() || ok < value.len() {
        let bad = value[ok..].chars().next().unwrap_or('?');
        bail!("line {line}: invalid character \"{bad}\" in identifier \"{value}\"");
    }
    Ok(())
}

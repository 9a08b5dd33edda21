// promptmap/src/analyze.rs
//! Rust declaration analyzer: one `.rs` file in, records out.
//!
//! Walks the `syn` AST and maps it onto the container chain
//! `<prefix..> / <module> / <type>`:
//! - struct / enum / union / trait → container node
//! - impl methods, trait methods → `Method <ret> <name>(<params>) [<access>]`
//! - receiver-less fns returning `Self` → `Ctor <name>(<params>) [<access>]` (gated)
//! - named fields → `Field <type> <name> [<access>]`
//! - enum variants → `Variant <name> [<access>]`
//! - free fns → `Function <ret> <name>(<params>) [<access>]` on the module node
//!
//! `#[cfg(test)]` modules are skipped. Inline `mod x { .. }` extends the module id.

use std::{
    fmt, fs,
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use syn::{
    visit::Visit, Fields, FnArg, ImplItem, Item, ItemEnum, ItemFn, ItemImpl, ItemMod, ItemStruct,
    ItemTrait, ItemUnion, ReturnType, Signature, TraitItem, Type, Visibility,
};

use crate::{
    aggregate::{Emitter, Producer},
    helpers::{join_module, norm_tokens, rust_module_id},
    record::Record,
};

/// Gates applied while turning declarations into records.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Admit `restricted` and `private` members too.
    pub include_private: bool,
    /// Emit `Ctor` lines for receiver-less fns returning `Self`.
    pub include_ctors: bool,
}

/* ================================ Accessibility ================================ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Crate,
    Restricted,
    Private,
}

impl Access {
    pub fn of(vis: &Visibility) -> Self {
        match vis {
            Visibility::Public(_) => Access::Public,
            Visibility::Restricted(r) if r.path.is_ident("crate") => Access::Crate,
            Visibility::Restricted(_) => Access::Restricted,
            Visibility::Inherited => Access::Private,
        }
    }

    /// `public` and `crate` always pass; the rest only with `include_private`.
    pub fn passes(self, include_private: bool) -> bool {
        matches!(self, Access::Public | Access::Crate) || include_private
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Public => "public",
            Access::Crate => "crate",
            Access::Restricted => "restricted",
            Access::Private => "private",
        })
    }
}

/* ================================== Producer ================================== */

/// Producer for a single Rust source file.
#[derive(Clone, Debug)]
pub struct RustFileProducer {
    /// File to read.
    pub path: PathBuf,
    /// Path relative to the scan root; drives the module id and the label.
    pub rel_path: String,
    /// Segments above the module (e.g. project name).
    pub prefix: Vec<String>,
    pub opts: AnalyzeOptions,
}

impl Producer for RustFileProducer {
    fn label(&self) -> String {
        self.rel_path.clone()
    }

    fn produce(&self, emitter: &Emitter<'_>) -> Result<()> {
        let src = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        emitter.checkpoint()?;

        let module = rust_module_id(&self.rel_path);
        let records = analyze_source(&src, &self.prefix, &module, self.opts)
            .with_context(|| format!("analyze {}", self.rel_path))?;
        for r in records {
            emitter.emit(r)?;
        }
        Ok(())
    }
}

/// Parse `src` and collect records in declaration order.
pub fn analyze_source(src: &str, prefix: &[String], module: &str, opts: AnalyzeOptions) -> Result<Vec<Record>> {
    let file = syn::parse_file(src).map_err(|e| {
        let at = e.span().start();
        anyhow!("parse error at {}:{}: {}", at.line, at.column + 1, e)
    })?;
    let mut collector = DeclCollector {
        prefix,
        module: module.to_string(),
        opts,
        out: Vec::new(),
    };
    collector.visit_file(&file);
    Ok(collector.out)
}

/* ================================== Collector ================================== */

struct DeclCollector<'p> {
    prefix: &'p [String],
    module: String,
    opts: AnalyzeOptions,
    out: Vec<Record>,
}

impl<'ast> Visit<'ast> for DeclCollector<'_> {
    fn visit_item(&mut self, i: &'ast Item) {
        if item_attrs(i).is_some_and(is_cfg_test) {
            return;
        }
        match i {
            Item::Struct(s) => self.push_struct(s),
            Item::Enum(e) => self.push_enum(e),
            Item::Union(u) => self.push_union(u),
            Item::Trait(t) => self.push_trait(t),
            Item::Impl(imp) => self.push_impl(imp),
            Item::Fn(f) => self.push_free_fn(f),
            Item::Mod(m) => self.push_mod(m),
            _ => {}
        }
    }
}

impl DeclCollector<'_> {
    fn type_path(&self, name: &str) -> Vec<String> {
        let mut p = self.prefix.to_vec();
        p.push(self.module.clone());
        p.push(name.to_string());
        p
    }

    fn module_path(&self) -> Vec<String> {
        let mut p = self.prefix.to_vec();
        p.push(self.module.clone());
        p
    }

    fn member(&mut self, path: Vec<String>, access: Access, key: &str, line: String) {
        if access.passes(self.opts.include_private) {
            self.out.push(Record::member(path, line).with_sort_key(key));
        }
    }

    fn push_struct(&mut self, s: &ItemStruct) {
        let name = s.ident.to_string();
        self.out.push(Record::container(self.type_path(&name)));
        if let Fields::Named(named) = &s.fields {
            for f in &named.named {
                let Some(ident) = &f.ident else { continue };
                let field = ident.to_string();
                let line = format!("Field {} {} [{}]", norm_tokens(&f.ty), field, Access::of(&f.vis));
                self.member(self.type_path(&name), Access::of(&f.vis), &field, line);
            }
        }
    }

    fn push_union(&mut self, u: &ItemUnion) {
        let name = u.ident.to_string();
        self.out.push(Record::container(self.type_path(&name)));
        for f in &u.fields.named {
            let Some(ident) = &f.ident else { continue };
            let field = ident.to_string();
            let line = format!("Field {} {} [{}]", norm_tokens(&f.ty), field, Access::of(&f.vis));
            self.member(self.type_path(&name), Access::of(&f.vis), &field, line);
        }
    }

    fn push_enum(&mut self, e: &ItemEnum) {
        let name = e.ident.to_string();
        let access = Access::of(&e.vis);
        self.out.push(Record::container(self.type_path(&name)));
        for v in &e.variants {
            let variant = v.ident.to_string();
            let line = format!("Variant {variant} [{access}]");
            self.member(self.type_path(&name), access, &variant, line);
        }
    }

    fn push_trait(&mut self, t: &ItemTrait) {
        let name = t.ident.to_string();
        let access = Access::of(&t.vis);
        self.out.push(Record::container(self.type_path(&name)));
        for item in &t.items {
            if let TraitItem::Fn(m) = item {
                let method = m.sig.ident.to_string();
                let line = format!("Method {} [{access}]", signature(&m.sig));
                self.member(self.type_path(&name), access, &method, line);
            }
        }
    }

    fn push_impl(&mut self, imp: &ItemImpl) {
        let Some(ty_name) = self_type_name(&imp.self_ty) else { return };
        let in_trait_impl = imp.trait_.is_some();
        self.out.push(Record::container(self.type_path(&ty_name)));

        for item in &imp.items {
            let ImplItem::Fn(m) = item else { continue };
            // trait impl methods carry the trait's visibility
            let access = if in_trait_impl { Access::Public } else { Access::of(&m.vis) };
            let method = m.sig.ident.to_string();

            if is_ctor(&m.sig, &ty_name) {
                if !self.opts.include_ctors {
                    continue;
                }
                let line = format!("Ctor {}({}) [{access}]", method, params(&m.sig));
                self.member(self.type_path(&ty_name), access, &method, line);
            } else {
                let line = format!("Method {} [{access}]", signature(&m.sig));
                self.member(self.type_path(&ty_name), access, &method, line);
            }
        }
    }

    fn push_free_fn(&mut self, f: &ItemFn) {
        if f.attrs.iter().any(is_test_attr) {
            return;
        }
        let access = Access::of(&f.vis);
        let name = f.sig.ident.to_string();
        let line = format!("Function {} [{access}]", signature(&f.sig));
        self.member(self.module_path(), access, &name, line);
    }

    fn push_mod(&mut self, m: &ItemMod) {
        let Some((_brace, items)) = &m.content else { return };
        let inner = join_module(&self.module, &m.ident.to_string());
        let outer = std::mem::replace(&mut self.module, inner);
        for it in items {
            self.visit_item(it);
        }
        self.module = outer;
    }
}

/* ================================== Formatting ================================== */

/// `<ret> <name><generics>(<params>)`
fn signature(sig: &Signature) -> String {
    let generics = if sig.generics.params.is_empty() {
        String::new()
    } else {
        let params = &sig.generics.params;
        format!("<{}>", norm_tokens(params))
    };
    format!("{} {}{}({})", return_type(&sig.output), sig.ident, generics, params(sig))
}

fn return_type(out: &ReturnType) -> String {
    match out {
        ReturnType::Default => "()".to_string(),
        ReturnType::Type(_, ty) => norm_tokens(ty),
    }
}

fn params(sig: &Signature) -> String {
    sig.inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Receiver(r) => norm_tokens(r),
            FnArg::Typed(p) => format!("{}: {}", norm_tokens(&p.pat), norm_tokens(&p.ty)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Last path segment of the implementing type (`impl<T> Foo<T>` → `Foo`).
fn self_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// Receiver-less and returning `Self` / the type, bare or in `Result`/`Option`.
fn is_ctor(sig: &Signature, ty_name: &str) -> bool {
    if sig.receiver().is_some() {
        return false;
    }
    let ReturnType::Type(_, ty) = &sig.output else { return false };
    names_self(ty, ty_name)
}

fn names_self(ty: &Type, ty_name: &str) -> bool {
    let Type::Path(p) = ty else { return false };
    let Some(last) = p.path.segments.last() else { return false };
    if last.ident == "Self" || last.ident == ty_name {
        return true;
    }
    if last.ident == "Result" || last.ident == "Option" {
        if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                return names_self(inner, ty_name);
            }
        }
    }
    false
}

/// Exactly `#[cfg(test)]`; `cfg(not(test))` and feature gates stay visible.
fn is_cfg_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| {
        a.path().is_ident("cfg") && a.parse_args::<syn::Ident>().is_ok_and(|i| i == "test")
    })
}

/// `#[test]`, `#[tokio::test]` and friends.
fn is_test_attr(a: &syn::Attribute) -> bool {
    a.path().segments.last().is_some_and(|s| s.ident == "test")
}

fn item_attrs(i: &Item) -> Option<&[syn::Attribute]> {
    match i {
        Item::Struct(s) => Some(&s.attrs),
        Item::Enum(e) => Some(&e.attrs),
        Item::Union(u) => Some(&u.attrs),
        Item::Trait(t) => Some(&t.attrs),
        Item::Impl(imp) => Some(&imp.attrs),
        Item::Fn(f) => Some(&f.attrs),
        Item::Mod(m) => Some(&m.attrs),
        _ => None,
    }
}

/* ===================================== Tests ===================================== */

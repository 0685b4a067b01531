//! Schema ingestion through the public facade: modules, imports from a
//! search path, features and submodule includes.

use indoc::indoc;

use yangtree::schema::{Context, SnodeKind, TypeBase};

#[test]
fn module_head_and_tree() {
    let mut ctx = Context::new();
    let module = ctx
        .load_module(indoc! {"
            module system {
                namespace 'urn:system';
                prefix sys;
                organization 'Example';
                contact 'ops@example.com';
                description 'System management';
                revision 2015-03-01;

                container clock {
                    leaf timezone { type string; }
                }
            }
        "})
        .unwrap();
    let m = ctx.module(module);
    assert_eq!(ctx.dict().resolve(m.name), "system");
    assert_eq!(ctx.dict().resolve(m.ns), "urn:system");
    assert_eq!(ctx.dict().resolve(m.prefix), "sys");
    let clock = m.data[0];
    assert!(matches!(
        ctx.snode(clock).kind,
        SnodeKind::Container { .. }
    ));
    assert_eq!(ctx.snode(clock).children.len(), 1);
}

#[test]
fn modules_are_found_by_name_and_namespace() {
    let mut ctx = Context::new();
    let module = ctx
        .load_module("module a { namespace 'urn:a'; prefix a; }")
        .unwrap();
    assert_eq!(ctx.module_by_name("a"), Some(module));
    assert_eq!(ctx.module_by_ns("urn:a"), Some(module));
    assert_eq!(ctx.module_by_name("b"), None);
}

#[test]
fn import_loads_from_the_search_path() {
    let dir = std::env::temp_dir().join(format!("yangtree-import-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("types.yang"),
        indoc! {"
            module types {
                namespace 'urn:types';
                prefix t;
                typedef percent { type uint8 { range '0..100'; } }
            }
        "},
    )
    .unwrap();

    let mut ctx = Context::new();
    ctx.set_searchpath(dir.to_str().unwrap());
    let module = ctx
        .load_module(indoc! {"
            module user {
                namespace 'urn:user';
                prefix u;
                import types { prefix t; }
                leaf load { type t:percent; }
            }
        "})
        .unwrap();
    let leaf = ctx.module(module).data[0];
    assert_eq!(ctx.snode(leaf).leaf_type().unwrap().base, TypeBase::Uint8);
    assert!(ctx.module_by_name("types").is_some());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn include_merges_a_submodule() {
    let dir = std::env::temp_dir().join(format!("yangtree-include-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("main-extra.yang"),
        indoc! {"
            submodule main-extra {
                belongs-to main { prefix m; }
                leaf extra { type string; }
            }
        "},
    )
    .unwrap();

    let mut ctx = Context::new();
    ctx.set_searchpath(dir.to_str().unwrap());
    let module = ctx
        .load_module(indoc! {"
            module main {
                namespace 'urn:main';
                prefix m;
                include main-extra;
                leaf own { type string; }
            }
        "})
        .unwrap();
    let names: Vec<&str> = ctx
        .module(module)
        .data
        .iter()
        .map(|&id| ctx.dict().resolve(ctx.snode(id).name))
        .collect();
    assert!(names.contains(&"own"));
    assert!(names.contains(&"extra"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn submodule_of_another_module_is_rejected() {
    let dir = std::env::temp_dir().join(format!("yangtree-belongs-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("stray.yang"),
        "submodule stray { belongs-to someone-else { prefix s; } }",
    )
    .unwrap();

    let mut ctx = Context::new();
    ctx.set_searchpath(dir.to_str().unwrap());
    let err = ctx
        .load_module(indoc! {"
            module main {
                namespace 'urn:main';
                prefix m;
                include stray;
            }
        "})
        .unwrap_err();
    assert!(err.to_string().contains("belongs"), "{err}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn identities_derive_across_modules() {
    let mut ctx = Context::new();
    ctx.load_module(indoc! {"
        module base {
            namespace 'urn:base';
            prefix b;
            identity crypto-alg;
        }
    "})
    .unwrap();
    let derived_module = ctx
        .load_module(indoc! {"
            module ext {
                namespace 'urn:ext';
                prefix e;
                import base { prefix b; }
                identity aes { base b:crypto-alg; }
            }
        "})
        .unwrap();
    let base_module = ctx.module_by_name("base").unwrap();
    let alg = ctx.find_identity(base_module, "crypto-alg").unwrap();
    let aes = ctx.find_identity(derived_module, "aes").unwrap();
    assert!(ctx.identity_derives(aes, alg));
}

#[test]
fn must_and_when_are_syntax_checked() {
    let mut ctx = Context::new();
    ctx.load_module(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            container c {
                must '../other = \"x\"' { error-message 'other must be x'; }
                when 'count(../list) > 0';
            }
        }
    "})
    .unwrap();

    let err = Context::new()
        .load_module(indoc! {"
            module m {
                namespace 'urn:m';
                prefix m;
                container c { must 'unbalanced('; }
            }
        "})
        .unwrap_err();
    assert!(err.to_string().contains("unclosed"), "{err}");
}

#[test]
fn invalid_pattern_is_rejected_at_load() {
    let err = Context::new()
        .load_module(indoc! {"
            module m {
                namespace 'urn:m';
                prefix m;
                leaf x { type string { pattern '['; } }
            }
        "})
        .unwrap_err();
    assert!(err.to_string().contains("pattern"), "{err}");
}

//! Import extraction and resolution per language, over real fixture trees.

mod util;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_fs::prelude::*;
use contextor::core::graph::resolve_import;
use contextor::core::{ImportGraphBuilder, ProjectScanner, Relationship};
use contextor::infra::ProjectCache;
use contextor::lang::{LanguageId, LanguageRegistry, ProjectView};
use util::root_of;

struct Fixture
{
    _tmp: assert_fs::TempDir,
    root: PathBuf,
    registry: Arc<LanguageRegistry>,
}

impl Fixture
{
    fn new(files: &[(&str, &str)]) -> Self
    {
        let tmp = assert_fs::TempDir::new().expect("tempdir");
        for (path, body) in files
        {
            tmp.child(path)
                .write_str(body)
                .expect("write fixture file");
        }
        let root = root_of(&tmp);
        let registry = Arc::new(LanguageRegistry::new().expect("registry"));
        Self { _tmp: tmp, root, registry }
    }

    /// Resolved in-project imports of `rel`, relative to the root
    fn targets(
        &self,
        rel: &str,
    ) -> Vec<String>
    {
        let scanner = ProjectScanner::new(&[], Arc::clone(&self.registry)).expect("scanner");
        let scan = scanner.scan(&self.root);
        let view = ProjectView::new(&scan.root, scan.file_set());
        let builder = ImportGraphBuilder::new(Arc::clone(&self.registry), Arc::new(ProjectCache::disabled()));
        builder
            .forward_targets(&self.root.join(rel), &view)
            .iter()
            .map(|p| rel_slash(p, &self.root))
            .collect()
    }
}

fn rel_slash(
    p: &Path,
    root: &Path,
) -> String
{
    p.strip_prefix(root)
        .unwrap_or(p)
        .to_string_lossy()
        .replace('\\', "/")
}

#[test]
fn python_absolute_relative_and_package_imports()
{
    let fx = Fixture::new(&[
        (
            "pkg/api.py",
            "import os\nimport json\nfrom pkg import models\nfrom .helpers import fmt\nfrom . import views\nimport requests\n",
        ),
        ("pkg/__init__.py", ""),
        ("pkg/models.py", "class Item: pass\n"),
        ("pkg/helpers.py", "def fmt(x): return x\n"),
        ("pkg/views.py", "def index(): pass\n"),
    ]);
    assert_eq!(fx.targets("pkg/api.py"), [
        "pkg/__init__.py",
        "pkg/models.py",
        "pkg/helpers.py",
        "pkg/views.py"
    ]);
}

#[test]
fn rust_crate_self_super_and_mod_declarations()
{
    let fx = Fixture::new(&[
        ("Cargo.toml", "[package]\nname = \"demo\"\n"),
        ("src/lib.rs", "mod models;\nmod api;\nuse std::fmt;\n"),
        ("src/models/mod.rs", "pub mod user;\n"),
        ("src/models/user.rs", "use super::super::api::Handler;\npub struct User;\n"),
        ("src/api.rs", "use crate::models::user::User;\nuse serde::Serialize;\npub struct Handler;\n"),
    ]);
    assert_eq!(fx.targets("src/lib.rs"), ["src/models/mod.rs", "src/api.rs"]);
    assert_eq!(fx.targets("src/api.rs"), ["src/models/user.rs"]);
    assert_eq!(fx.targets("src/models/mod.rs"), ["src/models/user.rs"]);
    assert_eq!(fx.targets("src/models/user.rs"), ["src/api.rs"]);
}

#[test]
fn typescript_relative_index_and_alias_imports()
{
    let fx = Fixture::new(&[
        (
            "src/app.ts",
            "import React from 'react';\nimport { User } from './models/user';\nimport { cfg } from '@/config';\nimport * as ui from './ui';\nimport fs from 'node:fs';\n",
        ),
        ("src/models/user.ts", "export interface User { id: number }\n"),
        ("src/config.ts", "export const cfg = {};\n"),
        ("src/ui/index.tsx", "export const Button = () => null;\n"),
    ]);
    assert_eq!(fx.targets("src/app.ts"), ["src/models/user.ts", "src/config.ts", "src/ui/index.tsx"]);
}

#[test]
fn go_module_packages_resolve_to_a_file_in_the_package()
{
    let fx = Fixture::new(&[
        ("go.mod", "module example.com/shop\n\ngo 1.22\n"),
        (
            "cmd/main.go",
            "package main\n\nimport (\n\t\"fmt\"\n\t\"example.com/shop/store\"\n\t\"github.com/pkg/errors\"\n)\n",
        ),
        ("store/store.go", "package store\n\ntype Store struct{}\n"),
        ("store/helpers.go", "package store\n"),
        ("store/store_test.go", "package store\n"),
    ]);
    assert_eq!(fx.targets("cmd/main.go"), ["store/store.go"]);
}

#[test]
fn c_includes_search_local_then_include_roots()
{
    let fx = Fixture::new(&[
        ("src/main.c", "#include <stdio.h>\n#include \"util.h\"\n#include \"net/socket.h\"\n"),
        ("src/util.h", "int util(void);\n"),
        ("include/net/socket.h", "int sock(void);\n"),
    ]);
    assert_eq!(fx.targets("src/main.c"), ["src/util.h", "include/net/socket.h"]);
}

#[test]
fn java_imports_match_by_package_path()
{
    let fx = Fixture::new(&[
        (
            "src/main/java/com/acme/App.java",
            "package com.acme;\n\nimport java.util.List;\nimport com.acme.model.User;\n",
        ),
        ("src/main/java/com/acme/model/User.java", "package com.acme.model;\npublic class User {}\n"),
    ]);
    assert_eq!(fx.targets("src/main/java/com/acme/App.java"), ["src/main/java/com/acme/model/User.java"]);
}

#[test]
fn ruby_require_relative_and_lib_requires()
{
    let fx = Fixture::new(&[
        ("app/main.rb", "require 'json'\nrequire_relative 'helper'\nrequire 'shop/cart'\n"),
        ("app/helper.rb", "module Helper; end\n"),
        ("lib/shop/cart.rb", "class Cart; end\n"),
    ]);
    assert_eq!(fx.targets("app/main.rb"), ["app/helper.rb", "lib/shop/cart.rb"]);
}

#[test]
fn standard_library_and_packages_resolve_to_nothing()
{
    let fx = Fixture::new(&[("main.py", "import os\n"), ("os.py", "# shadow\n")]);
    let src = fx.root.join("main.py");
    let registry = &fx.registry;

    assert_eq!(resolve_import(registry, "os", &src, &fx.root, LanguageId::Python), None);
    assert_eq!(resolve_import(registry, "std::fmt", &src, &fx.root, LanguageId::Rust), None);
    assert_eq!(resolve_import(registry, "react", &src, &fx.root, LanguageId::TypeScript), None);
    assert_eq!(resolve_import(registry, "fmt", &src, &fx.root, LanguageId::Go), None);
    assert_eq!(resolve_import(registry, "vector", &src, &fx.root, LanguageId::Cpp), None);
}

#[test]
fn reverse_index_answers_importers()
{
    let fx = Fixture::new(&[
        ("a.py", "import shared\n"),
        ("b.py", "import shared\n"),
        ("shared.py", "X = 1\n"),
    ]);
    let scanner = ProjectScanner::new(&[], Arc::clone(&fx.registry)).expect("scanner");
    let scan = scanner.scan(&fx.root);
    let view = ProjectView::new(&scan.root, scan.file_set());
    let builder = ImportGraphBuilder::new(Arc::clone(&fx.registry), Arc::new(ProjectCache::disabled()));

    let edges = builder.build_forward_edges(&fx.root.join("a.py"), &view);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target, fx.root.join("shared.py"));
    assert_eq!(edges[0].relationship, Relationship::Outgoing);
    assert_eq!(edges[0].depth, 1);

    let index = builder.build_reverse_index(&scan.source_files(), &view);
    let mut importers: Vec<String> = index
        .importers_of(&fx.root.join("shared.py"))
        .iter()
        .map(|p| rel_slash(p, &fx.root))
        .collect();
    importers.sort();
    assert_eq!(importers, ["a.py", "b.py"]);

    let graph = builder.import_graph(&fx.root.join("shared.py"), 1, &index, &view);
    assert!(graph.outgoing.is_empty());
    assert!(
        graph
            .incoming
            .iter()
            .all(|e| e.relationship == Relationship::Incoming)
    );
    assert_eq!(graph.incoming.len(), 2);
}

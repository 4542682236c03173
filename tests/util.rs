//! Shared test utilities for integration tests
//!
//! Provides fixture projects and assembler constructors used across
//! multiple test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use contextor::core::{AssemblyRequest, ContextAssembler};
use contextor::infra::Config;

/// Canonical root of a fixture (macOS /var vs /private/var)
pub fn root_of(tmp: &assert_fs::TempDir) -> PathBuf
{
    dunce::canonicalize(tmp.path()).expect("canonical root")
}

/// Config with caching off so each test sees the filesystem as written
pub fn test_config() -> Config
{
    let mut cfg = Config::default();
    cfg.cache.enabled = false;
    cfg
}

/// Assembler with no definition provider
pub fn assembler() -> ContextAssembler
{
    ContextAssembler::from_config(&test_config())
        .expect("default config")
        .without_resolver()
}

pub fn request(
    root: &Path,
    anchor: &str,
    budget: usize,
) -> AssemblyRequest
{
    AssemblyRequest { anchor: root.join(anchor), root: root.to_path_buf(), budget }
}

/// A small Python package: an anchor importing two helpers, one of which
/// imports a third module, plus a test file importing the anchor.
pub fn python_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("app/__init__.py")
        .write_str("")
        .expect("write init");
    tmp.child("app/service.py")
        .write_str(
            "from app import models\n\
             from app.util import slugify\n\
             \n\
             def create_user(name):\n    \
                 user = models.User(slugify(name))\n    \
                 return user\n",
        )
        .expect("write service");
    tmp.child("app/models.py")
        .write_str(
            "from app import db\n\
             \n\
             class User:\n    \
                 def __init__(self, name):\n        \
                     self.name = name\n",
        )
        .expect("write models");
    tmp.child("app/util.py")
        .write_str("def slugify(text):\n    return text.lower().replace(' ', '-')\n")
        .expect("write util");
    tmp.child("app/db.py")
        .write_str("CONNECTION = None\n\ndef connect():\n    return CONNECTION\n")
        .expect("write db");
    tmp.child("tests/test_service.py")
        .write_str("from app.service import create_user\n\ndef test_create():\n    assert create_user('A B')\n")
        .expect("write test");

    tmp
}

/// Pad a fixture with an unrelated text file so the whole project no
/// longer fits `budget` and the ladder has to run.
pub fn add_filler(
    tmp: &assert_fs::TempDir,
    tokens: usize,
)
{
    // Heuristic: 4 bytes per token, 20 bytes per line
    let lines = tokens / 5 + 1;
    tmp.child("docs/notes.txt")
        .write_str(&"lorem ipsum dolor s\n".repeat(lines))
        .expect("write filler");
}

/// Several moderately sized Rust modules all imported by `src/lib.rs`.
/// Every level beyond minimal has real work to do at small budgets.
pub fn make_heavy_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    let mut lib = String::new();
    for i in 0..8
    {
        lib.push_str(&format!("mod unit_{i};\n"));

        let mut body = String::new();
        body.push_str(&format!("pub struct Unit{i} {{\n    pub id: u64,\n}}\n\n"));
        for j in 0..40
        {
            body.push_str(&format!(
                "/// unit {i} fn {j}\npub fn f_{i}_{j}(x: u64) -> u64 {{\n    let y = x + {j};\n    y * 2\n}}\n\n"
            ));
        }
        tmp.child(format!("src/unit_{i}.rs"))
            .write_str(&body)
            .expect("write unit");
    }
    lib.push_str("\npub fn entry() -> u64 {\n    unit_0::f_0_0(1)\n}\n");
    tmp.child("src/lib.rs")
        .write_str(&lib)
        .expect("write lib");

    tmp.child("README.md")
        .write_str("# Heavy Fixture\n\nDetails.\n")
        .expect("write readme");

    tmp
}

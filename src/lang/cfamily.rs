//! Filepath: src/lang/cfamily.rs
//! C and C++ `#include`. Quoted includes search the including directory
//! first; angle includes are tried against conventional include roots unless
//! they name a standard header.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

use super::profile::{
    Grammar, GrammarSpec, LanguageId, LanguageProfile, ProjectView, compile_patterns, source_dir,
};

const SEMANTIC_QUERY: &str = r#"
(template_declaration) @item
(function_definition) @item
(declaration declarator: (function_declarator)) @item
(struct_specifier body: (field_declaration_list)) @item
(class_specifier body: (field_declaration_list)) @item
(union_specifier body: (field_declaration_list)) @item
(enum_specifier body: (enumerator_list)) @item
(type_definition) @item
(alias_declaration) @item
"#;

const TYPES_QUERY: &str = r#"
(struct_specifier body: (field_declaration_list)) @item
(class_specifier body: (field_declaration_list)) @item
(union_specifier body: (field_declaration_list)) @item
(enum_specifier body: (enumerator_list)) @item
(type_definition) @item
(alias_declaration) @item
"#;

/// Search roots for includes, relative to the project root
const INCLUDE_ROOTS: &[&str] = &["", "include", "src", "inc", "lib"];

/// C headers; C++ standard headers are recognized by having no extension
const C_STD_HEADERS: &[&str] = &[
    "assert.h", "ctype.h", "errno.h", "float.h", "inttypes.h", "limits.h", "locale.h", "math.h",
    "setjmp.h", "signal.h", "stdarg.h", "stdbool.h", "stddef.h", "stdint.h", "stdio.h", "stdlib.h",
    "string.h", "time.h", "wchar.h", "unistd.h", "fcntl.h", "pthread.h", "dirent.h", "windows.h",
];

const BUILTINS: &[&str] = &[
    "std", "cout", "cerr", "endl", "printf", "fprintf", "malloc", "free", "size_t", "nullptr",
    "NULL", "string", "vector", "map", "unique_ptr", "shared_ptr", "make_unique", "make_shared",
    "move", "int", "char", "void", "bool", "auto", "const", "this", "main", "argc", "argv",
];

pub struct CFamilyProfile {
    id: LanguageId,
    patterns: Vec<Regex>,
    grammar: Option<Grammar>,
}

impl CFamilyProfile {
    fn build(id: LanguageId) -> Result<Self> {
        let patterns = compile_patterns(&[
            r#"(?m)^\s*#\s*include\s*"([^"]+)""#,
            r#"(?m)^\s*#\s*include\s*<([^>]+)>"#,
        ])?;

        // The C++ grammar is a superset that parses C well enough for summaries
        let grammar = Grammar::compile_or_warn(
            id,
            tree_sitter_cpp::LANGUAGE.into(),
            GrammarSpec {
                semantic_query: SEMANTIC_QUERY,
                types_query: TYPES_QUERY,
                function_kinds: &["function_definition", "lambda_expression"],
                body_kinds: &["compound_statement"],
                leading_kinds: &[],
                identifier_kinds: &["identifier", "type_identifier"],
                elision: "{ ... }",
            },
        );

        Ok(Self { id, patterns, grammar })
    }

    pub fn c() -> Result<Self> {
        Self::build(LanguageId::C)
    }

    pub fn cpp() -> Result<Self> {
        Self::build(LanguageId::Cpp)
    }
}

impl LanguageProfile for CFamilyProfile {
    fn id(&self) -> LanguageId {
        self.id
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self.id {
            LanguageId::C => &["c", "h"],
            _ => &["cc", "cpp", "cxx", "c++", "hh", "hpp", "hxx", "h++", "ipp"],
        }
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        let has_ext = Path::new(raw).extension().is_some();
        C_STD_HEADERS.contains(&raw) || raw.starts_with("sys/") || !has_ext && !raw.contains('/')
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        // Including directory first (quoted include semantics), then include roots
        project.probe(&source_dir(source, project).join(raw)).or_else(|| {
            INCLUDE_ROOTS
                .iter()
                .find_map(|base| project.probe(&project.root.join(base).join(raw)))
        })
    }

    fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    fn builtins(&self) -> &'static [&'static str] {
        BUILTINS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::profile::FileSet;

    #[test]
    fn quoted_and_angle_includes() -> Result<()> {
        let p = CFamilyProfile::cpp()?;
        let src = "#include <vector>\n#include <stdio.h>\n#include \"server.hpp\"\n#  include <models/user.hpp>\n";
        assert_eq!(
            p.extract_imports(src),
            vec!["server.hpp", "vector", "stdio.h", "models/user.hpp"]
        );
        assert!(p.is_external("vector"));
        assert!(p.is_external("stdio.h"));
        assert!(!p.is_external("models/user.hpp"));
        Ok(())
    }

    #[test]
    fn resolves_relative_then_include_roots() -> Result<()> {
        let p = CFamilyProfile::cpp()?;
        let files = FileSet::new([
            PathBuf::from("/p/src/server.cpp"),
            PathBuf::from("/p/src/server.hpp"),
            PathBuf::from("/p/include/models/user.hpp"),
        ]);
        let view = ProjectView::new(Path::new("/p"), &files);
        let src = Path::new("/p/src/server.cpp");
        assert_eq!(p.resolve("server.hpp", src, &view), Some(PathBuf::from("/p/src/server.hpp")));
        assert_eq!(
            p.resolve("models/user.hpp", src, &view),
            Some(PathBuf::from("/p/include/models/user.hpp"))
        );
        Ok(())
    }
}

//! Filepath: src/lang/registry.rs
//! Lookup table from file extension to language profile.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use super::cfamily::CFamilyProfile;
use super::go::GoProfile;
use super::javascript::JavaScriptProfile;
use super::modules::{ElixirProfile, JvmProfile, PhpProfile, SwiftProfile};
use super::profile::{LanguageId, LanguageProfile};
use super::python::PythonProfile;
use super::rust::RustProfile;
use super::scripting::{CssProfile, LuaProfile, RubyProfile};

/// Every supported language, registered once at startup
pub struct LanguageRegistry {
    profiles: Vec<Arc<dyn LanguageProfile>>,
    by_ext: HashMap<&'static str, usize>,
    by_id: HashMap<LanguageId, usize>,
}

impl LanguageRegistry {
    /// Build the registry with all built-in profiles (compiles their queries)
    pub fn new() -> Result<Self> {
        let profiles: Vec<Arc<dyn LanguageProfile>> = vec![
            Arc::new(RustProfile::new()?),
            Arc::new(PythonProfile::new()?),
            Arc::new(JavaScriptProfile::javascript()?),
            Arc::new(JavaScriptProfile::typescript()?),
            Arc::new(JavaScriptProfile::tsx()?),
            Arc::new(GoProfile::new()?),
            Arc::new(CFamilyProfile::c()?),
            Arc::new(CFamilyProfile::cpp()?),
            Arc::new(JvmProfile::java()?),
            Arc::new(JvmProfile::kotlin()?),
            Arc::new(PhpProfile::new()?),
            Arc::new(SwiftProfile::new()?),
            Arc::new(ElixirProfile::new()?),
            Arc::new(RubyProfile::new()?),
            Arc::new(LuaProfile::new()?),
            Arc::new(CssProfile::new()?),
        ];
        Ok(Self::from_profiles(profiles))
    }

    /// Build from an explicit profile list; later profiles win extension clashes
    pub fn from_profiles(profiles: Vec<Arc<dyn LanguageProfile>>) -> Self {
        let mut by_ext = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, p) in profiles.iter().enumerate() {
            for ext in p.extensions() {
                by_ext.insert(*ext, i);
            }
            by_id.insert(p.id(), i);
        }
        Self {
            profiles,
            by_ext,
            by_id,
        }
    }

    pub fn for_path(&self, path: &Path) -> Option<&Arc<dyn LanguageProfile>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_ext.get(ext.as_str()).map(|&i| &self.profiles[i])
    }

    pub fn get(&self, id: LanguageId) -> Option<&Arc<dyn LanguageProfile>> {
        self.by_id.get(&id).map(|&i| &self.profiles[i])
    }

    pub fn language_of(&self, path: &Path) -> Option<LanguageId> {
        self.for_path(path).map(|p| p.id())
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Arc<dyn LanguageProfile>> {
        self.profiles.iter()
    }

    /// Markdown fence label for a path (empty for unknown files)
    pub fn fence_for(&self, path: &Path) -> &'static str {
        self.for_path(path).map(|p| p.fence()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_profiles() -> Result<()> {
        let reg = LanguageRegistry::new()?;
        assert_eq!(reg.language_of(Path::new("a/b.rs")), Some(LanguageId::Rust));
        assert_eq!(reg.language_of(Path::new("x.TSX")), Some(LanguageId::Tsx));
        assert_eq!(reg.language_of(Path::new("x.h")), Some(LanguageId::C));
        assert_eq!(reg.language_of(Path::new("x.hpp")), Some(LanguageId::Cpp));
        assert_eq!(reg.language_of(Path::new("x.scss")), Some(LanguageId::Css));
        assert_eq!(reg.language_of(Path::new("README.md")), None);
        assert_eq!(reg.fence_for(Path::new("main.go")), "go");
        Ok(())
    }

    #[test]
    fn grammar_backed_languages_compile_their_queries() -> Result<()> {
        let reg = LanguageRegistry::new()?;
        for id in [
            LanguageId::Rust,
            LanguageId::Python,
            LanguageId::JavaScript,
            LanguageId::TypeScript,
            LanguageId::Tsx,
            LanguageId::Go,
            LanguageId::C,
            LanguageId::Cpp,
        ] {
            let profile = reg.get(id).expect("registered");
            assert!(profile.grammar().is_some(), "{} grammar failed to compile", id.label());
        }
        assert!(reg.get(LanguageId::Ruby).and_then(|p| p.grammar()).is_none());
        Ok(())
    }
}

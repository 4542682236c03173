//! Definition resolver behaviour against scripted providers.

mod util;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_fs::prelude::*;
use async_trait::async_trait;
use contextor::core::{ContentReducer, TokenEstimator};
use contextor::intel::protocol::path_to_uri;
use contextor::intel::{
    DefinitionProvider, DefinitionRequest, DefinitionResolver, DefinitionResponse, IdentifierRef, Location,
    LocationLink, Range, ResolverSettings,
};
use contextor::lang::LanguageRegistry;
use util::root_of;

/// Answers by request line; unknown lines get nothing
struct Scripted
{
    answers: HashMap<u32, DefinitionResponse>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Scripted
{
    fn new(answers: HashMap<u32, DefinitionResponse>) -> Self
    {
        Self { answers, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    fn slow(
        mut self,
        delay: Duration,
    ) -> Self
    {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl DefinitionProvider for Scripted
{
    async fn definition(
        &self,
        request: DefinitionRequest,
    ) -> anyhow::Result<DefinitionResponse>
    {
        self.calls
            .fetch_add(1, Ordering::SeqCst);
        if !self
            .delay
            .is_zero()
        {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .answers
            .get(&request.line)
            .cloned()
            .unwrap_or(DefinitionResponse::Empty))
    }
}

struct Failing;

#[async_trait]
impl DefinitionProvider for Failing
{
    async fn definition(
        &self,
        _request: DefinitionRequest,
    ) -> anyhow::Result<DefinitionResponse>
    {
        anyhow::bail!("server crashed")
    }
}

fn at(
    path: &Path,
    line: u32,
) -> Location
{
    Location { uri: path_to_uri(path), range: Range::point(line, 0) }
}

fn ident(
    name: &str,
    line: u32,
) -> IdentifierRef
{
    IdentifierRef { name: name.to_string(), line, column: 0, type_like: true }
}

fn resolver(
    provider: Arc<dyn DefinitionProvider>,
    settings: ResolverSettings,
) -> DefinitionResolver
{
    let registry = Arc::new(LanguageRegistry::new().expect("registry"));
    let reducer = Arc::new(ContentReducer::new(Arc::clone(&registry), Arc::new(TokenEstimator::heuristic())));
    DefinitionResolver::new(provider, registry, reducer, settings)
}

fn fixture() -> (assert_fs::TempDir, PathBuf)
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("src/main.rs")
        .write_str("use models::User;\nuse store::Store;\nfn main() {}\n")
        .expect("write main");
    tmp.child("src/models.rs")
        .write_str("pub struct User {\n    pub id: u64,\n}\n\npub struct Account;\n")
        .expect("write models");
    tmp.child("src/store.rs")
        .write_str("pub struct Store;\n")
        .expect("write store");
    tmp.child("vendor/dep/lib.rs")
        .write_str("pub struct Vendored;\n")
        .expect("write vendored");
    let root = root_of(&tmp);
    (tmp, root)
}

#[tokio::test]
async fn every_response_shape_is_accepted()
{
    let (_tmp, root) = fixture();
    let models = root.join("src/models.rs");
    let store = root.join("src/store.rs");

    let link = LocationLink {
        origin_selection_range: None,
        target_uri: path_to_uri(&store),
        target_range: Range::point(0, 0),
        target_selection_range: Range::point(0, 11),
    };
    let provider = Scripted::new(HashMap::from([
        (0, DefinitionResponse::Single(at(&models, 0))),
        (1, DefinitionResponse::Links(vec![link])),
        (2, DefinitionResponse::Many(vec![at(&models, 4)])),
    ]));
    let r = resolver(Arc::new(provider), ResolverSettings::default());

    let defs = r
        .resolve_definitions(
            &root.join("src/main.rs"),
            &root,
            &[ident("User", 0), ident("Store", 1), ident("Account", 2)],
            10,
        )
        .await;

    // Account points into models.rs again and is dropped as a duplicate file
    let names: Vec<_> = defs
        .iter()
        .map(|d| d.identifier.as_str())
        .collect();
    assert_eq!(names, ["User", "Store"]);
    assert!(defs[0].snippet.contains("pub struct User {"));
    assert!(defs[0].snippet.contains("pub id: u64"));
    assert_eq!(defs[1].range, Range::point(0, 11));
    assert!(defs.iter().all(|d| d.tokens > 0));
}

#[tokio::test]
async fn anchor_vendored_and_outside_targets_are_skipped()
{
    let (_tmp, root) = fixture();
    let outside = assert_fs::TempDir::new().expect("tempdir");
    outside
        .child("ext.rs")
        .write_str("pub struct Ext;\n")
        .expect("write ext");
    let outside_file = root_of(&outside).join("ext.rs");

    let anchor = root.join("src/main.rs");
    let provider = Scripted::new(HashMap::from([
        (
            0,
            DefinitionResponse::Many(vec![
                at(&anchor, 2),
                at(&root.join("vendor/dep/lib.rs"), 0),
                at(&outside_file, 0),
                at(&root.join("src/store.rs"), 0),
            ]),
        ),
        (1, DefinitionResponse::Single(at(&root.join("src/missing.rs"), 0))),
    ]));
    let r = resolver(Arc::new(provider), ResolverSettings::default());

    let defs = r
        .resolve_definitions(&anchor, &root, &[ident("Store", 0), ident("Ghost", 1)], 10)
        .await;
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].path, root.join("src/store.rs"));
}

#[tokio::test]
async fn max_files_caps_the_result()
{
    let (_tmp, root) = fixture();
    let provider = Scripted::new(HashMap::from([
        (0, DefinitionResponse::Single(at(&root.join("src/models.rs"), 0))),
        (1, DefinitionResponse::Single(at(&root.join("src/store.rs"), 0))),
    ]));
    let r = resolver(Arc::new(provider), ResolverSettings::default());

    let defs = r
        .resolve_definitions(&root.join("src/main.rs"), &root, &[ident("User", 0), ident("Store", 1)], 1)
        .await;
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].identifier, "User");

    let none = r
        .resolve_definitions(&root.join("src/main.rs"), &root, &[ident("User", 0)], 0)
        .await;
    assert!(none.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_requests_time_out_individually()
{
    let (_tmp, root) = fixture();
    let provider = Scripted::new(HashMap::from([(
        0,
        DefinitionResponse::Single(at(&root.join("src/models.rs"), 0)),
    )]))
    .slow(Duration::from_secs(30));
    let settings = ResolverSettings {
        request_timeout: Duration::from_secs(1),
        overall_timeout: Duration::from_secs(60),
        ..ResolverSettings::default()
    };
    let r = resolver(Arc::new(provider), settings);

    let defs = r
        .resolve_definitions(&root.join("src/main.rs"), &root, &[ident("User", 0)], 5)
        .await;
    assert!(defs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn overall_deadline_keeps_what_arrived()
{
    let (_tmp, root) = fixture();
    let provider = Arc::new(
        Scripted::new(HashMap::from([
            (0, DefinitionResponse::Single(at(&root.join("src/models.rs"), 0))),
            (1, DefinitionResponse::Single(at(&root.join("src/store.rs"), 0))),
            (2, DefinitionResponse::Single(at(&root.join("src/models.rs"), 4))),
        ]))
        .slow(Duration::from_secs(1)),
    );
    let settings = ResolverSettings {
        request_timeout: Duration::from_secs(10),
        overall_timeout: Duration::from_millis(1_500),
        concurrency: 1,
        ..ResolverSettings::default()
    };
    let r = resolver(provider.clone(), settings);

    let defs = r
        .resolve_definitions(
            &root.join("src/main.rs"),
            &root,
            &[ident("User", 0), ident("Store", 1), ident("Account", 2)],
            5,
        )
        .await;

    // One request finishes at 1s; the second would finish at 2s, past the deadline
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].identifier, "User");
    assert!(
        provider
            .calls
            .load(Ordering::SeqCst)
            <= 2
    );
}

#[tokio::test]
async fn provider_errors_are_absorbed()
{
    let (_tmp, root) = fixture();
    let r = resolver(Arc::new(Failing), ResolverSettings::default());
    let defs = r
        .resolve_definitions(&root.join("src/main.rs"), &root, &[ident("User", 0)], 5)
        .await;
    assert!(defs.is_empty());
}

#[test]
fn untagged_wire_shapes_decode()
{
    let single = DefinitionResponse::from_json(
        r#"{"uri":"file:///p/a.rs","range":{"start":{"line":1,"character":2},"end":{"line":1,"character":5}}}"#,
    )
    .expect("single");
    assert!(matches!(single, DefinitionResponse::Single(_)));

    let links = DefinitionResponse::from_json(
        r#"[{"targetUri":"file:///p/b.rs","targetRange":{"start":{"line":0,"character":0},"end":{"line":3,"character":1}},"targetSelectionRange":{"start":{"line":0,"character":4},"end":{"line":0,"character":8}}}]"#,
    )
    .expect("links");
    assert!(matches!(links, DefinitionResponse::Links(_)));

    let empty = DefinitionResponse::from_json("null").expect("null");
    assert!(empty.is_empty());
}

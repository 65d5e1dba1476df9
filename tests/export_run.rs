use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailgrab::errors::{AppError, AppResult};
use mailgrab::export::{Exporter, RunContext, RunSettings};
use mailgrab::gmail::MailboxApi;
use mailgrab::retry::RetryPolicy;
use mailgrab::types::{MessagePage, MessagePart, MessagePartBody};

/// In-memory mailbox: one page per query, scripted failures per message id.
#[derive(Default)]
struct FakeMailbox {
    results: HashMap<String, Vec<String>>,
    failures: Mutex<HashMap<String, Vec<AppError>>>,
    queries: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeMailbox {
    fn with_results(results: &[(&str, &[&str])]) -> Self {
        Self {
            results: results
                .iter()
                .map(|(q, ids)| (q.to_string(), ids.iter().map(|s| s.to_string()).collect()))
                .collect(),
            ..Self::default()
        }
    }

    fn fail(self, id: &str, errors: Vec<AppError>) -> Self {
        self.failures.lock().unwrap().insert(id.to_string(), errors);
        self
    }
}

#[async_trait]
impl MailboxApi for FakeMailbox {
    async fn list_message_ids(
        &self,
        query: &str,
        _page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(MessagePage {
            ids: self.results.get(query).cloned().unwrap_or_default(),
            next_page_token: None,
        })
    }

    async fn get_full_message(&self, id: &str) -> AppResult<MessagePart> {
        self.fetches.lock().unwrap().push(id.to_string());
        if let Some(errors) = self.failures.lock().unwrap().get_mut(id) {
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }
        Ok(MessagePart::leaf(
            "text/plain",
            &[("Subject", id)],
            MessagePartBody::inline("aGVsbG8="),
        ))
    }
}

fn context(api: Arc<FakeMailbox>, addresses: &[&str], out: &std::path::Path) -> RunContext {
    RunContext {
        api,
        settings: RunSettings {
            email_addresses: addresses.iter().map(|s| s.to_string()).collect(),
            output_dir: out.to_path_buf(),
            concurrency: 4,
            retry: RetryPolicy::default(),
            dedupe: false,
            list_only: false,
        },
    }
}

#[tokio::test(start_paused = true)]
async fn exports_one_file_per_message() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("messages");
    let api = Arc::new(FakeMailbox::with_results(&[("from:a@x.com", &["m1", "m2"])]));

    let summary = Exporter::new(context(api.clone(), &["a@x.com"], &out))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.ids_found, 2);
    assert_eq!(summary.written, 2);
    assert_eq!(
        *api.queries.lock().unwrap(),
        vec!["from:a@x.com", "to:a@x.com"]
    );
    assert_eq!(
        fs::read_to_string(out.join("m1.txt")).unwrap(),
        "Subject: m1\n\nhello\n"
    );
    assert!(out.join("m2.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn issues_two_queries_per_address_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeMailbox::default());
    let ctx = context(api.clone(), &["a@x.com", "b@y.org", "c@z.net"], dir.path());

    let ids = Exporter::new(ctx).collect_all().await.unwrap();

    assert!(ids.is_empty());
    assert_eq!(
        *api.queries.lock().unwrap(),
        vec![
            "from:a@x.com",
            "to:a@x.com",
            "from:b@y.org",
            "to:b@y.org",
            "from:c@z.net",
            "to:c@z.net",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn duplicates_are_kept_unless_dedupe_is_set() {
    let dir = tempfile::tempdir().unwrap();
    let results: &[(&str, &[&str])] = &[
        ("from:a@x.com", &["m1", "m2"]),
        ("to:a@x.com", &["m2", "m3"]),
        ("from:b@y.org", &["m1"]),
    ];

    let api = Arc::new(FakeMailbox::with_results(results));
    let ids = Exporter::new(context(api, &["a@x.com", "b@y.org"], dir.path()))
        .collect_all()
        .await
        .unwrap();
    assert_eq!(ids, vec!["m1", "m2", "m2", "m3", "m1"]);

    let api = Arc::new(FakeMailbox::with_results(results));
    let mut ctx = context(api, &["a@x.com", "b@y.org"], dir.path());
    ctx.settings.dedupe = true;
    let ids = Exporter::new(ctx).collect_all().await.unwrap();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_fetch_eventually_writes() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeMailbox::with_results(&[("to:a@x.com", &["m1"])])
            .fail("m1", vec![AppError::RateLimited, AppError::RateLimited]),
    );

    let summary = Exporter::new(context(api.clone(), &["a@x.com"], dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(api.fetches.lock().unwrap().len(), 3);
    assert!(dir.path().join("m1.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn non_rate_limit_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(
        FakeMailbox::with_results(&[("from:a@x.com", &["bad"])]).fail(
            "bad",
            vec![AppError::Api {
                status: 500,
                body: "backend error".into(),
            }],
        ),
    );

    let err = Exporter::new(context(api.clone(), &["a@x.com"], dir.path()))
        .run()
        .await
        .unwrap_err();

    match err {
        AppError::Fatal { message_id, source } => {
            assert_eq!(message_id, "bad");
            assert!(matches!(*source, AppError::Api { status: 500, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(*api.fetches.lock().unwrap(), vec!["bad"]);
    assert!(!dir.path().join("bad.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn unsafe_message_id_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeMailbox::with_results(&[("from:a@x.com", &["../escape"])]));

    let err = Exporter::new(context(api.clone(), &["a@x.com"], dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Fatal { .. }));
    assert!(api.fetches.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn list_only_fetches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("messages");
    let api = Arc::new(FakeMailbox::with_results(&[("from:a@x.com", &["m1"])]));
    let mut ctx = context(api.clone(), &["a@x.com"], &out);
    ctx.settings.list_only = true;

    let summary = Exporter::new(ctx).run().await.unwrap();

    assert_eq!(summary.ids_found, 1);
    assert_eq!(summary.written, 0);
    assert!(api.fetches.lock().unwrap().is_empty());
    assert!(!out.exists());
}

#[tokio::test(start_paused = true)]
async fn empty_address_list_is_a_clean_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("messages");
    let api = Arc::new(FakeMailbox::default());

    let summary = Exporter::new(context(api.clone(), &[], &out))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.ids_found, 0);
    assert_eq!(summary.written, 0);
    assert!(api.queries.lock().unwrap().is_empty());
    assert!(api.fetches.lock().unwrap().is_empty());
}

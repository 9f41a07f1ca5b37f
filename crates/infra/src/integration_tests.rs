//! Integration tests for the full rendition pipeline.
//!
//! Tests: DocumentEvent → Trigger → TransactionalJobQueue → WorkerPool →
//! ArtifactMaterializer → repository
//!
//! Verifies:
//! - Jobs only run after the host's unit of work commits
//! - Repeated and concurrent triggers converge on a single rendition
//! - Transient conflicts are retried in fresh units of work

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use rendition_core::model::{MIMETYPE_MARKDOWN, MIMETYPE_PDF, rendition_marker};
    use rendition_core::{ChildAssociation, Job, NodeId, NodeType, QName, RelationIdentity};
    use rendition_events::{DocumentEvent, UnitOfWork};

    use crate::config::{RenditionConfig, TransformConfig};
    use crate::jobs::WorkerPoolConfig;
    use crate::materializer::{ArtifactMaterializer, EnsureOutcome, MaterializeError};
    use crate::pipeline::RenditionPipeline;
    use crate::repository::{InMemoryRepository, RepositoryStore};
    use crate::transaction::{RetryPolicy, TransactionService};
    use crate::transform::{BytesTransform, TransformService};

    type Calls = Arc<AtomicUsize>;

    fn counting_transform(calls: Calls) -> impl TransformService {
        BytesTransform::new(MIMETYPE_PDF, move |bytes: &[u8]| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut out = b"# ".to_vec();
            out.extend_from_slice(bytes);
            Ok(out)
        })
    }

    fn config(workers: usize, queue_capacity: usize) -> RenditionConfig {
        RenditionConfig {
            pool: WorkerPoolConfig::default()
                .with_name("it-worker")
                .with_workers(workers)
                .with_queue_capacity(queue_capacity),
            retry: RetryPolicy::fixed(10, Duration::from_millis(1)),
            ..RenditionConfig::default()
        }
    }

    fn setup(
        workers: usize,
        queue_capacity: usize,
    ) -> (
        RenditionPipeline<InMemoryRepository, impl TransformService>,
        Arc<InMemoryRepository>,
        Calls,
    ) {
        rendition_observability::init_for_tests();
        let repo = Arc::new(InMemoryRepository::new());
        let calls = Calls::default();
        let pipeline = RenditionPipeline::build(
            config(workers, queue_capacity),
            repo.clone(),
            counting_transform(calls.clone()),
        )
        .unwrap();
        (pipeline, repo, calls)
    }

    fn renditions(repo: &InMemoryRepository, parent: NodeId) -> Vec<NodeId> {
        repo.children(parent, &RelationIdentity::markdown_rendition())
            .unwrap()
    }

    fn rendition_text(repo: &InMemoryRepository, parent: NodeId) -> Vec<u8> {
        let rendition = match renditions(repo, parent).as_slice() {
            [only] => *only,
            other => panic!("expected exactly one rendition under {parent}, found {other:?}"),
        };
        repo.open_reader(rendition)
            .unwrap()
            .unwrap()
            .bytes()
            .to_vec()
    }

    /// What a host does when a PDF is uploaded into a folder.
    fn upload_pdf<R, T>(
        pipeline: &RenditionPipeline<R, T>,
        repo: &InMemoryRepository,
        uow: &UnitOfWork,
        bytes: &[u8],
    ) -> NodeId
    where
        R: RepositoryStore + 'static,
        T: TransformService + 'static,
    {
        let folder = repo.create_node(NodeType::Folder).unwrap();
        let doc = repo
            .create_document(MIMETYPE_PDF, "UTF-8", bytes.to_vec())
            .unwrap();
        let association = ChildAssociation::new(
            folder,
            doc,
            RelationIdentity::new(QName::content("contains"), QName::content("upload.pdf")),
        );

        pipeline
            .on_event(uow, &DocumentEvent::node_created(association.clone()))
            .unwrap();
        pipeline
            .on_event(uow, &DocumentEvent::child_association_created(association, true))
            .unwrap();
        pipeline
            .on_event(uow, &DocumentEvent::content_written(doc, true))
            .unwrap();
        doc
    }

    #[test]
    fn uploaded_pdf_gets_one_rendition_after_commit() {
        let (pipeline, repo, calls) = setup(2, 8);
        let uow = UnitOfWork::begin();

        let doc = upload_pdf(&pipeline, &repo, &uow, b"quarterly report");
        assert_eq!(pipeline.queue().pending_len(&uow), 1);
        assert!(renditions(&repo, doc).is_empty());

        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rendition_text(&repo, doc), b"# quarterly report");

        let rendition = renditions(&repo, doc)[0];
        assert!(repo.has_classification(rendition, &rendition_marker()).unwrap());
        assert_eq!(
            repo.open_reader(rendition).unwrap().unwrap().mimetype(),
            MIMETYPE_MARKDOWN
        );
    }

    #[test]
    fn rolled_back_uploads_never_run() {
        let (pipeline, repo, calls) = setup(2, 8);
        let uow = UnitOfWork::begin();

        let doc = upload_pdf(&pipeline, &repo, &uow, b"draft");
        uow.rollback();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(renditions(&repo, doc).is_empty());
    }

    #[test]
    fn pdf_rendition_links_render_into_the_parent() {
        let (pipeline, repo, _calls) = setup(1, 4);
        let word = repo
            .create_document("application/msword", "UTF-8", b"binary".to_vec())
            .unwrap();
        let pdf = repo
            .create_document(MIMETYPE_PDF, "UTF-8", b"converted".to_vec())
            .unwrap();

        let uow = UnitOfWork::begin();
        let link = ChildAssociation::new(
            word,
            pdf,
            RelationIdentity::new(QName::rendition("rendition"), QName::content("pdf")),
        );
        pipeline
            .on_event(&uow, &DocumentEvent::child_association_created(link, true))
            .unwrap();
        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(rendition_text(&repo, word), b"# converted");
    }

    #[test]
    fn non_pdf_content_is_ignored() {
        let (pipeline, repo, calls) = setup(1, 4);
        let text = repo
            .create_document("text/plain", "UTF-8", b"notes".to_vec())
            .unwrap();

        let uow = UnitOfWork::begin();
        pipeline
            .on_event(&uow, &DocumentEvent::content_written(text, true))
            .unwrap();
        assert_eq!(pipeline.queue().pending_len(&uow), 0);
        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(renditions(&repo, text).is_empty());
    }

    #[test]
    fn reuploads_refresh_the_existing_rendition() {
        let (pipeline, repo, _calls) = setup(1, 4);
        let first = UnitOfWork::begin();
        let doc = upload_pdf(&pipeline, &repo, &first, b"v1");
        first.commit().unwrap();
        pipeline.pool().shutdown();

        // The pool is stopped, so the second commit's job runs on this thread.
        let mut writer = repo.open_writer(doc, true).unwrap();
        writer.set_mimetype(MIMETYPE_PDF);
        writer.set_encoding("UTF-8");
        std::io::Write::write_all(&mut writer, b"v2").unwrap();
        repo.put_content(writer, rendition_core::ExpectedVersion::Any)
            .unwrap();

        let second = UnitOfWork::begin();
        pipeline
            .on_event(&second, &DocumentEvent::content_written(doc, true))
            .unwrap();
        second.commit().unwrap();

        assert_eq!(rendition_text(&repo, doc), b"# v2");
    }

    #[test]
    fn documents_deleted_before_dispatch_are_skipped() {
        let (pipeline, repo, calls) = setup(1, 4);
        let uow = UnitOfWork::begin();

        let doc = upload_pdf(&pipeline, &repo, &uow, b"short lived");
        repo.delete(doc).unwrap();
        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!repo.exists(doc).unwrap());
    }

    #[test]
    fn saturated_pools_still_render_everything() {
        let (pipeline, repo, calls) = setup(1, 0);
        let uow = UnitOfWork::begin();

        let docs: Vec<NodeId> = (0..8)
            .map(|i| upload_pdf(&pipeline, &repo, &uow, format!("doc {i}").as_bytes()))
            .collect();
        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        for (i, doc) in docs.into_iter().enumerate() {
            assert_eq!(rendition_text(&repo, doc), format!("# doc {i}").into_bytes());
        }
        let stats = pipeline.pool().stats();
        assert_eq!(stats.submitted, 8);
        assert_eq!(stats.completed, 8);
    }

    #[test]
    fn transient_conflicts_are_retried() {
        let (pipeline, repo, calls) = setup(1, 4);
        let uow = UnitOfWork::begin();
        let doc = upload_pdf(&pipeline, &repo, &uow, b"contended");
        repo.inject_version_conflicts(2);

        uow.commit().unwrap();
        pipeline.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(rendition_text(&repo, doc), b"# contended");
    }

    #[test]
    fn triggers_from_concurrent_units_of_work_converge() {
        let (pipeline, repo, _calls) = setup(4, 8);
        let doc = repo
            .create_document(MIMETYPE_PDF, "UTF-8", b"shared".to_vec())
            .unwrap();
        let pipeline = Arc::new(pipeline);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                thread::spawn(move || {
                    let uow = UnitOfWork::begin();
                    pipeline
                        .on_event(&uow, &DocumentEvent::content_written(doc, true))
                        .unwrap();
                    uow.commit().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        pipeline.shutdown();

        assert_eq!(rendition_text(&repo, doc), b"# shared");
    }

    #[test]
    fn racing_materializers_leave_a_single_rendition() {
        rendition_observability::init_for_tests();
        let repo = Arc::new(InMemoryRepository::new());
        let doc = repo
            .create_document(MIMETYPE_PDF, "UTF-8", b"race".to_vec())
            .unwrap();

        // Hold both first transforms until each thread has rendered, so both
        // look for an existing rendition at about the same time.
        let barrier = Arc::new(Barrier::new(2));
        let renders = Arc::new(AtomicUsize::new(0));
        let transform = {
            let barrier = barrier.clone();
            let renders = renders.clone();
            BytesTransform::new(MIMETYPE_PDF, move |bytes: &[u8]| {
                let n = renders.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    barrier.wait();
                }
                Ok(format!("render-{n}: ").into_bytes().into_iter().chain(bytes.iter().copied()).collect())
            })
        };
        let materializer = Arc::new(ArtifactMaterializer::new(
            repo.clone(),
            transform,
            &TransformConfig::default(),
        ));
        let transactions = TransactionService::new(RetryPolicy::fixed(10, Duration::from_millis(1)));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let materializer = materializer.clone();
                let transactions = transactions.clone();
                thread::spawn(move || {
                    transactions.run_in_transaction(|_uow| materializer.ensure(&Job::for_self(doc)))
                })
            })
            .collect();
        let outcomes: Vec<Result<EnsureOutcome, MaterializeError>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for outcome in &outcomes {
            assert!(matches!(outcome, Ok(o) if o.rendition().is_some()), "{outcome:?}");
        }
        let text = rendition_text(&repo, doc);
        assert!(text.starts_with(b"render-"));
        assert!(text.ends_with(b"race"));
    }
}

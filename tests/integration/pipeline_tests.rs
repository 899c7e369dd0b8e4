//! Pipeline integration tests
//!
//! Full runs against the scripted provider, checking the output snapshot and
//! usage log on disk.

#[cfg(test)]
mod tests {
    use crate::common::providers::Script;
    use crate::common::{Artifacts, MockClient, TableFactory, TestWorkspace};
    use batch_enrich::{EnrichError, EnrichmentPipeline};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("r{}", i)).collect()
    }

    #[tokio::test]
    async fn test_full_run_writes_every_row_and_batch() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_delay(Duration::from_millis(5)));
        let pipeline = EnrichmentPipeline::with_client(ws.config(10, 3), client.clone()).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(25), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total_batches, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.rows_written, 25);
        assert_eq!(client.calls(), 3);

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(
            out.header,
            vec!["id", "Role", "Path to impact", "Summary", "Career_Goals"]
        );
        assert_eq!(out.column("id"), ids(0..25));
        assert_eq!(out.row("r0")[2], "");
        assert_eq!(out.row("r21")[3], "Summary of r21");

        assert_eq!(out.usage.len(), 3);
        assert_eq!(out.covered_rows(), 25);
        assert_eq!(out.total_tokens(), summary.total_tokens);
        assert!(out.usage.iter().all(|u| u.error.is_empty()));
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r10", Script::Status(400)));
        let pipeline = EnrichmentPipeline::with_client(ws.config(10, 3), client).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(25), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.rows.len(), 25);
        for i in 10..20 {
            let row = out.row(&format!("r{}", i));
            assert_eq!(row[3], "");
            assert_eq!(row[4], "");
        }
        assert_eq!(out.row("r9")[3], "Summary of r9");
        assert_eq!(out.row("r20")[3], "Summary of r20");

        let failed = out.usage.iter().find(|u| u.batch_start == 10).unwrap();
        assert_eq!(failed.batch_end, 20);
        assert!(failed.error.contains("HTTP 400"));
        assert_eq!(failed.total_tokens, None);
        assert_eq!(out.usage.iter().filter(|u| !u.error.is_empty()).count(), 1);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_before_recording() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r0", Script::Status(503)));
        let mut config = ws.config(5, 1);
        config.max_retries = 1;
        let pipeline = EnrichmentPipeline::with_client(config, client.clone()).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(5), CancellationToken::new())
            .await
            .unwrap();

        // scripts key on the prompt, so the retry fails the same way
        assert_eq!(summary.failed, 1);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_short_response_is_padded() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r0", Script::Short(7)));
        let pipeline = EnrichmentPipeline::with_client(ws.config(10, 2), client).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(20), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.rows.len(), 20);
        assert_eq!(out.row("r6")[3], "Summary of r6");
        for id in ["r7", "r8", "r9"] {
            assert_eq!(out.row(id)[3], "");
        }
        assert_eq!(out.row("r10")[3], "Summary of r10");
        assert!(out.usage.iter().all(|u| u.error.is_empty()));
    }

    #[tokio::test]
    async fn test_long_response_is_truncated() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r0", Script::Long));
        let pipeline = EnrichmentPipeline::with_client(ws.config(4, 1), client).unwrap();

        pipeline
            .run(TableFactory::candidates(8), CancellationToken::new())
            .await
            .unwrap();

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.column("id"), ids(0..8));
        assert_eq!(out.row("r3")[3], "Summary of r3");
        assert!(!out.column("Summary").contains(&"extra".to_string()));
    }

    #[tokio::test]
    async fn test_prose_wrapped_response_is_repaired() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r0", Script::Chatty));
        let pipeline = EnrichmentPipeline::with_client(ws.config(3, 1), client).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(3), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.row("r2")[4], "Goals of r2");
    }

    #[tokio::test]
    async fn test_unparseable_response_fails_batch_but_keeps_tokens() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_script("r3", Script::Garbage));
        let pipeline = EnrichmentPipeline::with_client(ws.config(3, 2), client).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(6), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        let failed = out.usage.iter().find(|u| u.batch_start == 3).unwrap();
        assert!(failed.error.starts_with("Parse failure"));
        assert_eq!(failed.total_tokens, Some(180));
        assert_eq!(out.row("r4")[3], "");
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_and_admission_order() {
        for concurrency in [1, 2, 4] {
            let ws = TestWorkspace::new();
            let client = Arc::new(MockClient::new().with_delay(Duration::from_millis(15)));
            let pipeline =
                EnrichmentPipeline::with_client(ws.config(2, concurrency), client.clone()).unwrap();

            let summary = pipeline
                .run(TableFactory::candidates(20), CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(summary.succeeded, 10);
            assert!(client.max_in_flight() <= concurrency);
            if concurrency == 1 {
                let expected: Vec<String> = (0..10).map(|b| format!("r{}", b * 2)).collect();
                assert_eq!(client.dispatched(), expected);
            }

            let out = Artifacts::load(&ws.output(), &ws.usage_log());
            assert_eq!(out.column("id"), ids(0..20));
        }
    }

    #[tokio::test]
    async fn test_row_selection_uses_absolute_positions() {
        let ws = TestWorkspace::new();
        let mut config = ws.config(5, 2);
        config.row_start = Some(5);
        config.row_end = Some(12);
        let pipeline = EnrichmentPipeline::with_client(config, Arc::new(MockClient::new())).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(30), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total_batches, 2);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.column("id"), ids(5..12));

        let mut ranges: Vec<_> = out.usage.iter().map(|u| (u.batch_start, u.batch_end)).collect();
        ranges.sort();
        assert_eq!(ranges, vec![(5, 10), (10, 12)]);
    }

    #[tokio::test]
    async fn test_resume_appends_after_previous_rows() {
        let ws = TestWorkspace::new();

        let mut first = ws.config(10, 1);
        first.row_end = Some(10);
        EnrichmentPipeline::with_client(first, Arc::new(MockClient::new()))
            .unwrap()
            .run(TableFactory::candidates(25), CancellationToken::new())
            .await
            .unwrap();

        let mut second = ws.config(10, 2);
        second.row_start = Some(10);
        let summary = EnrichmentPipeline::with_client(second, Arc::new(MockClient::new()))
            .unwrap()
            .run(TableFactory::candidates(25), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 25);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.column("id"), ids(0..25));
        assert_eq!(out.usage.len(), 3);
        assert_eq!(out.covered_rows(), 25);
    }

    #[tokio::test]
    async fn test_no_resume_starts_over() {
        let ws = TestWorkspace::new();
        for _ in 0..2 {
            let mut config = ws.config(5, 1);
            config.output.resume = false;
            EnrichmentPipeline::with_client(config, Arc::new(MockClient::new()))
                .unwrap()
                .run(TableFactory::candidates(5), CancellationToken::new())
                .await
                .unwrap();
        }

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.rows.len(), 5);
        // the usage log is append-only either way
        assert_eq!(out.usage.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new());
        let pipeline = EnrichmentPipeline::with_client(ws.config(5, 2), client.clone()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = pipeline.run(TableFactory::candidates(20), cancel).await.unwrap();

        assert_eq!(summary.skipped, 4);
        assert!(summary.was_cancelled());
        assert_eq!(client.calls(), 0);

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert!(out.rows.is_empty());
        assert_eq!(out.header.len(), 5);
        assert!(out.usage.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_valid_partial_output() {
        let ws = TestWorkspace::new();
        let client = Arc::new(MockClient::new().with_delay(Duration::from_millis(20)));
        let pipeline = EnrichmentPipeline::with_client(ws.config(2, 1), client.clone()).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let summary = pipeline.run(TableFactory::candidates(20), cancel).await.unwrap();

        assert!(summary.skipped > 0);
        let recorded = summary.succeeded + summary.failed;
        assert_eq!(recorded + summary.skipped, 10);
        assert_eq!(client.calls(), recorded);

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.rows.len(), recorded * 2);
        assert_eq!(out.column("id"), ids(0..recorded * 2));
        assert_eq!(out.usage.len(), recorded);
    }

    #[tokio::test]
    async fn test_unwritable_output_fails_before_dispatch() {
        let ws = TestWorkspace::new();
        std::fs::create_dir(ws.output()).unwrap();
        let client = Arc::new(MockClient::new());
        let pipeline = EnrichmentPipeline::with_client(ws.config(5, 2), client.clone()).unwrap();

        let err = pipeline
            .run(TableFactory::candidates(10), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Persistence(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_mid_run_aborts_in_flight_calls() {
        let ws = TestWorkspace::new();
        let stall = Duration::from_millis(400);
        let client = Arc::new(
            MockClient::new()
                .with_delay(Duration::from_millis(5))
                .with_script("r0", Script::BlockOutput(ws.output()))
                .with_script("r5", Script::Stall(stall))
                .with_script("r10", Script::Stall(stall)),
        );
        let pipeline = EnrichmentPipeline::with_client(ws.config(5, 3), client.clone()).unwrap();
        let cancel = CancellationToken::new();

        let err = pipeline
            .run(TableFactory::candidates(30), cancel.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Persistence(_)));
        assert!(cancel.is_cancelled());
        let calls = client.calls();
        assert_eq!(calls, 3);

        tokio::time::sleep(stall * 2).await;
        assert_eq!(client.calls(), calls);
        assert_eq!(client.completed(), 1);
    }

    #[tokio::test]
    async fn test_run_file_drops_excluded_columns() {
        let ws = TestWorkspace::new();
        let input = ws.write("candidates.csv", &TableFactory::candidates_csv(7));
        let pipeline =
            EnrichmentPipeline::with_client(ws.config(3, 2), Arc::new(MockClient::new())).unwrap();

        let summary = pipeline.run_file(&input, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.total_batches, 3);
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert!(!out.header.contains(&"Email".to_string()));
        assert_eq!(out.column("id"), ids(0..7));
        assert_eq!(out.row("r4")[2], "");
        assert_eq!(out.row("r5")[2], "Policy work");
    }

    #[tokio::test]
    async fn test_run_file_keeps_repeated_columns() {
        let ws = TestWorkspace::new();
        let input = ws.write("notes.csv", "id,Notes,Notes\nr0,first,second\nr1,third,\n");
        let pipeline =
            EnrichmentPipeline::with_client(ws.config(5, 1), Arc::new(MockClient::new())).unwrap();

        pipeline.run_file(&input, CancellationToken::new()).await.unwrap();

        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert_eq!(out.header[..3], ["id", "Notes", "Notes.1"]);
        assert_eq!(out.column("Notes"), vec!["first", "third"]);
        assert_eq!(out.column("Notes.1"), vec!["second", ""]);
    }

    #[tokio::test]
    async fn test_empty_selection_writes_header_only() {
        let ws = TestWorkspace::new();
        let pipeline =
            EnrichmentPipeline::with_client(ws.config(5, 2), Arc::new(MockClient::new())).unwrap();

        let summary = pipeline
            .run(TableFactory::candidates(0), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total_batches, 0);
        assert!(!summary.was_cancelled());
        let out = Artifacts::load(&ws.output(), &ws.usage_log());
        assert!(out.rows.is_empty());
        assert_eq!(out.usage_header.len(), 8);
    }
}

mod common;

#[cfg(test)]
mod pipeline_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pagila_core::catalog::TABLES;
    use pagila_core::io::parquet::ParquetSource;
    use pagila_core::io::{load_tables, TableSource};
    use pagila_core::pipeline::{run_pipeline, PipelineOptions};
    use pagila_core::reports::Report;
    use pagila_error::PagilaError;
    use tokio_util::sync::CancellationToken;

    use crate::common::{init, tables, MemorySource};

    #[tokio::test]
    async fn test_pipeline_runs_every_report_in_order() {
        init();
        let source = Arc::new(MemorySource::new());

        let output = run_pipeline(source, PipelineOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        let reports = output.outcomes.iter().map(|o| o.report).collect::<Vec<_>>();
        assert_eq!(reports, Report::ALL.to_vec());
        assert_eq!(output.failures().count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        init();
        let options = PipelineOptions {
            parallel: true,
            profile: true,
            ..Default::default()
        };

        let parallel = run_pipeline(Arc::new(MemorySource::new()), options, CancellationToken::new())
            .await
            .unwrap();
        let sequential = run_pipeline(
            Arc::new(MemorySource::new()),
            PipelineOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_ne!(parallel.run_id, sequential.run_id);
        for (lhs, rhs) in parallel.outcomes.iter().zip(sequential.outcomes.iter()) {
            assert_eq!(lhs.report, rhs.report);
            assert_eq!(lhs.result.as_ref().unwrap(), rhs.result.as_ref().unwrap());
        }
    }

    #[tokio::test]
    async fn test_selected_reports_only() {
        init();
        let options = PipelineOptions {
            reports: vec![Report::FilmsNotInInventory, Report::FilmsPerCategory],
            ..Default::default()
        };

        let output = run_pipeline(Arc::new(MemorySource::new()), options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.outcomes.len(), 2);
        assert_eq!(output.outcomes[0].report, Report::FilmsNotInInventory);
        assert_eq!(output.outcomes[0].result.as_ref().unwrap().height(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_fatal() {
        init();
        let source = MemorySource {
            broken: Some("payment"),
            ..MemorySource::new()
        };
        let options = PipelineOptions {
            isolate_failures: true,
            ..Default::default()
        };

        let err = run_pipeline(Arc::new(source), options, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PagilaError::FetchError(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_report_failure_aborts_unless_isolated() {
        init();
        // Without `amount` the spend report cannot resolve its sum column.
        let mut source = MemorySource::new();
        let payment = source.frames["payment"]
            .select(&[pagila_core::expr::col("payment_id"), pagila_core::expr::col("rental_id")])
            .unwrap();
        source.frames.insert("payment", payment);
        let source: Arc<dyn TableSource> = Arc::new(source);

        let err = run_pipeline(source.clone(), PipelineOptions::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PagilaError::ColumnNotFound(_)));
        assert!(err.to_string().contains("report 3"));

        let options = PipelineOptions {
            isolate_failures: true,
            ..Default::default()
        };
        let output = run_pipeline(source, options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.outcomes.len(), 7);
        let failed = output.failures().map(|o| o.report).collect::<Vec<_>>();
        assert_eq!(failed, vec![Report::TopSpendCategory]);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        init();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = MemorySource {
            delay: Some(Duration::from_secs(5)),
            ..MemorySource::new()
        };

        let err = run_pipeline(Arc::new(source), PipelineOptions::default(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PagilaError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        init();
        let cancel = CancellationToken::new();
        let source = MemorySource {
            delay: Some(Duration::from_secs(5)),
            ..MemorySource::new()
        };

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let err = run_pipeline(Arc::new(source), PipelineOptions::default(), cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, PagilaError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        init();
        let source = MemorySource {
            delay: Some(Duration::from_secs(5)),
            ..MemorySource::new()
        };
        let options = PipelineOptions {
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };

        let err = run_pipeline(Arc::new(source), options, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PagilaError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_load_tables_qualifies_columns() {
        init();
        let tables = load_tables(&MemorySource::new()).await.unwrap();

        assert_eq!(tables.iter().count(), TABLES.len());
        assert_eq!(
            tables.category.get_column_names(),
            vec!["category.category_id", "category.name"]
        );
    }

    #[tokio::test]
    async fn test_parquet_export_round_trip() {
        init();
        let dir = std::env::temp_dir().join(format!("pagila-export-{}", uuid::Uuid::new_v4()));
        let options = PipelineOptions {
            reports: vec![Report::FilmsPerCategory],
            export_dir: Some(dir.clone()),
            ..Default::default()
        };

        let exported = run_pipeline(Arc::new(MemorySource::new()), options, CancellationToken::new())
            .await
            .unwrap();
        for table in TABLES {
            assert!(dir.join(format!("{}.parquet", table.name)).exists());
        }

        let parquet = ParquetSource::new(&dir);
        let category = parquet.fetch(&TABLES[0]).await.unwrap();
        assert_eq!(
            category.qualify("category").unwrap(),
            exported.tables.category
        );
        assert_eq!(category, tables().category.unqualified().unwrap());

        std::fs::remove_dir_all(dir).unwrap();
    }
}

#[cfg(test)]
mod merge_tests {
    use crate::dataset::{merge_tables, read_master, MergeOptions};
    use crate::{ensure_chrome_available, CaptureError, Config};
    use std::path::Path;

    fn dedup_options() -> MergeOptions {
        MergeOptions::from_key_index(4, false)
    }

    fn write_table(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
            .collect()
    }

    const HEADER: &str = "id,site,url,note,domain";

    #[test]
    fn test_dedup_uniqueness_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        // Name-sorted order: a.csv before b.csv
        write_table(
            dir.path(),
            "a.csv",
            &format!("{HEADER}\n7,first,http://a.com/x,keep,a.com\n9,other,http://b.com,n,b.com\n"),
        );
        write_table(
            dir.path(),
            "b.csv",
            &format!(
                "{HEADER}\n3,second,http://a.com/y,drop,a.com\n5,third,http://c.com,n,c.com\n"
            ),
        );

        let out = dir.path().join("total.csv");
        let count = merge_tables(dir.path(), &out, &dedup_options()).unwrap();
        assert_eq!(count, 3);

        let rows = read_rows(&out);
        let keys: Vec<&str> = rows[1..].iter().map(|r| r[4].as_str()).collect();
        assert_eq!(keys, vec!["a.com", "b.com", "c.com"]);

        // The first-encountered row's other fields are the ones retained
        assert_eq!(rows[1][1], "first");
        assert_eq!(rows[1][3], "keep");
    }

    #[test]
    fn test_dense_renumbering() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!(
                "{HEADER}\n\
                 99,s,http://a.com,n,a.com\n\
                 99,s,http://a.com,n,a.com\n\
                 42,s,http://b.com,n,b.com\n\
                 7,s,http://c.com,n,c.com\n"
            ),
        );

        let out = dir.path().join("total.csv");
        merge_tables(dir.path(), &out, &dedup_options()).unwrap();

        let rows = read_rows(&out);
        let sequence: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
        // Contiguous from 1, independent of which keys were deduplicated
        assert_eq!(sequence, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_idempotent_re_merge() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!("{HEADER}\n1,s,http://a.com,n,a.com\n2,s,http://b.com,n,b.com\n"),
        );
        write_table(
            dir.path(),
            "b.csv",
            &format!("{HEADER}\n1,s,http://a.com/dup,n,a.com\n"),
        );

        let first = dir.path().join("first.csv");
        merge_tables(dir.path(), &first, &dedup_options()).unwrap();

        // Feed the merged output back in as the only input
        let again_dir = tempfile::tempdir().unwrap();
        std::fs::copy(&first, again_dir.path().join("total.csv")).unwrap();
        let second = again_dir.path().join("second.csv");
        merge_tables(again_dir.path(), &second, &dedup_options()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_header_kept_from_first_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "a.csv", "");
        write_table(
            dir.path(),
            "b.csv",
            "id,brand,url,note,domain\n1,s,http://a.com,n,a.com\n",
        );
        write_table(
            dir.path(),
            "c.csv",
            &format!("{HEADER}\n2,s,http://b.com,n,b.com\n"),
        );

        let out = dir.path().join("total.csv");
        merge_tables(dir.path(), &out, &dedup_options()).unwrap();

        let rows = read_rows(&out);
        // b.csv is the first file with a header; c.csv's header is discarded
        assert_eq!(rows[0][1], "brand");
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_negative_key_disables_dedup() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!("{HEADER}\n1,s,http://a.com,n,a.com\n2,s,http://a.com,n,a.com\n"),
        );

        let out = dir.path().join("total.csv");
        let count = merge_tables(
            dir.path(),
            &out,
            &MergeOptions::from_key_index(-1, false),
        )
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_domain_variant_canonicalizes_and_collapses_subdomains() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!(
                "{HEADER}\n\
                 1,s,http://x,n,http://sub.example.co.uk/path\n\
                 2,s,http://y,n,https://other.example.co.uk/\n\
                 3,s,http://z,n,not a url at all\n"
            ),
        );

        let out = dir.path().join("domain.csv");
        let count =
            merge_tables(dir.path(), &out, &MergeOptions::from_key_index(4, true)).unwrap();
        // Two subdomains of one registrable domain collapse to one row
        assert_eq!(count, 2);

        let rows = read_rows(&out);
        assert_eq!(rows[1][4], "https://www.example.co.uk");
        // Extraction failure empties the field rather than leaving it stale
        assert_eq!(rows[2][4], "");
    }

    #[test]
    fn test_failed_canonicalizations_keep_every_row() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!(
                "{HEADER}\n\
                 1,s,http://x,n,not a url at all\n\
                 2,s,http://y,n,also not a url\n"
            ),
        );

        let out = dir.path().join("domain.csv");
        let count =
            merge_tables(dir.path(), &out, &MergeOptions::from_key_index(4, true)).unwrap();
        // Both rows fail extraction and end up with an empty key; a blank
        // key identifies nothing, so neither row is a duplicate of the other
        assert_eq!(count, 2);

        let rows = read_rows(&out);
        assert_eq!(rows[1][4], "");
        assert_eq!(rows[2][4], "");
        assert_eq!(rows[1][2], "http://x");
        assert_eq!(rows[2][2], "http://y");
    }

    #[test]
    fn test_missing_input_dir_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let out = dir.path().join("total.csv");

        let err = merge_tables(&missing, &out, &dedup_options()).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationError(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_header_only_inputs_are_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "a.csv", &format!("{HEADER}\n"));

        let out = dir.path().join("total.csv");
        let err = merge_tables(dir.path(), &out, &dedup_options()).unwrap_err();
        assert!(matches!(err, CaptureError::EmptyDataset));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_read_master_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            "a.csv",
            &format!("{HEADER}\n1,s,http://a.com/x,n,a.com\n2,s,http://b.com/y,n,b.com\n"),
        );

        let out = dir.path().join("total.csv");
        merge_tables(dir.path(), &out, &dedup_options()).unwrap();

        let records = read_master(&out, 2, 4).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence_id, 1);
        assert_eq!(records[0].url, "http://a.com/x");
        assert_eq!(records[0].domain, "a.com");
        assert_eq!(records[1].sequence_id, 2);
    }

    #[test]
    fn test_missing_chrome_path_is_missing_capability() {
        let config = Config {
            chrome_path: Some("/definitely/not/a/browser".to_string()),
            ..Default::default()
        };
        let err = ensure_chrome_available(&config).unwrap_err();
        assert!(matches!(err, CaptureError::MissingCapability(_)));
        assert!(err.is_fatal());
    }
}

#[cfg(test)]
mod config_tests {
    use crate::{Config, DatasetKind, DeviceProfile, OutputMode, PassSpec};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.key_column, 4);
        assert_eq!(config.url_column, 2);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert_eq!(config.cooldown, Duration::from_secs(5));
        assert_eq!(config.zoom_percent, 80);
        assert_eq!(config.desktop_viewport.width, 1280);
        assert_eq!(config.desktop_viewport.height, 2000);
        assert!(config.mobile_viewport.mobile);
        assert!(config.headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_zero_retries() {
        let config = Config {
            retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_zoom() {
        let config = Config {
            zoom_percent: 150,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.retry_attempts, config.retry_attempts);
        assert_eq!(parsed.platform_patterns, config.platform_patterns);
    }

    #[test]
    fn test_pass_labels_and_log_files_are_disjoint() {
        let mut labels = HashSet::new();

        for kind in [DatasetKind::Subdomain, DatasetKind::Domain] {
            for profile in [DeviceProfile::Desktop, DeviceProfile::Mobile] {
                for mode in [OutputMode::Screenshot, OutputMode::Html] {
                    let spec = PassSpec {
                        dataset_path: PathBuf::from(kind.file_name()),
                        kind,
                        profile,
                        mode,
                        output_dir: PathBuf::from(profile.dir_name()).join(mode.dir_name()),
                    };
                    assert!(labels.insert(spec.label()), "duplicate label");
                }
            }
        }

        // The full cross product: 2 datasets x 2 profiles x 2 modes
        assert_eq!(labels.len(), 8);
    }

    #[test]
    fn test_chrome_args_carry_profile_and_isolation() {
        use crate::get_chrome_args;

        let config = Config::default();
        let desktop = get_chrome_args(&config, DeviceProfile::Desktop, "laptop-png-total");
        assert!(desktop.contains(&"--window-size=1280,2000".to_string()));
        assert!(desktop.iter().any(|a| a.contains("laptop-png-total")));
        assert!(!desktop.iter().any(|a| a.starts_with("--user-agent=")));

        let mobile = get_chrome_args(&config, DeviceProfile::Mobile, "mobile-png-total");
        assert!(mobile.iter().any(|a| a.starts_with("--user-agent=")));
        assert!(mobile.contains(&"--window-size=390,844".to_string()));

        // Concurrent passes must not share a Chrome profile directory
        let dir_of = |args: &[String]| {
            args.iter()
                .find(|a| a.starts_with("--user-data-dir="))
                .cloned()
                .unwrap()
        };
        assert_ne!(dir_of(&desktop), dir_of(&mobile));
    }
}

/// End-to-end pass tests against a local HTTP fixture; these launch a real
/// Chrome/Chromium and run with `cargo test --features integration_tests`
#[cfg(feature = "integration_tests")]
mod pass_integration_tests {
    use crate::{pass, Config, DatasetKind, DeviceProfile, OutputMode, PassSpec};
    use std::path::Path;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const OK_BODY: &str =
        "<html><head><title>fixture</title></head><body><p>fixture</p></body></html>";

    /// Local fixture: `/ok` answers both probe and page load, `/nope` fails
    /// the probe with a 404
    async fn spawn_fixture_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let line = request.lines().next().unwrap_or_default().to_string();

                    let empty_status = |status: &str| {
                        format!(
                            "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        )
                    };
                    let response = if line.starts_with("HEAD /ok") {
                        empty_status("200 OK")
                    } else if line.starts_with("GET /ok") {
                        format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\n\
                             content-length: {}\r\nconnection: close\r\n\r\n{}",
                            OK_BODY.len(),
                            OK_BODY
                        )
                    } else {
                        empty_status("404 Not Found")
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn fast_config() -> Config {
        Config {
            retry_attempts: 1,
            retry_delay: Duration::from_millis(10),
            probe_timeout: Duration::from_secs(2),
            capture_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_millis(100),
            relayout_delay: Duration::from_millis(50),
            cooldown: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn write_master(path: &Path, rows: &[(String, &str)]) {
        let mut contents = String::from("id,site,url,note,domain\n");
        for (index, (url, domain)) in rows.iter().enumerate() {
            contents.push_str(&format!("{},s,{url},n,{domain}\n", index + 1));
        }
        std::fs::write(path, contents).unwrap();
    }

    fn html_spec(dataset_path: &Path, profile: DeviceProfile, output_dir: &Path) -> PassSpec {
        PassSpec {
            dataset_path: dataset_path.to_path_buf(),
            kind: DatasetKind::Subdomain,
            profile,
            mode: OutputMode::Html,
            output_dir: output_dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_row_failure_does_not_stop_the_pass() {
        let base = spawn_fixture_server().await;
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("total.csv");
        write_master(
            &dataset,
            &[
                (format!("{base}/nope"), "nope.test"),
                (format!("{base}/ok"), "ok.test"),
            ],
        );

        let out = dir.path().join("out");
        let spec = html_spec(&dataset, DeviceProfile::Desktop, &out);
        let report = pass::run_pass(&fast_config(), spec).await.unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.escalated, 0);

        let errors = std::fs::read_to_string(out.join("laptop-html-total_errors.log")).unwrap();
        assert!(errors.contains("nope.test"));
    }

    #[tokio::test]
    async fn test_timed_out_row_completes_the_pass_cleanly() {
        let base = spawn_fixture_server().await;
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("total.csv");
        write_master(&dataset, &[(format!("{base}/ok"), "ok.test")]);

        // The settle wait alone exceeds the row timeout, so the row times
        // out after its tab already exists; the pass must still finish and
        // release the browser
        let config = Config {
            capture_timeout: Duration::from_millis(50),
            settle_delay: Duration::from_secs(2),
            ..fast_config()
        };

        let out = dir.path().join("out");
        let spec = html_spec(&dataset, DeviceProfile::Desktop, &out);
        let report = pass::run_pass(&config, spec).await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 1);
        let errors = std::fs::read_to_string(out.join("laptop-html-total_errors.log")).unwrap();
        assert!(errors.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_concurrent_passes_are_independent() {
        let base = spawn_fixture_server().await;
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("total.csv");
        write_master(&dataset, &[(format!("{base}/ok"), "ok.test")]);

        let config = fast_config();
        let desktop_out = dir.path().join("laptop");
        let mobile_out = dir.path().join("mobile");
        let desktop_spec = html_spec(&dataset, DeviceProfile::Desktop, &desktop_out);
        let mobile_spec = html_spec(&dataset, DeviceProfile::Mobile, &mobile_out);

        let (desktop, mobile) = tokio::join!(
            pass::run_pass(&config, desktop_spec),
            pass::run_pass(&config, mobile_spec),
        );

        let desktop = desktop.unwrap();
        let mobile = mobile.unwrap();
        assert_eq!(desktop.succeeded, 1);
        assert_eq!(mobile.succeeded, 1);
        assert!(desktop_out.join("laptop-html-total_errors.log").exists());
        assert!(mobile_out.join("mobile-html-total_errors.log").exists());
    }
}

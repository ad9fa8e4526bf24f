//! End-to-end integration tests
//!
//! These tests run the complete pipeline against predefined CSV fixtures.
//! Each fixture directory under tests/fixtures/ holds:
//! 1. accounts.csv - the seed for the account store
//! 2. requests.csv - the batch of ledger requests
//! 3. expected.csv - the response CSV without its timestamp column
//! 4. expected_accounts.csv - final account states
//!
//! Fixtures run with a single worker so ledger entry numbering is
//! deterministic.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_ledger_engine::io::write_accounts_csv;
    use rust_ledger_engine::{DispatcherConfig, Pipeline, PipelineConfig, ReadConfig, RetryPolicy};
    use std::fs;
    use std::path::Path;

    const TIMESTAMP_COLUMN: usize = 5;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig {
            read: ReadConfig::default(),
            dispatcher: DispatcherConfig::new(1, None),
            retry: RetryPolicy::no_retry(),
        })
    }

    /// Drop the timestamp column and re-serialize with the same quoting rules
    fn without_timestamps(output: &[u8]) -> String {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(output);
        let mut writer = csv::Writer::from_writer(Vec::new());

        for record in reader.records() {
            let record = record.expect("response CSV should parse");
            let fields: Vec<&str> = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != TIMESTAMP_COLUMN)
                .map(|(_, field)| field)
                .collect();
            writer.write_record(&fields).expect("write record");
        }

        String::from_utf8(writer.into_inner().expect("flush writer")).expect("utf-8 output")
    }

    fn read_fixture(path: &str) -> String {
        assert!(Path::new(path).exists(), "Fixture file not found: {}", path);
        fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
    }

    /// Run a fixture and compare responses and final accounts with the expected files
    fn run_test_fixture(fixture_name: &str) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let accounts_path = format!("{}/accounts.csv", fixture_dir);
        let requests_path = format!("{}/requests.csv", fixture_dir);

        let mut output = Vec::new();
        let accounts = pipeline()
            .run(Path::new(&accounts_path), Path::new(&requests_path), &mut output)
            .unwrap_or_else(|e| panic!("Failed to process fixture {}: {}", fixture_name, e));

        let actual_output = without_timestamps(&output);
        let expected_output = read_fixture(&format!("{}/expected.csv", fixture_dir));
        assert_eq!(
            actual_output, expected_output,
            "\n\nResponse mismatch for fixture: {}\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, actual_output, expected_output
        );

        let mut accounts_output = Vec::new();
        write_accounts_csv(&accounts, &mut accounts_output).expect("write accounts");
        let actual_accounts = String::from_utf8(accounts_output).expect("utf-8 output");
        let expected_accounts = read_fixture(&format!("{}/expected_accounts.csv", fixture_dir));
        assert_eq!(
            actual_accounts, expected_accounts,
            "\n\nAccount mismatch for fixture: {}\n",
            fixture_name
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("credit_limit")]
    #[case("reversals")]
    #[case("transfers")]
    #[case("malformed_data")]
    fn test_fixtures(#[case] fixture: &str) {
        run_test_fixture(fixture);
    }

    #[test]
    fn test_timestamps_are_rfc3339_utc() {
        let mut output = Vec::new();
        pipeline()
            .run(
                Path::new("tests/fixtures/happy_path/accounts.csv"),
                Path::new("tests/fixtures/happy_path/requests.csv"),
                &mut output,
            )
            .unwrap();

        let mut reader = csv::Reader::from_reader(output.as_slice());
        for record in reader.records() {
            let timestamp = record.unwrap()[TIMESTAMP_COLUMN].to_string();
            assert!(timestamp.ends_with('Z'), "not UTC: {}", timestamp);
            assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
        }
    }
}

//! Integration tests driving whole units of work
//!
//! Each test runs the metadata and content passes against the in-memory or
//! file-backed store and the in-process fake API, then checks what reached
//! the API and what the store remembers.

use chrono::{Duration, NaiveDate};
use dwd_importer::app::adapters::api_resilience::LookupCache;
use dwd_importer::app::adapters::fake_api::FakeApi;
use dwd_importer::app::adapters::product_source::RawProduct;
use dwd_importer::app::adapters::sensor_api::ApiError;
use dwd_importer::app::adapters::sensor_store::{JsonFileStore, MemoryStore, SensorStore};
use dwd_importer::app::models::{Measurand, SentRange, Sensor, TimeClass, Timestamp};
use dwd_importer::app::services::file_catalog::discover_units;
use dwd_importer::app::services::unit_of_work::{RunSettings, UnitOutcome, UnitReport, UnitRunner};
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = "STATIONS_ID;MESS_DATUM;TT_TU;RF_TU";
const METADATA_HEADER: &str =
    "Stations_id;Stationshoehe;Geogr.Breite;Geogr.Laenge;von_datum;bis_datum;Stationsname";

fn hour(h: i64) -> Timestamp {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(h)
}

/// Hourly temperature/humidity product for station 00001 starting 2020-01-01T00
fn product(temperatures: &[&str]) -> RawProduct {
    let mut text = format!("{}\n", HEADER);
    for (h, t) in temperatures.iter().enumerate() {
        text.push_str(&format!("00001;20200101{:02};{};80.0\n", h, t));
    }
    RawProduct::from_text(&text).unwrap()
}

fn metadata_lines(period: &str) -> Vec<String> {
    vec![
        METADATA_HEADER.to_string(),
        format!("00001;202;50.7827;6.0941;{};Aachen", period),
        "generiert: 05.01.2024 --  Deutscher Wetterdienst  --".to_string(),
    ]
}

fn open_sensor(local_id: &str, measurand: Measurand, remote_id: u64, sent: Vec<SentRange>) -> Sensor {
    Sensor {
        local_id: local_id.to_string(),
        remote_id,
        measurand,
        unit: measurand.unit().to_string(),
        index: 0,
        earliest_day: hour(0),
        latest_day: None,
        sent_ranges: sent,
    }
}

fn runner(api: Arc<FakeApi>, store: Arc<dyn SensorStore>) -> UnitRunner {
    UnitRunner::new(
        api,
        store,
        Arc::new(LookupCache::default()),
        RunSettings::default(),
    )
}

fn finished(outcome: UnitOutcome) -> UnitReport {
    match outcome {
        UnitOutcome::Finished { report, .. } => report,
        UnitOutcome::Failed { unit, message } => panic!("unit {} failed: {}", unit, message),
    }
}

#[tokio::test]
async fn test_metadata_then_content_end_to_end() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let runner = runner(api.clone(), store.clone());

    let lines = metadata_lines("20200101;");
    let report = finished(
        runner
            .run_product(
                "station-00001",
                &product(&["-999.0", "5.0"]),
                Some(&lines),
                Measurand::Temperature,
                &TimeClass::Hourly,
            )
            .await,
    );

    // One station line, a temperature and a humidity sensor
    let metadata = report.metadata.unwrap();
    assert_eq!(metadata.station_lines, 1);
    assert_eq!(metadata.created, 2);
    assert_eq!(api.created_sensors().await.len(), 2);

    // The missing temperature is skipped, both humidity values go out
    let values = api.pushed_values().await;
    let temperatures: Vec<_> = values.iter().filter(|v| v.sensor_id == 1000).collect();
    assert_eq!(temperatures.len(), 1);
    assert_eq!(temperatures[0].number_value, 5.0);
    assert_eq!(temperatures[0].timestamp, "2020-01-01T01:00:00");
    assert_eq!(values.iter().filter(|v| v.sensor_id == 1001).count(), 2);

    let totals = report.content.emit_totals();
    assert_eq!(totals.values_sent, 3);
    assert_eq!(totals.values_missing, 1);

    let counters = store.counters().await.unwrap();
    assert_eq!(counters.value_count, 3);
    assert_eq!(counters.aimed_value_count, 3);
    assert_eq!(counters.action_count, 1);

    let mapping = store.find_mapping("00001-temperature").await.unwrap().unwrap();
    assert_eq!(mapping.sensors[0].sent_ranges, vec![SentRange::new(hour(0), hour(1))]);
}

#[tokio::test]
async fn test_rerun_sends_nothing_new() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let runner = runner(api.clone(), store.clone());
    let lines = metadata_lines("20200101;");
    let raw = product(&["1.0", "2.0", "3.0"]);

    finished(
        runner
            .run_product("first", &raw, Some(&lines), Measurand::Temperature, &TimeClass::Hourly)
            .await,
    );
    let pushed_once = api.pushed_batches().await.len();

    let report = finished(
        runner
            .run_product("second", &raw, Some(&lines), Measurand::Temperature, &TimeClass::Hourly)
            .await,
    );

    assert_eq!(api.pushed_batches().await.len(), pushed_once);
    assert_eq!(api.created_sensors().await.len(), 2);
    let metadata = report.metadata.unwrap();
    assert_eq!(metadata.created, 0);
    assert_eq!(metadata.unchanged, 2);

    let totals = report.content.emit_totals();
    assert_eq!(totals.values_sent, 0);
    assert_eq!(totals.rows_already_sent, 6);
}

#[tokio::test]
async fn test_only_unsent_hours_are_pushed() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    store.insert_mapping("00001-temperature").await.unwrap();
    store
        .add_sensor(open_sensor(
            "00001-temperature",
            Measurand::Temperature,
            7,
            vec![SentRange::new(hour(0), hour(5))],
        ))
        .await
        .unwrap();

    let temperatures: Vec<String> = (0..=10).map(|h| format!("{}.5", h)).collect();
    let temperatures: Vec<&str> = temperatures.iter().map(String::as_str).collect();

    let report = finished(
        runner(api.clone(), store.clone())
            .run_product(
                "partial",
                &product(&temperatures),
                None,
                Measurand::Temperature,
                &TimeClass::Hourly,
            )
            .await,
    );

    let values = api.pushed_values().await;
    let timestamps: Vec<&str> = values.iter().map(|v| v.timestamp.as_str()).collect();
    assert_eq!(
        timestamps,
        vec![
            "2020-01-01T06:00:00",
            "2020-01-01T07:00:00",
            "2020-01-01T08:00:00",
            "2020-01-01T09:00:00",
            "2020-01-01T10:00:00",
        ]
    );
    assert!(values.iter().all(|v| v.sensor_id == 7));

    // Humidity has no sensor yet and is skipped as a whole
    let humidity = report
        .content
        .measurands
        .iter()
        .find(|m| m.measurand == Measurand::Humidity)
        .unwrap();
    assert_eq!(humidity.sensors, 0);
    assert_eq!(humidity.dropped, 11);

    // The new range joins the old one on the closing merge
    let mapping = store.find_mapping("00001-temperature").await.unwrap().unwrap();
    assert_eq!(mapping.sensors[0].sent_ranges, vec![SentRange::new(hour(0), hour(10))]);
}

#[tokio::test]
async fn test_cloudiness_eighths() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    store.insert_mapping("00001-cloudiness").await.unwrap();
    store
        .add_sensor(open_sensor("00001-cloudiness", Measurand::Cloudiness, 9, Vec::new()))
        .await
        .unwrap();

    let raw = RawProduct::from_text(
        "STATIONS_ID;MESS_DATUM;QN_8;V_N_I;V_N;eor\n\
         00001;2020010100;1;P;8;eor\n\
         00001;2020010101;1;P;4;eor\n",
    )
    .unwrap();

    let report = finished(
        runner(api.clone(), store.clone())
            .run_product("clouds", &raw, None, Measurand::Cloudiness, &TimeClass::Hourly)
            .await,
    );

    let values = api.pushed_values().await;
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].number_value, 0.5);
    assert_eq!(values[0].timestamp, "2020-01-01T01:00:00");
    assert_eq!(report.content.emit_totals().values_missing, 1);
}

#[tokio::test]
async fn test_failed_push_is_retried_on_next_run() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    store.insert_mapping("00001-temperature").await.unwrap();
    store
        .add_sensor(open_sensor("00001-temperature", Measurand::Temperature, 7, Vec::new()))
        .await
        .unwrap();
    api.script_pushes(vec![Err(ApiError::Timeout("gateway timeout".to_string()))])
        .await;

    let runner = runner(api.clone(), store.clone());
    let raw = product(&["1.0", "2.0"]);

    let report = finished(
        runner
            .run_product("flaky", &raw, None, Measurand::Temperature, &TimeClass::Hourly)
            .await,
    );
    assert_eq!(report.content.emit_totals().batches_failed, 1);
    assert!(api.pushed_values().await.is_empty());

    let counters = store.counters().await.unwrap();
    assert_eq!(counters.aimed_value_count, 2);
    assert_eq!(counters.value_count, 0);

    let report = finished(
        runner
            .run_product("flaky", &raw, None, Measurand::Temperature, &TimeClass::Hourly)
            .await,
    );
    assert_eq!(report.content.emit_totals().values_sent, 2);
    assert_eq!(api.pushed_values().await.len(), 2);
}

#[tokio::test]
async fn test_closed_sensor_drops_newer_observations() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let runner = runner(api.clone(), store.clone());

    // Period closes on 2020-01-01, so only the midnight hour is covered
    let lines = metadata_lines("20190101;20200101");
    let report = finished(
        runner
            .run_product(
                "closed",
                &product(&["1.0", "2.0", "3.0"]),
                Some(&lines),
                Measurand::Temperature,
                &TimeClass::Hourly,
            )
            .await,
    );

    let temperature = report
        .content
        .measurands
        .iter()
        .find(|m| m.measurand == Measurand::Temperature)
        .unwrap();
    assert_eq!(temperature.chunks, 1);
    assert_eq!(temperature.uncovered_tail, 2);
    assert_eq!(temperature.dropped, 2);
    assert_eq!(temperature.emit.values_sent, 1);
}

#[tokio::test]
async fn test_unavailable_store_fails_the_unit() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);

    let outcome = runner(api.clone(), store.clone())
        .run_product(
            "offline",
            &product(&["1.0"]),
            None,
            Measurand::Temperature,
            &TimeClass::Hourly,
        )
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.unit(), "offline");
    assert!(api.pushed_batches().await.is_empty());
}

#[tokio::test]
async fn test_missing_station_id_fails_the_unit() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let raw = RawProduct::from_text(&format!("{}\n ;2020010100;1.0;80.0\nx;2020010101;2.0;80.0\n", HEADER))
        .unwrap();

    let outcome = runner(api, store)
        .run_product("broken", &raw, None, Measurand::Temperature, &TimeClass::Hourly)
        .await;

    match outcome {
        UnitOutcome::Failed { message, .. } => assert!(message.contains("station id")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_once_per_unit() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let settings = RunSettings {
        credentials: Some(("importer".to_string(), "secret".to_string())),
        ..RunSettings::default()
    };
    let runner = UnitRunner::new(api.clone(), store, Arc::new(LookupCache::default()), settings);

    for label in ["a", "b"] {
        finished(
            runner
                .run_product(label, &product(&["1.0"]), None, Measurand::Temperature, &TimeClass::Hourly)
                .await,
        );
    }
    assert_eq!(api.login_count(), 2);
}

#[tokio::test]
async fn test_directory_units_with_file_store() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("stundenwerte_TU_00001_akt");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("produkt_tu_stunde_20200101_20200101_00001.txt"),
        format!("{}\n00001;2020010100;1.5;80.0\n00001;2020010101;2.5;81.0\n", HEADER),
    )
    .unwrap();
    std::fs::write(
        data.join("Metadaten_Geographie_00001.txt"),
        metadata_lines("20200101;").join("\n"),
    )
    .unwrap();

    let units = discover_units(temp_dir.path(), None).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].group, Measurand::Temperature);
    assert!(units[0].metadata.is_some());

    let store_path = temp_dir.path().join("state").join("sensors.json");
    let api = Arc::new(FakeApi::new());
    {
        let store = Arc::new(JsonFileStore::open(&store_path).await.unwrap());
        let report = finished(runner(api.clone(), store).run(&units[0]).await);
        assert_eq!(report.content.emit_totals().values_sent, 4);
    }

    // A fresh store instance sees what the run recorded
    let reopened = JsonFileStore::open(&store_path).await.unwrap();
    let mappings = reopened.all_mappings().await.unwrap();
    assert_eq!(mappings.len(), 2);
    let counters = reopened.counters().await.unwrap();
    assert_eq!(counters.value_count, 4);

    let temperature = reopened
        .find_mapping("00001-temperature")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        temperature.sensors[0].sent_ranges,
        vec![SentRange::new(hour(0), hour(1))]
    );
}

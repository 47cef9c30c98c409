//! End-to-end pipeline scenarios against the in-memory store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use coin_pulse_core::{AnnotatorConfig, CollectorConfig, MentionConfig, Sentiment, TrendConfig};
use coin_pulse_data::{
    AnnotationKind, CandleStore, EntityMentionRecord, EventStore, MemoryStore,
    MentionStore, NewRawEvent, SeriesCandleRecord, TrackedEntity, TrendDirection, TrendStore,
};
use coin_pulse_pipeline::{
    AnalysisServices, BackfillRange, BatchAnnotator, MentionLinker, SeriesCollector,
    TrendDetector, UnprocessedSelector, UpbitClient,
};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bitcoin() -> TrackedEntity {
    TrackedEntity {
        coin_id: 1,
        coin_name: "비트코인".to_string(),
        symbol: "BTC".to_string(),
    }
}

fn annotator(store: &Arc<MemoryStore>) -> BatchAnnotator {
    let services = AnalysisServices::lexicon();
    BatchAnnotator::new(
        store.clone(),
        services.tagger,
        services.classifier,
        AnnotatorConfig::default(),
    )
}

fn linker(store: &Arc<MemoryStore>) -> MentionLinker {
    MentionLinker::new(store.clone(), store.clone(), MentionConfig::default())
}

async fn store_with_messages(texts: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_entity(bitcoin(), &["BTC"]);
    let base = Utc::now() - Duration::hours(2);
    let events: Vec<NewRawEvent> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            NewRawEvent::new(
                base + Duration::minutes(i as i64),
                *text,
                "코인 토론방",
                "alice",
                "Telegram",
            )
        })
        .collect();
    store.insert_events(&events).await.unwrap();
    store
}

// ============================================
// Annotation
// ============================================

#[tokio::test]
async fn test_annotator_rerun_leaves_rows_unchanged() {
    let store = store_with_messages(&["비트코인 급등", "리플 폭락", "점심 뭐 먹지"]).await;
    let annotator = annotator(&store);

    annotator.run_morphology().await.unwrap();
    annotator.run_sentiment().await.unwrap();
    let after_first = store.annotations();

    let morphology = annotator.run_morphology().await.unwrap();
    let sentiment = annotator.run_sentiment().await.unwrap();

    assert_eq!(morphology.selected, 0);
    assert_eq!(sentiment.selected, 0);
    assert_eq!(store.annotations(), after_first);
    assert_eq!(after_first.len(), 3);
}

#[tokio::test]
async fn test_selector_never_returns_annotated_events() {
    let store = store_with_messages(&["비트코인 간다", "BTC 떡상"]).await;
    let annotator = annotator(&store);
    let selector = UnprocessedSelector::new(store.clone());

    annotator.run_morphology().await.unwrap();
    assert!(selector
        .select(AnnotationKind::Morphology, None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        selector.select(AnnotationKind::Sentiment, None).await.unwrap().len(),
        2
    );

    annotator.run_sentiment().await.unwrap();
    assert!(selector
        .select(AnnotationKind::Sentiment, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_headline_is_annotated_and_linked() {
    let store = store_with_messages(&["비트코인 급등"]).await;

    let morphology = annotator(&store).run_morphology().await.unwrap();
    let sentiment = annotator(&store).run_sentiment().await.unwrap();
    assert_eq!(morphology.written, 1);
    assert_eq!(sentiment.written, 1);

    let annotations = store.annotations();
    let annotation = &annotations[0];
    assert!(annotation.nouns.as_ref().is_some_and(|n| !n.is_empty()));
    assert!(Sentiment::LABELS.contains(&annotation.parsed_sentiment().unwrap()));

    let stats = linker(&store).run().await.unwrap();
    assert_eq!(stats.inserted, 1);

    let mentions = store.mentions();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].coin_id, bitcoin().coin_id);
    assert_eq!(mentions[0].analysis_id, annotation.analysis_id);
    assert_eq!(mentions[0].timestamp, annotation.timestamp);

    // linked events are no longer selected
    let again = linker(&store).run().await.unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn test_mention_waits_for_annotation() {
    let store = store_with_messages(&["BTC 비트코인 둘 다"]).await;

    let early = linker(&store).run().await.unwrap();
    assert_eq!(early.matched, 1);
    assert_eq!(early.deferred, 1);
    assert!(store.mentions().is_empty());

    annotator(&store).run_morphology().await.unwrap();

    let later = linker(&store).run().await.unwrap();
    assert_eq!(later.deferred, 0);
    // two aliases of one entity produce one mention
    assert_eq!(store.mentions().len(), 1);
}

// ============================================
// Candles
// ============================================

#[tokio::test]
async fn test_first_candle_write_wins() {
    let store = MemoryStore::new();
    let ts = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
    let candle = |close| SeriesCandleRecord {
        coin_id: 1,
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: dec!(1),
    };

    store.insert_candles(&[candle(dec!(100))]).await.unwrap();
    store.insert_candles(&[candle(dec!(200))]).await.unwrap();

    let stored = store.candles();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].close, dec!(100));
}

fn upbit_candle(ts: DateTime<Utc>, volume: f64) -> serde_json::Value {
    json!({
        "market": "KRW-BTC",
        "candle_date_time_utc": ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "opening_price": 143000000.0,
        "high_price": 143500000.0,
        "low_price": 142800000.0,
        "trade_price": 143100000.0,
        "candle_acc_trade_volume": volume
    })
}

async fn mount_markets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/market/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"market": "KRW-BTC", "korean_name": "비트코인", "english_name": "Bitcoin"}
        ])))
        .mount(server)
        .await;
}

fn collector_config(server: &MockServer) -> CollectorConfig {
    CollectorConfig {
        base_url: server.uri(),
        request_delay_ms: 0,
        requests_per_second: 100,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_backfill_ends_after_short_page() {
    let server = MockServer::start().await;
    mount_markets(&server).await;

    let newest = Utc.with_ymd_and_hms(2024, 12, 8, 0, 0, 0).unwrap();
    let page: Vec<serde_json::Value> = (0..57)
        .map(|i| upbit_candle(newest - Duration::hours(i), 2e12))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1/candles/minutes/60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.add_entity(bitcoin(), &[]);
    let config = collector_config(&server);
    let collector = SeriesCollector::new(
        Arc::new(UpbitClient::new(&config).unwrap()),
        store.clone(),
        config,
    );

    let stats = collector
        .backfill_all(BackfillRange::Explicit { from: None, to: None })
        .await
        .unwrap();

    assert_eq!(stats.requests, 1);
    assert_eq!(stats.inserted, 57);

    // volume 2 x 10^12 is stored as 2 x 10^6
    let candles = store.candles();
    assert!(candles.iter().all(|c| c.volume == dec!(2000000)));
    assert_eq!(
        store.latest_candle_timestamp(1).await.unwrap(),
        Some(newest)
    );
}

// ============================================
// Trends
// ============================================

async fn mentions_at(store: &MemoryStore, first_id: i64, count: i64, ts: DateTime<Utc>) {
    let rows: Vec<EntityMentionRecord> = (0..count)
        .map(|i| EntityMentionRecord {
            analysis_id: first_id + i,
            timestamp: ts,
            coin_id: 1,
        })
        .collect();
    store.insert_mentions(&rows).await.unwrap();
}

#[tokio::test]
async fn test_boundary_mention_counted_in_one_window() {
    let store = Arc::new(MemoryStore::new());
    let detector = TrendDetector::new(store.clone(), &TrendConfig::default()).unwrap();
    let d = detector
        .day_start(NaiveDate::from_ymd_opt(2024, 12, 10).unwrap())
        .unwrap();
    mentions_at(&store, 1, 1, d + Duration::days(3)).await;

    let first = store.count_mentions(d, d + Duration::days(3)).await.unwrap();
    let second = store
        .count_mentions(d + Duration::days(1), d + Duration::days(4))
        .await
        .unwrap();

    assert!(first.is_empty());
    assert_eq!(second.get(&1), Some(&1));
}

#[tokio::test]
async fn test_falling_mentions_record_decrease() {
    let store = Arc::new(MemoryStore::new());
    let detector = TrendDetector::new(store.clone(), &TrendConfig::default()).unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 12, 10).unwrap();
    let boundary = detector.day_start(day).unwrap();

    // five in the previous window, two in the current one
    mentions_at(&store, 1, 5, boundary - Duration::days(2)).await;
    mentions_at(&store, 100, 2, boundary + Duration::hours(12)).await;

    let stats = detector
        .detect(day, day + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(stats.decreases, 1);
    assert_eq!(stats.increases, 0);

    let signals = store.signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].coin_id, 1);
    assert_eq!(signals[0].timestamp, boundary);
    assert_eq!(signals[0].parsed_direction(), Some(TrendDirection::Decrease));
    assert_eq!(signals[0].magnitude, 3);
    assert_eq!(signals[0].reason, "Decrease 3 in mentions");
}

#[tokio::test]
async fn test_recent_run_covers_lookback_through_today() {
    let store = Arc::new(MemoryStore::new());
    let config = TrendConfig {
        lookback_days: 5,
        ..Default::default()
    };
    let detector = TrendDetector::new(store.clone(), &config).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 12, 10, 6, 0, 0).unwrap();
    let today = detector.day_start(detector.local_date(now)).unwrap();
    mentions_at(&store, 1, 4, today + Duration::hours(1)).await;

    let stats = detector.run_recent(now).await.unwrap();

    assert_eq!(stats.days, 6);
    // today and the two days before see the new mentions in their current window
    assert_eq!(stats.increases, 3);
    assert_eq!(stats.decreases, 0);
    assert_eq!(store.signals().len(), 3);
}

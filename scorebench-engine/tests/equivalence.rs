//! Cross-path agreement: the streaming orchestrator must produce the
//! same statistics as a single-pass in-memory computation over the same
//! rows, for every scoring type and any batch size, and the comparison
//! engine's fast paths must agree with its streaming route.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use scorebench_engine::{
    compute_in_memory, nominal_comparison_from_table, numeric_comparison_from_aggregate,
    numeric_comparison_from_pairs, ChangeTable, Comparison, ComparisonConfig, ComparisonEngine,
    NoFastPath, OrdinalPolicy, PairedAggregateQuery, PairedKey, PairedNumericAggregate,
    PairedRow, RowStatus, Scale, ScalePoint, ScoreValue, ScoredRow, ScoringType, SeededRandom,
    StatKey, StatisticsOrchestrator, VecAggregateQuery, VecPairedSource, VecRowSource,
};
use scorebench_stats::{mean, std_dev};

fn row(id: u64, value: Option<ScoreValue>, status: RowStatus) -> ScoredRow {
    ScoredRow {
        id,
        // ids 1 and 2 share a timestamp so the id tie-breaker is exercised
        created_at: Utc
            .timestamp_opt(1_700_000_000 + (id.max(2) as i64), 0)
            .unwrap(),
        value,
        status,
    }
}

fn key() -> StatKey {
    StatKey {
        evaluation_id: 42,
        score_id: 1,
        experiment_id: Some(9),
    }
}

fn paired_key() -> PairedKey {
    PairedKey {
        evaluation_id: 42,
        score_id: 1,
        experiment_a: 8,
        experiment_b: 9,
    }
}

fn quality_scale() -> Scale {
    Scale::new(vec![
        ScalePoint::new("Bad", 1),
        ScalePoint::new("Ok", 2),
        ScalePoint::new("Good", 3),
    ])
    .unwrap()
}

fn mixed_numeric_rows() -> Vec<ScoredRow> {
    let mut rows: Vec<ScoredRow> = (1..=17)
        .map(|i| {
            row(
                i,
                Some(ScoreValue::Number((i as f64) * 0.5 - 3.0)),
                RowStatus::Done,
            )
        })
        .collect();
    rows.push(row(18, None, RowStatus::Pending));
    rows.push(row(19, Some(ScoreValue::Number(99.0)), RowStatus::Failed));
    rows.push(row(20, None, RowStatus::Done));
    rows
}

fn mixed_ordinal_rows() -> Vec<ScoredRow> {
    let codes = [
        "Good", "Bad", "Ok", "Good", "Good", "Ok", "Bad", "Good", "2", "unknown",
    ];
    let mut rows: Vec<ScoredRow> = codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            row(
                i as u64 + 1,
                Some(ScoreValue::Text((*code).into())),
                RowStatus::Done,
            )
        })
        .collect();
    rows.push(row(90, None, RowStatus::Pending));
    rows
}

async fn streamed(rows: &[ScoredRow], scoring: &ScoringType, batch_size: usize) {
    let orchestrator = StatisticsOrchestrator::with_batch_size(
        VecRowSource::new(rows.to_vec()),
        VecAggregateQuery::new(rows.to_vec()),
        batch_size,
    );
    let streamed = orchestrator.compute(&key(), scoring).await.unwrap();
    let reference = compute_in_memory(rows, scoring);
    assert_eq!(
        streamed, reference,
        "batch size {batch_size} diverged from the in-memory path"
    );
}

#[tokio::test]
async fn numeric_statistics_agree_across_batch_sizes() {
    let rows = mixed_numeric_rows();
    for batch_size in [1, 3, 7, 2000] {
        streamed(&rows, &ScoringType::Numeric, batch_size).await;
    }
}

#[tokio::test]
async fn nominal_statistics_agree_across_batch_sizes() {
    let codes = ["cat", "dog", "cat", "bird", "dog", "cat", "bird"];
    let mut rows: Vec<ScoredRow> = codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            row(
                i as u64 + 1,
                Some(ScoreValue::Text((*code).into())),
                RowStatus::Done,
            )
        })
        .collect();
    rows.push(row(50, Some(ScoreValue::Text("cat".into())), RowStatus::Pending));

    for batch_size in [1, 3, 7, 2000] {
        streamed(&rows, &ScoringType::Nominal, batch_size).await;
    }
}

#[tokio::test]
async fn ordinal_statistics_agree_across_batch_sizes() {
    let scoring = ScoringType::Ordinal {
        scale: quality_scale(),
        policy: Some(OrdinalPolicy {
            acceptable_labels: Some(["Ok".to_string(), "Good".to_string()].into()),
            tail_threshold_rank: Some(2),
        }),
    };
    let rows = mixed_ordinal_rows();
    for batch_size in [1, 3, 7, 2000] {
        streamed(&rows, &scoring, batch_size).await;
    }
}

#[tokio::test]
async fn empty_result_sets_agree() {
    for scoring in [
        ScoringType::Numeric,
        ScoringType::Nominal,
        ScoringType::Ordinal {
            scale: quality_scale(),
            policy: None,
        },
    ] {
        streamed(&[], &scoring, 5).await;
    }
}

/// Aggregate backend that serves pre-grouped comparison aggregates,
/// standing in for the store's SQL fast paths
struct PrecomputedAggregates {
    numeric: Option<PairedNumericAggregate>,
    table: Option<ChangeTable>,
}

#[async_trait]
impl PairedAggregateQuery for PrecomputedAggregates {
    async fn numeric_aggregates(
        &self,
        _key: &PairedKey,
    ) -> anyhow::Result<Option<PairedNumericAggregate>> {
        Ok(self.numeric.clone())
    }

    async fn change_table(&self, _key: &PairedKey) -> anyhow::Result<Option<ChangeTable>> {
        Ok(self.table.clone())
    }
}

fn numeric_pairs() -> Vec<PairedRow> {
    (0..12)
        .map(|i| PairedRow {
            value_a: ScoreValue::Number(i as f64),
            value_b: ScoreValue::Number(i as f64 + if i % 3 == 0 { -1.0 } else { 2.0 }),
        })
        .collect()
}

#[tokio::test]
async fn numeric_comparison_fast_path_agrees_with_stream() {
    let pairs = numeric_pairs();
    let deltas: Vec<f64> = pairs
        .iter()
        .map(|p| p.value_b.as_number().unwrap() - p.value_a.as_number().unwrap())
        .collect();
    let n = deltas.len();
    let wins = deltas.iter().filter(|&&d| d > 0.0).count();
    let losses = deltas.iter().filter(|&&d| d < 0.0).count();
    let aggregate = PairedNumericAggregate {
        n_paired: n as u64,
        mean_a: 5.5,
        mean_b: 6.75,
        delta_mean: mean(&deltas),
        std_delta: std_dev(&deltas),
        win_rate: wins as f64 / n as f64,
        loss_rate: losses as f64 / n as f64,
        tie_rate: (n - wins - losses) as f64 / n as f64,
    };

    let mut engine = ComparisonEngine::new(
        VecPairedSource::new(pairs.clone()),
        PrecomputedAggregates {
            numeric: Some(aggregate.clone()),
            table: None,
        },
        SeededRandom::new(99),
    );
    let Comparison::Numeric(fast) = engine
        .compare(&paired_key(), &ScoringType::Numeric)
        .await
        .unwrap()
    else {
        panic!("numeric scoring produced a non-numeric comparison");
    };

    assert_eq!(fast, numeric_comparison_from_aggregate(&aggregate));

    let mut rng = SeededRandom::new(99);
    let from_pairs = numeric_comparison_from_pairs(&pairs, &ComparisonConfig::default(), &mut rng);
    assert_eq!(fast.delta_mean, from_pairs.delta_mean);
    assert_eq!(fast.ci95_delta, from_pairs.ci95_delta);
    assert_eq!(fast.win_rate, from_pairs.win_rate);
    // only the per-pair route can permute
    assert!(fast.p_value_permutation.is_none());
    assert!(from_pairs.p_value_permutation.is_some());
}

#[tokio::test]
async fn nominal_comparison_fast_path_agrees_with_stream() {
    let pairs: Vec<PairedRow> = [
        ("Good", "Good"),
        ("Bad", "Good"),
        ("Ok", "Bad"),
        ("Good", "Ok"),
        ("Bad", "Ok"),
    ]
    .iter()
    .map(|(a, b)| PairedRow {
        value_a: ScoreValue::Text((*a).into()),
        value_b: ScoreValue::Text((*b).into()),
    })
    .collect();
    let table =
        ChangeTable::from_pairs(pairs.iter().map(|p| {
            match (&p.value_a, &p.value_b) {
                (ScoreValue::Text(a), ScoreValue::Text(b)) => (a.as_str(), b.as_str()),
                _ => unreachable!(),
            }
        }));

    let mut fast_engine = ComparisonEngine::new(
        VecPairedSource::new(Vec::new()),
        PrecomputedAggregates {
            numeric: None,
            table: Some(table.clone()),
        },
        SeededRandom::new(4),
    );
    let mut stream_engine = ComparisonEngine::with_config(
        VecPairedSource::new(pairs),
        NoFastPath,
        SeededRandom::new(4),
        ComparisonConfig {
            batch_size: 2,
            ..ComparisonConfig::default()
        },
    );

    let fast = fast_engine
        .compare(&paired_key(), &ScoringType::Nominal)
        .await
        .unwrap();
    let streamed = stream_engine
        .compare(&paired_key(), &ScoringType::Nominal)
        .await
        .unwrap();
    assert_eq!(fast, streamed);
    assert_eq!(fast, Comparison::Nominal(nominal_comparison_from_table(&table)));
}

#[tokio::test]
async fn ordinal_comparison_fast_path_agrees_with_stream() {
    let raw = [("Bad", "Ok"), ("Ok", "Good"), ("Good", "Good"), ("Bad", "Bad")];
    let pairs: Vec<PairedRow> = raw
        .iter()
        .map(|(a, b)| PairedRow {
            value_a: ScoreValue::Text((*a).into()),
            value_b: ScoreValue::Text((*b).into()),
        })
        .collect();
    let table = ChangeTable::from_pairs(raw);
    let scoring = ScoringType::Ordinal {
        scale: quality_scale(),
        policy: Some(OrdinalPolicy {
            acceptable_labels: Some(["Ok".to_string(), "Good".to_string()].into()),
            tail_threshold_rank: Some(2),
        }),
    };

    let mut fast_engine = ComparisonEngine::new(
        VecPairedSource::new(Vec::new()),
        PrecomputedAggregates {
            numeric: None,
            table: Some(table),
        },
        SeededRandom::new(31),
    );
    let mut stream_engine = ComparisonEngine::with_config(
        VecPairedSource::new(pairs),
        NoFastPath,
        SeededRandom::new(31),
        ComparisonConfig {
            batch_size: 3,
            ..ComparisonConfig::default()
        },
    );

    let fast = fast_engine.compare(&paired_key(), &scoring).await.unwrap();
    let streamed = stream_engine.compare(&paired_key(), &scoring).await.unwrap();
    assert_eq!(fast, streamed);
}
